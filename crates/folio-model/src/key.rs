//! Instance data keys
//!
//! Data keys have the form `{feature}_{address}`. The address is either
//! stable (`{elementId}` or `{elementId}_row_{rowId}`) or a legacy
//! positional address (`{pageIndex}_{blockIndex}` or
//! `{pageIndex}_{blockIndex}_row_{rowIndex}`). Which reading applies is
//! decided by the resolvers at merge time; this module only splits keys.

use std::fmt::{self, Display, Formatter};

/// Separator between an element address and a row address
pub const ROW_MARKER: &str = "_row_";

/// Feature whose values replace toggle item sets
pub const TOGGLE_FEATURE: &str = "toggle";

/// Borrowed view of a parsed data key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataKey<'a> {
    feature: &'a str,
    element: &'a str,
    row: Option<&'a str>,
}

impl<'a> DataKey<'a> {
    /// Split a raw key; returns `None` for plain variable keys without an
    /// element address
    #[must_use]
    pub fn parse(raw: &'a str) -> Option<Self> {
        let (feature, rest) = raw.split_once('_')?;
        if feature.is_empty() || rest.is_empty() {
            return None;
        }
        let (element, row) = match rest.split_once(ROW_MARKER) {
            Some((element, row)) if !element.is_empty() && !row.is_empty() => {
                (element, Some(row))
            }
            Some(_) => return None,
            None => (rest, None),
        };
        Some(Self {
            feature,
            element,
            row,
        })
    }

    /// Feature prefix (e.g. `toggle`)
    #[inline]
    #[must_use]
    pub fn feature(&self) -> &'a str {
        self.feature
    }

    /// Element address (stable id or `{page}_{block}`)
    #[inline]
    #[must_use]
    pub fn element(&self) -> &'a str {
        self.element
    }

    /// Row address, if any
    #[inline]
    #[must_use]
    pub fn row(&self) -> Option<&'a str> {
        self.row
    }

    /// Whether values under this key mutate rendered structure
    #[inline]
    #[must_use]
    pub fn is_structural(&self) -> bool {
        self.feature == TOGGLE_FEATURE
    }

    /// Read the element/row address as legacy positional indices
    #[must_use]
    pub fn positional(&self) -> Option<PositionalAddress> {
        let (page, block) = self.element.split_once('_')?;
        let page = page.parse().ok()?;
        let block = block.parse().ok()?;
        let row = match self.row {
            Some(row) => Some(row.parse().ok()?),
            None => None,
        };
        Some(PositionalAddress { page, block, row })
    }
}

impl Display for DataKey<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.feature, self.element)?;
        if let Some(row) = self.row {
            write!(f, "{ROW_MARKER}{row}")?;
        }
        Ok(())
    }
}

/// Legacy page/block/row indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionalAddress {
    pub page: usize,
    pub block: usize,
    pub row: Option<usize>,
}

/// Build a stable-id key
#[must_use]
pub fn stable_key(feature: &str, element_id: &str, row_id: Option<&str>) -> String {
    match row_id {
        Some(row) => format!("{feature}_{element_id}{ROW_MARKER}{row}"),
        None => format!("{feature}_{element_id}"),
    }
}

/// Build a legacy positional key
#[must_use]
pub fn positional_key(feature: &str, page: usize, block: usize, row: Option<usize>) -> String {
    match row {
        Some(row) => format!("{feature}_{page}_{block}{ROW_MARKER}{row}"),
        None => format!("{feature}_{page}_{block}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_stable_block_key() {
        let key = DataKey::parse("toggle_blk-01h").unwrap();
        assert_eq!(key.feature(), "toggle");
        assert_eq!(key.element(), "blk-01h");
        assert_eq!(key.row(), None);
        assert!(key.is_structural());
        assert!(key.positional().is_none());
    }

    #[test]
    fn parse_stable_row_key() {
        let key = DataKey::parse("toggle_g1_row_r2").unwrap();
        assert_eq!(key.element(), "g1");
        assert_eq!(key.row(), Some("r2"));
        assert_eq!(key.to_string(), "toggle_g1_row_r2");
    }

    #[test]
    fn parse_positional_keys() {
        let key = DataKey::parse("toggle_0_3").unwrap();
        assert_eq!(
            key.positional(),
            Some(PositionalAddress { page: 0, block: 3, row: None })
        );

        let key = DataKey::parse("toggle_1_2_row_4").unwrap();
        assert_eq!(
            key.positional(),
            Some(PositionalAddress { page: 1, block: 2, row: Some(4) })
        );
    }

    #[test]
    fn plain_variables_are_not_keys() {
        assert!(DataKey::parse("studentname").is_none());
        assert!(DataKey::parse("toggle_").is_none());
        assert!(DataKey::parse("_x").is_none());
        assert!(DataKey::parse("toggle_g1_row_").is_none());
    }

    #[test]
    fn non_structural_feature() {
        let key = DataKey::parse("text_b7").unwrap();
        assert!(!key.is_structural());
    }

    #[test]
    fn key_builders_match_parser() {
        let stable = stable_key(TOGGLE_FEATURE, "g1", Some("r1"));
        assert_eq!(stable, "toggle_g1_row_r1");
        let positional = positional_key(TOGGLE_FEATURE, 0, 1, None);
        assert_eq!(
            DataKey::parse(&positional).and_then(|k| k.positional()),
            Some(PositionalAddress { page: 0, block: 1, row: None })
        );
    }

    proptest::proptest! {
        #[test]
        fn positional_keys_parse_back(page in 0usize..500, block in 0usize..500, row in proptest::option::of(0usize..500)) {
            let raw = positional_key(TOGGLE_FEATURE, page, block, row);
            let parsed = DataKey::parse(&raw).and_then(|k| k.positional());
            proptest::prop_assert_eq!(parsed, Some(PositionalAddress { page, block, row }));
        }
    }
}
