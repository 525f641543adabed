//! Seed data sanitization
//!
//! Copied data loses every blacklisted key entirely, and every selection
//! flag nested inside copied collections is reset: booleans to `false`,
//! other non-null values to `null`. Everything else is kept as is.

use std::collections::BTreeSet;

use folio_model::InstanceData;
use serde_json::Value;

use crate::policy::Blacklist;

/// Object fields treated as selection state
pub const SELECTION_FLAGS: [&str; 3] = ["active", "selected", "checked"];

/// Sanitized data plus what was removed or reset
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeedData {
    pub data: InstanceData,
    /// Blacklisted keys removed
    pub stripped: Vec<String>,
    /// Number of selection flags reset
    pub flags_reset: usize,
}

/// Reset every nested selection flag in `value`; returns how many changed
pub fn reset_selection_flags(value: &mut Value) -> usize {
    match value {
        Value::Array(items) => items.iter_mut().map(reset_selection_flags).sum(),
        Value::Object(map) => {
            let mut reset = 0;
            for (field, nested) in map.iter_mut() {
                if SELECTION_FLAGS.contains(&field.as_str()) {
                    let cleared = match nested {
                        Value::Bool(_) => Value::Bool(false),
                        _ => Value::Null,
                    };
                    if *nested != cleared {
                        *nested = cleared;
                        reset += 1;
                    }
                } else {
                    reset += reset_selection_flags(nested);
                }
            }
            reset
        }
        _ => 0,
    }
}

/// Strip blacklisted keys and reset selection flags
#[must_use]
pub fn sanitize_data(data: &InstanceData, blacklist: &Blacklist) -> SeedData {
    let mut out = data.clone();
    let mut stripped = Vec::new();
    let mut flags_reset = 0;
    out.retain(|key, value| {
        if blacklist.contains(key) {
            stripped.push(key.to_string());
            return false;
        }
        flags_reset += reset_selection_flags(value);
        true
    });
    SeedData {
        data: out,
        stripped,
        flags_reset,
    }
}

/// Build seed data from history ordered most recent first
///
/// Each long-term key takes its value from the most recent instance holding
/// it non-null; the result is then sanitized.
#[must_use]
pub fn sanitize_seed<'a>(
    history: impl IntoIterator<Item = &'a InstanceData>,
    long_term: &BTreeSet<String>,
    blacklist: &Blacklist,
) -> SeedData {
    let mut copied = InstanceData::new();
    for data in history {
        for (key, value) in data.iter() {
            if value.is_null() || !long_term.contains(key) || copied.contains_key(key) {
                continue;
            }
            copied.insert(key, value.clone());
        }
    }
    let seed = sanitize_data(&copied, blacklist);
    tracing::debug!(
        keys = seed.data.len(),
        stripped = seed.stripped.len(),
        flags_reset = seed.flags_reset,
        "built seed data"
    );
    seed
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_test_utils::data_from;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn nested_flags_are_reset_and_structure_kept() {
        let mut value = json!([
            {"code": "A", "label": "Extra time", "active": true},
            {"code": "B", "label": "Breaks", "active": false, "meta": {"selected": "yes"}},
            {"code": "C", "checked": null}
        ]);
        let reset = reset_selection_flags(&mut value);
        assert_eq!(reset, 2);
        assert_eq!(
            value,
            json!([
                {"code": "A", "label": "Extra time", "active": false},
                {"code": "B", "label": "Breaks", "active": false, "meta": {"selected": null}},
                {"code": "C", "checked": null}
            ])
        );
    }

    #[test]
    fn blacklisted_keys_removed_entirely() {
        let data = data_from(&[
            ("signature_s1", json!("Jane")),
            ("submitted_at", json!("2025-06-01")),
            ("toggle_t1", json!([{"code": "A", "active": true}])),
        ]);
        let seed = sanitize_data(&data, &Blacklist::default());
        assert_eq!(seed.stripped, vec!["signature_s1", "submitted_at"]);
        assert!(!seed.data.contains_key("signature_s1"));
        assert_eq!(seed.data.get("toggle_t1"), Some(&json!([{"code": "A", "active": false}])));
        assert_eq!(seed.flags_reset, 1);
    }

    #[test]
    fn seed_takes_most_recent_value() {
        let history = [
            data_from(&[("goals", json!("new")), ("other", json!(1))]),
            data_from(&[("goals", json!("old")), ("notes", json!("kept"))]),
        ];
        let long_term = BTreeSet::from(["goals".to_string(), "notes".to_string()]);
        let seed = sanitize_seed(&history, &long_term, &Blacklist::default());
        assert_eq!(seed.data.get("goals"), Some(&json!("new")));
        assert_eq!(seed.data.get("notes"), Some(&json!("kept")));
        assert!(!seed.data.contains_key("other"));
    }

    #[test]
    fn allowlisted_blacklisted_key_is_still_stripped() {
        let history = [data_from(&[("signature_s1", json!("Jane"))])];
        let long_term = BTreeSet::from(["signature_s1".to_string()]);
        let seed = sanitize_seed(&history, &long_term, &Blacklist::default());
        assert!(seed.data.is_empty());
        assert_eq!(seed.stripped, vec!["signature_s1"]);
    }

    #[test]
    fn scalar_values_untouched() {
        let mut value = json!("active");
        assert_eq!(reset_selection_flags(&mut value), 0);
        assert_eq!(value, json!("active"));
    }
}
