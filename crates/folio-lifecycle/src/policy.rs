//! Carry-over policy: blacklist and inference parameters

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Cycle-scoped keys that never carry over
///
/// Matches exact key names and key prefixes (signature and promotion
/// blocks are addressed as `signature_{id}` / `promotion_info_{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blacklist {
    pub exact: BTreeSet<String>,
    pub prefixes: Vec<String>,
}

impl Default for Blacklist {
    fn default() -> Self {
        Self {
            exact: ["submitted_at", "submitted_by", "finalized_at", "cycle_id"]
                .into_iter()
                .map(String::from)
                .collect(),
            prefixes: vec!["signature_".to_string(), "promotion_".to_string()],
        }
    }
}

impl Blacklist {
    /// Empty blacklist
    #[must_use]
    pub fn empty() -> Self {
        Self {
            exact: BTreeSet::new(),
            prefixes: Vec::new(),
        }
    }

    /// Add an exact key
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.exact.insert(key.into());
        self
    }

    /// Add a key prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Whether `key` is cycle-scoped
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.exact.contains(key) || self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}

/// Key inference parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferencePolicy {
    /// Most recent historical instances sampled
    pub sample_size: usize,
    /// Serialized value size above which a key never carries over
    pub value_cap: usize,
    pub blacklist: Blacklist,
}

impl Default for InferencePolicy {
    fn default() -> Self {
        Self {
            sample_size: 3,
            value_cap: 4096,
            blacklist: Blacklist::default(),
        }
    }
}

impl InferencePolicy {
    /// Set sample size
    #[inline]
    #[must_use]
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Set value cap
    #[inline]
    #[must_use]
    pub fn with_value_cap(mut self, value_cap: usize) -> Self {
        self.value_cap = value_cap;
        self
    }

    /// Replace blacklist
    #[inline]
    #[must_use]
    pub fn with_blacklist(mut self, blacklist: Blacklist) -> Self {
        self.blacklist = blacklist;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_blacklist_covers_provenance() {
        let b = Blacklist::default();
        assert!(b.contains("submitted_at"));
        assert!(b.contains("signature_s1"));
        assert!(b.contains("promotion_info_p1"));
        assert!(!b.contains("toggle_t1"));
        assert!(!b.contains("studentname"));
    }

    #[test]
    fn custom_entries() {
        let b = Blacklist::empty().with_key("draft").with_prefix("tmp_");
        assert!(b.contains("draft"));
        assert!(b.contains("tmp_1"));
        assert!(!b.contains("submitted_at"));
    }
}
