//! Long-term key inference
//!
//! A key is long-term when it is present (non-null, within the size cap) in
//! a strict majority of the sampled historical instances. Blacklisted keys
//! are never inferred, and a key whose value exceeds the cap in any sample
//! is excluded outright. The admin allowlist is unioned in afterwards.

use std::collections::{BTreeMap, BTreeSet};

use folio_model::{serialized_len, InstanceData};

use crate::error::LifecycleError;
use crate::policy::InferencePolicy;

/// Inference result with the evidence behind it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyInference {
    /// Keys to carry over
    pub long_term: BTreeSet<String>,
    /// Number of instances actually sampled
    pub sampled: usize,
    /// Presence count per candidate key
    pub counts: BTreeMap<String, usize>,
    /// Keys excluded for exceeding the size cap
    pub oversized: BTreeSet<String>,
}

impl KeyInference {
    /// Whether `key` carries over
    #[inline]
    #[must_use]
    pub fn is_long_term(&self, key: &str) -> bool {
        self.long_term.contains(key)
    }
}

/// Infer long-term keys from history ordered most recent first
///
/// # Errors
/// Returns error if a value cannot be measured
pub fn infer_long_term_keys<'a>(
    history: impl IntoIterator<Item = &'a InstanceData>,
    allowlist: &BTreeSet<String>,
    policy: &InferencePolicy,
) -> Result<KeyInference, LifecycleError> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut oversized = BTreeSet::new();
    let mut sampled = 0;

    for data in history.into_iter().take(policy.sample_size) {
        sampled += 1;
        for (key, value) in data.iter() {
            if value.is_null() || policy.blacklist.contains(key) {
                continue;
            }
            if serialized_len(value)? > policy.value_cap {
                oversized.insert(key.to_string());
                continue;
            }
            *counts.entry(key.to_string()).or_default() += 1;
        }
    }

    let mut long_term: BTreeSet<String> = counts
        .iter()
        .filter(|(key, count)| **count * 2 > sampled && !oversized.contains(*key))
        .map(|(key, _)| key.clone())
        .collect();
    long_term.extend(allowlist.iter().cloned());

    tracing::debug!(
        sampled,
        inferred = long_term.len(),
        oversized = oversized.len(),
        "inferred long-term keys"
    );

    Ok(KeyInference {
        long_term,
        sampled,
        counts,
        oversized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_test_utils::data_from;
    use serde_json::{json, Value};

    fn policy() -> InferencePolicy {
        InferencePolicy::default()
    }

    fn none() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn majority_rule() {
        let history = [
            data_from(&[("k", json!("x")), ("once", json!(1))]),
            data_from(&[("k", json!("y"))]),
            data_from(&[("k", Value::Null)]),
        ];
        let result = infer_long_term_keys(&history, &none(), &policy()).unwrap();
        assert_eq!(result.sampled, 3);
        assert!(result.is_long_term("k"));
        assert!(!result.is_long_term("once"));
    }

    #[test]
    fn blacklisted_key_is_never_inferred() {
        let history = vec![data_from(&[("signature_s1", json!("Jane"))]); 3];
        let result = infer_long_term_keys(&history, &none(), &policy()).unwrap();
        assert!(result.long_term.is_empty());
    }

    #[test]
    fn oversize_anywhere_excludes() {
        let big = json!("x".repeat(64));
        let history = [
            data_from(&[("notes", json!("short"))]),
            data_from(&[("notes", json!("short"))]),
            data_from(&[("notes", big)]),
        ];
        let result =
            infer_long_term_keys(&history, &none(), &policy().with_value_cap(32)).unwrap();
        assert!(!result.is_long_term("notes"));
        assert!(result.oversized.contains("notes"));
    }

    #[test]
    fn only_most_recent_samples_count() {
        let history = [
            data_from(&[]),
            data_from(&[]),
            data_from(&[]),
            data_from(&[("old", json!(1))]),
            data_from(&[("old", json!(1))]),
        ];
        let result = infer_long_term_keys(&history, &none(), &policy()).unwrap();
        assert_eq!(result.sampled, 3);
        assert!(!result.is_long_term("old"));
    }

    #[test]
    fn allowlist_is_unioned() {
        let history = [data_from(&[])];
        let allow = BTreeSet::from(["goals".to_string()]);
        let result = infer_long_term_keys(&history, &allow, &policy()).unwrap();
        assert!(result.is_long_term("goals"));
    }

    #[test]
    fn empty_history_infers_nothing() {
        let result = infer_long_term_keys(std::iter::empty(), &none(), &policy()).unwrap();
        assert_eq!(result.sampled, 0);
        assert!(result.long_term.is_empty());
    }
}
