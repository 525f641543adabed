//! Per-subject instances and their sparse data

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::block::ToggleItem;
use crate::error::ModelError;
use crate::hash::Fingerprint;
use crate::ids::{CycleId, InstanceId, SubjectId, TemplateId};
use crate::key::DataKey;
use crate::template::Template;

/// Lifecycle state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Current cycle; data is writable
    #[default]
    Live,
    /// Previous cycle; immutable history
    Archived,
}

/// Per-subject materialization of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: InstanceId,
    pub template_id: TemplateId,
    /// Pinned structural version
    pub template_version: u32,
    pub subject_id: SubjectId,
    pub cycle: CycleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default)]
    pub data: InstanceData,
    /// Optimistic concurrency counter for `data`
    #[serde(default)]
    pub data_version: u64,
    #[serde(default)]
    pub status: InstanceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instance {
    /// New live instance pinned to the template's current version
    #[must_use]
    pub fn new(template: &Template, subject_id: SubjectId, cycle: CycleId) -> Self {
        let now = Utc::now();
        Self {
            id: InstanceId::new(),
            template_id: template.id,
            template_version: template.current_version,
            subject_id,
            cycle,
            level: None,
            data: InstanceData::new(),
            data_version: 0,
            status: InstanceStatus::Live,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set level
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Set data
    #[must_use]
    pub fn with_data(mut self, data: InstanceData) -> Self {
        self.data = data;
        self
    }

    /// Whether data may still be written
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status == InstanceStatus::Live
    }
}

/// Bounds enforced on instance data at the write boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLimits {
    /// Maximum key length in bytes
    pub max_key_len: usize,
    /// Maximum serialized size of a single value in bytes
    pub max_value_bytes: usize,
}

impl Default for DataLimits {
    fn default() -> Self {
        Self {
            max_key_len: 256,
            max_value_bytes: 64 * 1024,
        }
    }
}

/// Sparse key/value fill-in data
///
/// Ordered so that fingerprints are canonical.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceData(BTreeMap<String, Value>);

impl InstanceData {
    /// Empty data
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value by key
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether key is present
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert value, returning the previous one
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Remove key
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Keep only entries matching the predicate
    pub fn retain(&mut self, mut f: impl FnMut(&str, &mut Value) -> bool) {
        self.0.retain(|k, v| f(k, v));
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Apply a patch: `null` values delete, everything else overwrites
    #[must_use]
    pub fn merged(&self, patch: &Self) -> Self {
        let mut out = self.clone();
        for (key, value) in &patch.0 {
            if value.is_null() {
                out.0.remove(key);
            } else {
                out.0.insert(key.clone(), value.clone());
            }
        }
        out
    }

    /// Canonical fingerprint of the whole map
    ///
    /// # Errors
    /// Returns error if a value cannot be encoded
    pub fn fingerprint(&self) -> Result<Fingerprint, ModelError> {
        Fingerprint::of_json(&self.0)
    }

    /// Validate keys and values against limits
    ///
    /// Structural feature values must decode as toggle item lists; `null`
    /// is always accepted (it deletes in a patch).
    ///
    /// # Errors
    /// Returns the first violation found
    pub fn validate(&self, limits: &DataLimits) -> Result<(), ModelError> {
        for (key, value) in &self.0 {
            if key.trim().is_empty() {
                return Err(ModelError::data(key, "empty key"));
            }
            if key.len() > limits.max_key_len {
                return Err(ModelError::data(
                    key,
                    format!("key longer than {} bytes", limits.max_key_len),
                ));
            }
            let size = serialized_len(value)?;
            if size > limits.max_value_bytes {
                return Err(ModelError::data(
                    key,
                    format!("value of {size} bytes exceeds {}", limits.max_value_bytes),
                ));
            }
            if value.is_null() {
                continue;
            }
            if DataKey::parse(key).is_some_and(|k| k.is_structural()) {
                decode_toggle_items(value).map_err(|e| ModelError::data(key, e.to_string()))?;
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, Value)> for InstanceData {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for InstanceData {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

/// Serialized JSON size of a value in bytes
///
/// # Errors
/// Returns error if the value cannot be encoded
pub fn serialized_len(value: &Value) -> Result<usize, ModelError> {
    Ok(serde_json::to_vec(value)?.len())
}

/// Decode a toggle item list from a data value
///
/// # Errors
/// Returns error if the value is not a list of toggle items
pub fn decode_toggle_items(value: &Value) -> Result<Vec<ToggleItem>, serde_json::Error> {
    Vec::<ToggleItem>::deserialize(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(entries: &[(&str, Value)]) -> InstanceData {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn new_instance_pins_current_version() {
        let mut template = Template::new("IEP");
        template.current_version = 4;
        let instance = Instance::new(&template, SubjectId::new("s1"), CycleId::new("2025"));
        assert_eq!(instance.template_version, 4);
        assert_eq!(instance.template_id, template.id);
        assert!(instance.is_live());
        assert_eq!(instance.data_version, 0);
    }

    #[test]
    fn merged_overwrites_and_deletes() {
        let base = data(&[("a", json!(1)), ("b", json!(2))]);
        let patch = data(&[("a", json!(10)), ("b", Value::Null), ("c", json!(3))]);
        let out = base.merged(&patch);
        assert_eq!(out.get("a"), Some(&json!(10)));
        assert!(!out.contains_key("b"));
        assert_eq!(out.get("c"), Some(&json!(3)));
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let a = data(&[("x", json!(1)), ("y", json!(2))]);
        let b = data(&[("y", json!(2)), ("x", json!(1))]);
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn validate_accepts_toggle_lists() {
        let d = data(&[(
            "toggle_b1",
            json!([{"code": "R1", "label": "Reading", "active": true}]),
        )]);
        assert!(d.validate(&DataLimits::default()).is_ok());
    }

    #[test]
    fn validate_rejects_malformed_toggle_value() {
        let d = data(&[("toggle_b1", json!("yes"))]);
        let err = d.validate(&DataLimits::default()).unwrap_err();
        assert!(matches!(err, ModelError::DataValidation { .. }));
    }

    #[test]
    fn validate_rejects_oversized_value() {
        let limits = DataLimits {
            max_key_len: 64,
            max_value_bytes: 8,
        };
        let d = data(&[("text_b1", json!("a much longer string"))]);
        assert!(d.validate(&limits).is_err());
    }

    #[test]
    fn validate_rejects_long_key() {
        let limits = DataLimits {
            max_key_len: 4,
            max_value_bytes: 1024,
        };
        let d = data(&[("abcdef", json!(1))]);
        assert!(d.validate(&limits).is_err());
    }

    #[test]
    fn null_toggle_value_is_accepted_in_patch() {
        let d = data(&[("toggle_b1", Value::Null)]);
        assert!(d.validate(&DataLimits::default()).is_ok());
    }
}
