//! Service configuration
//!
//! Every field has a default; files only need to name what they override.
//! Files are read as TOML or YAML depending on their extension.

use std::path::Path;
use std::time::Duration;

use folio_identity::SignatureOptions;
use folio_lifecycle::{Blacklist, InferencePolicy};
use folio_model::{DataLimits, StructuralLimits};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Projection cache sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached views
    pub capacity: u64,
    /// Optional time-to-live in seconds
    pub ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl_secs: None,
        }
    }
}

impl CacheConfig {
    /// TTL as a duration
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

/// Folio configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    /// Key inference and blacklist
    pub inference: InferencePolicy,
    /// Settings key holding the admin long-term key allowlist
    pub allowlist_key: String,
    /// Signature tuning for id reconciliation
    pub signature: SignatureOptions,
    /// Instance data bounds
    pub data_limits: DataLimits,
    /// Template structure bounds
    pub structural_limits: StructuralLimits,
    /// Projection cache
    pub cache: CacheConfig,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            inference: InferencePolicy::default(),
            allowlist_key: "long_term_keys".to_string(),
            signature: SignatureOptions::default(),
            data_limits: DataLimits::default(),
            structural_limits: StructuralLimits::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl FolioConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With history sample size
    #[inline]
    #[must_use]
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.inference.sample_size = sample_size;
        self
    }

    /// With long-term value cap in bytes
    #[inline]
    #[must_use]
    pub fn with_value_cap(mut self, value_cap: usize) -> Self {
        self.inference.value_cap = value_cap;
        self
    }

    /// With blacklist
    #[inline]
    #[must_use]
    pub fn with_blacklist(mut self, blacklist: Blacklist) -> Self {
        self.inference.blacklist = blacklist;
        self
    }

    /// With allowlist settings key
    #[inline]
    #[must_use]
    pub fn with_allowlist_key(mut self, key: impl Into<String>) -> Self {
        self.allowlist_key = key.into();
        self
    }

    /// With data limits
    #[inline]
    #[must_use]
    pub fn with_data_limits(mut self, limits: DataLimits) -> Self {
        self.data_limits = limits;
        self
    }

    /// With cache configuration
    #[inline]
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns error on invalid TOML or unknown value types
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Parse YAML text
    ///
    /// # Errors
    /// Returns error on invalid YAML or unknown value types
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load from a `.toml`, `.yaml` or `.yml` file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }
}
