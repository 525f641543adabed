//! Folio Lifecycle Sanitizer
//!
//! Decides what part of a subject's prior data survives into the instance
//! opened for a new cycle.
//!
//! # Core Concepts
//!
//! - [`infer_long_term_keys`]: strict-majority presence over recent history
//! - [`sanitize_seed`]: copy long-term keys, strip blacklist, reset selection flags
//! - [`choose_templates`]: sibling assignment first, level defaults second
//! - [`RolloverPlanner`]: all of the above as one pure plan
//!
//! # Example
//!
//! ```rust
//! use folio_lifecycle::{sanitize_data, Blacklist};
//! use folio_model::InstanceData;
//! use serde_json::json;
//!
//! let mut data = InstanceData::new();
//! data.insert("signature_s1", json!("Jane"));
//! data.insert("toggle_t1", json!([{"code": "A", "active": true}]));
//!
//! let seed = sanitize_data(&data, &Blacklist::default());
//! assert!(!seed.data.contains_key("signature_s1"));
//! assert_eq!(seed.data.get("toggle_t1"), Some(&json!([{"code": "A", "active": false}])));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod infer;
mod policy;
mod rollover;
mod sanitize;
mod seeding;

pub use error::LifecycleError;
pub use infer::{infer_long_term_keys, KeyInference};
pub use policy::{Blacklist, InferencePolicy};
pub use rollover::{RolloverPlan, RolloverPlanner};
pub use sanitize::{reset_selection_flags, sanitize_data, sanitize_seed, SeedData, SELECTION_FLAGS};
pub use seeding::{choose_templates, SeedTarget, TemplateChoice};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
