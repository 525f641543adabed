//! Carry-over rules across three sampled cycles

use std::collections::BTreeSet;

use folio_lifecycle::{infer_long_term_keys, sanitize_seed, Blacklist, InferencePolicy};
use folio_test_utils::data_from;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn three_cycle_history() {
    let big = json!("x".repeat(5000));
    let history = [
        data_from(&[
            ("two_of_three", json!("a")),
            ("one_of_three", json!("b")),
            ("signature_s1", json!("Jane")),
            ("oversize", big),
            ("grid", json!([{"cells": ["Read"], "toggles": [{"code": "W", "selected": true}]}])),
        ]),
        data_from(&[
            ("two_of_three", json!("a")),
            ("signature_s1", json!("Jane")),
            ("oversize", json!("small")),
            ("grid", json!([])),
        ]),
        data_from(&[
            ("signature_s1", json!("Jane")),
            ("oversize", json!("small")),
            ("grid", json!([])),
        ]),
    ];

    let policy = InferencePolicy::default();
    let inference = infer_long_term_keys(&history, &BTreeSet::new(), &policy).unwrap();
    assert_eq!(
        inference.long_term,
        BTreeSet::from(["grid".to_string(), "two_of_three".to_string()])
    );

    let seed = sanitize_seed(&history, &inference.long_term, &Blacklist::default());
    assert_eq!(
        seed.data.get("grid"),
        Some(&json!([{"cells": ["Read"], "toggles": [{"code": "W", "selected": false}]}]))
    );
    assert_eq!(seed.data.get("two_of_three"), Some(&json!("a")));
    assert_eq!(seed.data.len(), 2);
}
