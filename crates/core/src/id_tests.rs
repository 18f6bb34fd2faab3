// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

// A throwaway prefix distinct from "dmn-"/"run-" so these tests exercise
// the macro itself rather than the two concrete IDs defined in ids.rs.
crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId("tst-");
}

#[test]
fn define_id_hash_map_lookup_by_str() {
    let id = TestId::from_string("tst-k");
    let mut map = HashMap::new();
    map.insert(id, 42);
    assert_eq!(map.get("tst-k"), Some(&42));
}

#[test]
fn define_id_new_is_unique_and_prefixed() {
    let a = TestId::new();
    let b = TestId::new();
    assert_ne!(a, b);
    assert!(a.as_str().starts_with("tst-"));
    assert_eq!(a.suffix().len(), 19);
}

#[test]
fn define_id_display_round_trips_through_from_string() {
    let id = TestId::new();
    let rebuilt = TestId::from_string(id.to_string());
    assert_eq!(id, rebuilt);
}

#[test]
fn define_id_is_empty_matches_from_string_of_empty_str() {
    let id = TestId::from_string("");
    assert!(id.is_empty());
    assert!(!TestId::new().is_empty());
}
