//! Integration tests for the session store infrastructure
//!
//! These tests verify that the in-process store behaves like the backend
//! contract the auth crate relies on: whole-snapshot load/save semantics
//! and destructive removal by session ID.

use std::collections::HashMap;

use common::{
    clock::{Clock, ManualClock},
    memory::MemoryStore,
    store::SessionStore,
};
use chrono::Utc;
use serde_json::json;

#[tokio::test]
async fn test_store_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let store = MemoryStore::new();

    // A session that has never been written loads as absent
    assert!(store.load("s1").await?.is_none());

    // Save a snapshot and read it back
    let mut entries = HashMap::new();
    entries.insert("__id".to_string(), json!("user-1"));
    entries.insert("theme".to_string(), json!("dark"));
    store.save("s1", &entries).await?;

    let loaded = store.load("s1").await?.expect("snapshot should exist");
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.get("__id"), Some(&json!("user-1")));

    // Destroy removes every entry under the ID
    store.destroy("s1").await?;
    assert!(store.load("s1").await?.is_none(), "destroy left entries behind");

    Ok(())
}

#[tokio::test]
async fn test_sessions_are_isolated_by_id() -> Result<(), Box<dyn std::error::Error>> {
    let store = MemoryStore::new();

    let mut first = HashMap::new();
    first.insert("k".to_string(), json!("a"));
    store.save("s1", &first).await?;

    let mut second = HashMap::new();
    second.insert("k".to_string(), json!("b"));
    store.save("s2", &second).await?;

    assert_eq!(store.load("s1").await?, Some(first));
    assert_eq!(store.load("s2").await?, Some(second));

    store.destroy("s1").await?;
    assert!(store.load("s1").await?.is_none());
    assert!(store.load("s2").await?.is_some(), "destroy crossed session IDs");

    Ok(())
}

#[test]
fn test_manual_clock_is_deterministic() {
    let start = Utc::now();
    let clock = ManualClock::new(start);

    clock.advance(3600);
    assert_eq!((clock.now() - start).num_seconds(), 3600);

    clock.set(start);
    assert_eq!(clock.now(), start);
}
