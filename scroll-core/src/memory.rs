//! In-memory KV store implementation for testing
//!
//! Stores all items in memory behind `Arc<RwLock>` for interior mutability,
//! making it thread-safe and suitable for multi-threaded async runtimes.
//! Every primitive mirrors the remote store's contract, including the
//! conditional failures the append protocol relies on.

use crate::error::{KvError, Result};
use crate::schema::ATTR_ID;
use crate::store::{Item, KvStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// In-memory KV store for testing
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    items: Arc<RwLock<HashMap<String, Item>>>,
}

impl Debug for MemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKvStore")
            .field("item_count", &self.items.read().len())
            .finish()
    }
}

impl MemoryKvStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items currently stored
    pub fn item_count(&self) -> usize {
        self.items.read().len()
    }

    /// Remove an item, returning whether it existed
    ///
    /// Test hook: the protocol itself never deletes. Used to inject blank
    /// pages into a list.
    pub fn delete(&self, key: &str) -> bool {
        self.items.write().remove(key).is_some()
    }

    /// Apply an attribute projection, keeping the key attribute
    fn project(item: &Item, projection: Option<&[&str]>) -> Item {
        match projection {
            None => item.clone(),
            Some(fields) => item
                .iter()
                .filter(|(name, _)| name.as_str() == ATTR_ID || fields.contains(&name.as_str()))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn put_if_absent(&self, key: &str, item: Item) -> Result<()> {
        let mut items = self.items.write();
        if items.contains_key(key) {
            return Err(KvError::already_exists(key));
        }
        items.insert(key.to_string(), item);
        Ok(())
    }

    async fn get(&self, key: &str, projection: Option<&[&str]>) -> Result<Option<Item>> {
        Ok(self
            .items
            .read()
            .get(key)
            .map(|item| Self::project(item, projection)))
    }

    async fn append_to_list(&self, key: &str, field: &str, value: Value) -> Result<usize> {
        let mut items = self.items.write();
        let item = items
            .get_mut(key)
            .ok_or_else(|| KvError::item_missing(key))?;

        let list = item
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match list {
            Value::Array(values) => {
                values.push(value);
                Ok(values.len())
            }
            _ => Err(KvError::invalid_item(format!(
                "attribute {field} of {key} is not a list"
            ))),
        }
    }

    async fn increment_if_equals(&self, key: &str, field: &str, floor: u64) -> Result<u64> {
        let mut items = self.items.write();

        // A missing item or a counter away from the floor both fail the
        // condition, exactly as the remote store's conditional update does.
        let item = items.get_mut(key).ok_or_else(|| {
            KvError::precondition_failed(format!("{key}.{field} is not at {floor}"))
        })?;
        if item.get(field).and_then(Value::as_u64) != Some(floor) {
            return Err(KvError::precondition_failed(format!(
                "{key}.{field} is not at {floor}"
            )));
        }

        item.insert(field.to_string(), Value::from(floor + 1));
        Ok(floor + 1)
    }

    async fn bulk_get(
        &self,
        keys: &[String],
        projection: Option<&[&str]>,
    ) -> Result<HashMap<String, Item>> {
        let items = self.items.read();
        Ok(keys
            .iter()
            .filter_map(|key| {
                items
                    .get(key)
                    .map(|item| (key.clone(), Self::project(item, projection)))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item_with(entries: &[(&str, Value)]) -> Item {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_put_if_absent_rejects_existing_key() {
        let store = MemoryKvStore::new();
        let item = item_with(&[(ATTR_ID, json!("k1")), ("n", json!(1))]);

        store.put_if_absent("k1", item.clone()).await.unwrap();
        let err = store.put_if_absent("k1", item).await.unwrap_err();
        assert!(matches!(err, KvError::AlreadyExists(_)));

        // The original item is untouched.
        let stored = store.get("k1", None).await.unwrap().unwrap();
        assert_eq!(stored.get("n"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_get_projection_keeps_key_attribute() {
        let store = MemoryKvStore::new();
        store
            .put_if_absent(
                "k1",
                item_with(&[(ATTR_ID, json!("k1")), ("a", json!(1)), ("b", json!(2))]),
            )
            .await
            .unwrap();

        let item = store.get("k1", Some(&["a"])).await.unwrap().unwrap();
        assert_eq!(item.get("a"), Some(&json!(1)));
        assert_eq!(item.get(ATTR_ID), Some(&json!("k1")));
        assert!(item.get("b").is_none());
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = MemoryKvStore::new();
        assert!(store.get("nope", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_to_list_returns_new_length() {
        let store = MemoryKvStore::new();
        store
            .put_if_absent(
                "page",
                item_with(&[(ATTR_ID, json!("page")), ("data_list", json!([]))]),
            )
            .await
            .unwrap();

        assert_eq!(
            store
                .append_to_list("page", "data_list", json!("a"))
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .append_to_list("page", "data_list", json!("b"))
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_append_to_missing_item_fails() {
        let store = MemoryKvStore::new();
        let err = store
            .append_to_list("nope", "data_list", json!("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::ItemMissing(_)));
    }

    #[tokio::test]
    async fn test_increment_advances_exactly_one_winner() {
        let store = MemoryKvStore::new();
        store
            .put_if_absent(
                "summary",
                item_with(&[(ATTR_ID, json!("summary")), ("currentPage", json!(0))]),
            )
            .await
            .unwrap();

        // First caller at floor 0 wins.
        assert_eq!(
            store
                .increment_if_equals("summary", "currentPage", 0)
                .await
                .unwrap(),
            1
        );

        // Second caller that also read floor 0 loses.
        let err = store
            .increment_if_equals("summary", "currentPage", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::PreconditionFailed(_)));

        // The counter moved exactly one step.
        let item = store.get("summary", None).await.unwrap().unwrap();
        assert_eq!(item.get("currentPage"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_increment_on_missing_item_fails_precondition() {
        let store = MemoryKvStore::new();
        let err = store
            .increment_if_equals("nope", "currentPage", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_bulk_get_omits_missing_keys() {
        let store = MemoryKvStore::new();
        store
            .put_if_absent("a", item_with(&[(ATTR_ID, json!("a")), ("n", json!(1))]))
            .await
            .unwrap();
        store
            .put_if_absent("c", item_with(&[(ATTR_ID, json!("c")), ("n", json!(3))]))
            .await
            .unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let found = store.bulk_get(&keys, None).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.contains_key("a"));
        assert!(!found.contains_key("b"));
        assert!(found.contains_key("c"));
    }

    #[tokio::test]
    async fn test_delete_injects_absence() {
        let store = MemoryKvStore::new();
        store
            .put_if_absent("a", item_with(&[(ATTR_ID, json!("a"))]))
            .await
            .unwrap();
        assert!(store.delete("a"));
        assert!(!store.delete("a"));
        assert!(store.get("a", None).await.unwrap().is_none());
    }
}
