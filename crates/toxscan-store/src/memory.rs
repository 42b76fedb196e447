//! In-process document store
//!
//! All connections opened from one [`MemoryStore`] share the same data, so a
//! test can seed documents, run batch jobs that connect independently, and
//! inspect the result.

use crate::query::FindQuery;
use crate::store::{
    apply_updates, ensure_id, validate_updates, BulkWriteResult, Document, DocumentStore,
    StoreConnector, UpdateOne,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use toxscan_core::{fields, Result};

type Collections = HashMap<String, Vec<Document>>;

/// Shared in-memory store holding any number of databases
#[derive(Clone, Default)]
pub struct MemoryStore {
    databases: Arc<RwLock<HashMap<String, Collections>>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on one database
    pub fn database(&self, name: &str) -> MemoryDatabase {
        MemoryDatabase {
            databases: Arc::clone(&self.databases),
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    async fn connect(&self, database: &str) -> Result<Box<dyn DocumentStore>> {
        Ok(Box::new(self.database(database)))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Connection to one database of a [`MemoryStore`]
#[derive(Clone)]
pub struct MemoryDatabase {
    databases: Arc<RwLock<HashMap<String, Collections>>>,
    name: String,
}

impl MemoryDatabase {
    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.databases
            .read()
            .get(&self.name)
            .and_then(|db| db.get(collection))
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryDatabase {
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>> {
        let databases = self.databases.read();
        let documents = databases
            .get(&self.name)
            .and_then(|db| db.get(collection))
            .map(Vec::as_slice)
            .unwrap_or_default();

        Ok(query.apply(documents))
    }

    async fn get(&self, collection: &str, id: &Value) -> Result<Option<Document>> {
        let databases = self.databases.read();
        Ok(databases
            .get(&self.name)
            .and_then(|db| db.get(collection))
            .and_then(|docs| docs.iter().find(|d| d.get(fields::ID) == Some(id)))
            .cloned())
    }

    async fn bulk_update(&self, collection: &str, updates: Vec<UpdateOne>) -> Result<BulkWriteResult> {
        validate_updates(&updates)?;

        // Applying cannot fail, so the whole batch lands under one write guard.
        let mut databases = self.databases.write();
        let Some(documents) = databases
            .get_mut(&self.name)
            .and_then(|db| db.get_mut(collection))
        else {
            return Ok(BulkWriteResult::default());
        };

        Ok(apply_updates(documents, &updates))
    }

    async fn insert(&self, collection: &str, mut document: Document) -> Result<Value> {
        let id = ensure_id(&mut document);

        self.databases
            .write()
            .entry(self.name.clone())
            .or_default()
            .entry(collection.to_string())
            .or_default()
            .push(document);

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_connections_share_data() {
        let store = MemoryStore::new();
        let writer = store.connect("redditDB").await.unwrap();
        let reader = store.connect("redditDB").await.unwrap();

        let id = writer
            .insert("comments", doc(json!({"text": "hello"})))
            .await
            .unwrap();

        let found = reader.find("comments", &FindQuery::new()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["_id"], id);
    }

    #[tokio::test]
    async fn test_databases_are_isolated() {
        let store = MemoryStore::new();
        store
            .database("a")
            .insert("c", doc(json!({"_id": 1})))
            .await
            .unwrap();

        assert_eq!(store.database("a").count("c"), 1);
        assert_eq!(store.database("b").count("c"), 0);
    }

    #[tokio::test]
    async fn test_bulk_update_and_get() {
        let db = MemoryStore::new().database("db");
        db.insert("c", doc(json!({"_id": 1, "text": "a"}))).await.unwrap();
        db.insert("c", doc(json!({"_id": 2, "text": "b"}))).await.unwrap();

        let result = db
            .bulk_update("c", vec![UpdateOne::new(json!(2)).set("seen", json!(true))])
            .await
            .unwrap();
        assert_eq!(result, BulkWriteResult { matched: 1, modified: 1 });

        let updated = db.get("c", &json!(2)).await.unwrap().unwrap();
        assert_eq!(updated["seen"], json!(true));
        let untouched = db.get("c", &json!(1)).await.unwrap().unwrap();
        assert!(!untouched.contains_key("seen"));
    }

    #[tokio::test]
    async fn test_invalid_batch_applies_nothing() {
        let db = MemoryStore::new().database("db");
        db.insert("c", doc(json!({"_id": 1}))).await.unwrap();

        let result = db
            .bulk_update(
                "c",
                vec![
                    UpdateOne::new(json!(1)).set("seen", json!(true)),
                    UpdateOne::new(json!(1)).set("_id", json!(9)),
                ],
            )
            .await;
        assert!(result.is_err());

        let stored = db.get("c", &json!(1)).await.unwrap().unwrap();
        assert!(!stored.contains_key("seen"));
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let db = MemoryStore::new().database("db");
        assert!(db.find("nothing", &FindQuery::new()).await.unwrap().is_empty());
        let result = db
            .bulk_update("nothing", vec![UpdateOne::new(json!(1)).set("a", json!(1))])
            .await
            .unwrap();
        assert_eq!(result.matched, 0);
    }
}
