//! Store traits and update types

use crate::query::FindQuery;
use async_trait::async_trait;
use serde_json::{Map, Value};
use toxscan_core::{fields, Error, Result};

/// A stored document: a JSON object keyed by `_id`
pub type Document = Map<String, Value>;

/// Set fields on the document with the given id
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOne {
    /// Target document id
    pub id: Value,

    /// Top-level fields to set
    pub set: Document,
}

impl UpdateOne {
    /// Create an empty update for a document
    pub fn new(id: Value) -> Self {
        Self {
            id,
            set: Document::new(),
        }
    }

    /// Add a field to set
    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set.insert(field.into(), value);
        self
    }
}

/// Outcome of a bulk update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    /// Updates whose id matched a document
    pub matched: usize,

    /// Matched documents whose content actually changed
    pub modified: usize,
}

/// A connection to one database of a document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return documents matching the query
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>>;

    /// Fetch one document by id
    async fn get(&self, collection: &str, id: &Value) -> Result<Option<Document>>;

    /// Apply all updates, or none of them.
    ///
    /// Updates whose id matches no document are ignored and not counted.
    async fn bulk_update(&self, collection: &str, updates: Vec<UpdateOne>) -> Result<BulkWriteResult>;

    /// Insert a document, assigning an `_id` if it has none; returns the id
    async fn insert(&self, collection: &str, document: Document) -> Result<Value>;
}

/// Opens store connections; each batch job gets its own
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Connect to a named database
    async fn connect(&self, database: &str) -> Result<Box<dyn DocumentStore>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Reject a batch that cannot be applied as a whole
pub(crate) fn validate_updates(updates: &[UpdateOne]) -> Result<()> {
    for (idx, update) in updates.iter().enumerate() {
        if update.id.is_null() {
            return Err(Error::persistence(format!("update {} has a null id", idx)));
        }
        if update.set.contains_key(fields::ID) {
            return Err(Error::persistence(format!(
                "update {} attempts to change the document id",
                idx
            )));
        }
    }
    Ok(())
}

/// Apply validated updates in place
pub(crate) fn apply_updates(documents: &mut [Document], updates: &[UpdateOne]) -> BulkWriteResult {
    let mut result = BulkWriteResult::default();

    for update in updates {
        let Some(document) = documents
            .iter_mut()
            .find(|doc| doc.get(fields::ID) == Some(&update.id))
        else {
            continue;
        };

        result.matched += 1;
        let mut changed = false;
        for (field, value) in &update.set {
            if document.get(field) != Some(value) {
                document.insert(field.clone(), value.clone());
                changed = true;
            }
        }
        if changed {
            result.modified += 1;
        }
    }

    result
}

/// Assign a fresh id to a document that has none
pub(crate) fn ensure_id(document: &mut Document) -> Value {
    match document.get(fields::ID) {
        Some(id) if !id.is_null() => id.clone(),
        _ => {
            let id = Value::String(uuid::Uuid::new_v4().to_string());
            document.insert(fields::ID.to_string(), id.clone());
            id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_apply_updates_counts() {
        let mut docs = vec![
            doc(json!({"_id": 1, "text": "a"})),
            doc(json!({"_id": 2, "text": "b", "flag": true})),
        ];
        let updates = vec![
            UpdateOne::new(json!(1)).set("flag", json!(true)),
            UpdateOne::new(json!(2)).set("flag", json!(true)),
            UpdateOne::new(json!(3)).set("flag", json!(true)),
        ];

        let result = apply_updates(&mut docs, &updates);
        assert_eq!(result, BulkWriteResult { matched: 2, modified: 1 });
        assert_eq!(docs[0]["flag"], json!(true));
    }

    #[test]
    fn test_validate_rejects_id_change() {
        let updates = vec![
            UpdateOne::new(json!(1)).set("a", json!(1)),
            UpdateOne::new(json!(2)).set("_id", json!(5)),
        ];
        assert!(validate_updates(&updates).is_err());
        assert!(validate_updates(&[UpdateOne::new(Value::Null)]).is_err());
    }

    #[test]
    fn test_ensure_id() {
        let mut with_id = doc(json!({"_id": "abc"}));
        assert_eq!(ensure_id(&mut with_id), json!("abc"));

        let mut without_id = doc(json!({"text": "hi"}));
        let id = ensure_id(&mut without_id);
        assert!(id.is_string());
        assert_eq!(without_id["_id"], id);
    }
}
