//! MongoDB store
//!
//! Each [`StoreConnector::connect`] builds its own client from options parsed
//! once, so batch jobs never share a connection pool. Queries run as an
//! aggregation pipeline because sorting by reply count needs a computed field.
//!
//! Documents cross the boundary as relaxed extended JSON: an `ObjectId` id
//! reads as `{"$oid": "..."}` and converts back when used in an update.
//!
//! Bulk updates are ordered `update_one` calls. With transactions enabled
//! (replica sets only) they commit together; on a standalone server a failed
//! write leaves the earlier updates of the batch in place.

use crate::query::{FindQuery, SortKey, SortOrder};
use crate::store::{
    ensure_id, validate_updates, BulkWriteResult, Document, DocumentStore, StoreConnector,
    UpdateOne,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document as BsonDocument};
use mongodb::options::ClientOptions;
use mongodb::{Client, ClientSession, Collection, Database};
use serde_json::Value;
use toxscan_core::{fields, Error, Result};
use tracing::{debug, warn};

/// Computed field used to sort by array length
const SORT_LENGTH_FIELD: &str = "_toxscan_sort_length";

/// Connector for a MongoDB deployment
#[derive(Clone)]
pub struct MongoStore {
    options: ClientOptions,
    transactions: bool,
}

impl MongoStore {
    /// Parse a connection string such as `mongodb://localhost:27017/`
    pub async fn new(uri: &str) -> Result<Self> {
        let mut options = ClientOptions::parse(uri).await.map_err(mongo_error)?;
        options.app_name.get_or_insert_with(|| "toxscan".to_string());

        Ok(Self {
            options,
            transactions: false,
        })
    }

    /// Commit each bulk update in a transaction
    pub fn with_transactions(mut self, enabled: bool) -> Self {
        self.transactions = enabled;
        self
    }
}

#[async_trait]
impl StoreConnector for MongoStore {
    async fn connect(&self, database: &str) -> Result<Box<dyn DocumentStore>> {
        if database.is_empty() {
            return Err(Error::persistence("database name is empty"));
        }

        let client = Client::with_options(self.options.clone()).map_err(mongo_error)?;
        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }).await.map_err(mongo_error)?;

        debug!(database = database, "Connected to MongoDB");

        Ok(Box::new(MongoDatabase {
            client,
            db,
            transactions: self.transactions,
        }))
    }

    fn name(&self) -> &str {
        "mongo"
    }
}

/// Connection to one MongoDB database
pub struct MongoDatabase {
    client: Client,
    db: Database,
    transactions: bool,
}

impl MongoDatabase {
    fn collection(&self, collection: &str) -> Result<Collection<BsonDocument>> {
        if collection.is_empty() {
            return Err(Error::persistence("collection name is empty"));
        }
        Ok(self.db.collection(collection))
    }

    async fn update_all(
        coll: &Collection<BsonDocument>,
        ops: Vec<(BsonDocument, Option<BsonDocument>)>,
        mut session: Option<&mut ClientSession>,
    ) -> Result<BulkWriteResult> {
        let mut result = BulkWriteResult::default();

        for (filter, update) in ops {
            // MongoDB rejects an empty `$set`; such an update only counts as matched.
            let Some(update) = update else {
                let count = match session.as_deref_mut() {
                    Some(s) => coll.count_documents(filter).session(s).await,
                    None => coll.count_documents(filter).await,
                }
                .map_err(mongo_error)?;
                result.matched += count.min(1) as usize;
                continue;
            };

            let outcome = match session.as_deref_mut() {
                Some(s) => coll.update_one(filter, update).session(s).await,
                None => coll.update_one(filter, update).await,
            }
            .map_err(mongo_error)?;

            result.matched += outcome.matched_count as usize;
            result.modified += outcome.modified_count as usize;
        }

        Ok(result)
    }
}

#[async_trait]
impl DocumentStore for MongoDatabase {
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>> {
        let coll = self.collection(collection)?;
        if query.limit == Some(0) {
            return Ok(Vec::new());
        }

        let cursor = coll.aggregate(find_pipeline(query)).await.map_err(mongo_error)?;
        let documents: Vec<BsonDocument> = cursor.try_collect().await.map_err(mongo_error)?;

        documents.into_iter().map(from_bson_document).collect()
    }

    async fn get(&self, collection: &str, id: &Value) -> Result<Option<Document>> {
        let coll = self.collection(collection)?;
        let found = coll.find_one(id_filter(id)?).await.map_err(mongo_error)?;
        found.map(from_bson_document).transpose()
    }

    async fn bulk_update(&self, collection: &str, updates: Vec<UpdateOne>) -> Result<BulkWriteResult> {
        validate_updates(&updates)?;
        let coll = self.collection(collection)?;

        let ops = updates
            .iter()
            .map(|update| Ok((id_filter(&update.id)?, set_update(&update.set)?)))
            .collect::<Result<Vec<_>>>()?;

        if !self.transactions {
            return Self::update_all(&coll, ops, None).await;
        }

        let mut session = self.client.start_session().await.map_err(mongo_error)?;
        session.start_transaction().await.map_err(mongo_error)?;

        match Self::update_all(&coll, ops, Some(&mut session)).await {
            Ok(result) => {
                session.commit_transaction().await.map_err(mongo_error)?;
                Ok(result)
            }
            Err(e) => {
                if let Err(abort) = session.abort_transaction().await {
                    warn!(collection = collection, error = %abort, "Failed to abort transaction");
                }
                Err(e)
            }
        }
    }

    async fn insert(&self, collection: &str, mut document: Document) -> Result<Value> {
        let coll = self.collection(collection)?;
        let id = ensure_id(&mut document);

        coll.insert_one(to_bson_document(&document)?)
            .await
            .map_err(mongo_error)?;
        Ok(id)
    }
}

/// Translate a query into an aggregation pipeline
pub(crate) fn find_pipeline(query: &FindQuery) -> Vec<BsonDocument> {
    let mut pipeline = Vec::new();

    if !query.missing.is_empty() {
        let mut filter = BsonDocument::new();
        for field in &query.missing {
            filter.insert(field.clone(), doc! { "$exists": false });
        }
        pipeline.push(doc! { "$match": filter });
    }

    let sorts_by_length = matches!(query.sort, Some((SortKey::Length(_), _)));
    match &query.sort {
        Some((SortKey::Value(field), order)) => {
            pipeline.push(doc! { "$sort": sort_spec(field, *order) });
        }
        Some((SortKey::Length(field), order)) => {
            let path = format!("${}", field);
            let mut computed = BsonDocument::new();
            computed.insert(
                SORT_LENGTH_FIELD,
                doc! { "$cond": [{ "$isArray": path.clone() }, { "$size": path }, 0] },
            );
            pipeline.push(doc! { "$addFields": computed });
            pipeline.push(doc! { "$sort": sort_spec(SORT_LENGTH_FIELD, *order) });
        }
        None => {}
    }

    if let Some(limit) = query.limit {
        pipeline.push(doc! { "$limit": limit as i64 });
    }

    if sorts_by_length {
        pipeline.push(doc! { "$unset": SORT_LENGTH_FIELD });
    }

    pipeline
}

/// Sort on `field`, ties broken by `_id`
fn sort_spec(field: &str, order: SortOrder) -> BsonDocument {
    let direction = match order {
        SortOrder::Ascending => 1,
        SortOrder::Descending => -1,
    };

    let mut spec = BsonDocument::new();
    spec.insert(field, direction);
    if field != fields::ID {
        spec.insert(fields::ID, 1);
    }
    spec
}

pub(crate) fn id_filter(id: &Value) -> Result<BsonDocument> {
    let mut filter = BsonDocument::new();
    filter.insert(fields::ID, to_bson(id)?);
    Ok(filter)
}

/// `{"$set": ..}` for a non-empty field set
pub(crate) fn set_update(set: &Document) -> Result<Option<BsonDocument>> {
    if set.is_empty() {
        return Ok(None);
    }
    Ok(Some(doc! { "$set": to_bson_document(set)? }))
}

fn to_bson(value: &Value) -> Result<Bson> {
    Bson::try_from(value.clone())
        .map_err(|e| Error::persistence(format!("value cannot be stored as BSON: {}", e)))
}

pub(crate) fn to_bson_document(document: &Document) -> Result<BsonDocument> {
    match to_bson(&Value::Object(document.clone()))? {
        Bson::Document(converted) => Ok(converted),
        other => Err(Error::persistence(format!(
            "document converted to a BSON {:?}",
            other.element_type()
        ))),
    }
}

pub(crate) fn from_bson_document(document: BsonDocument) -> Result<Document> {
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(converted) => Ok(converted),
        other => Err(Error::persistence(format!("expected a document, got {}", other))),
    }
}

fn mongo_error(e: mongodb::error::Error) -> Error {
    Error::persistence(format!("MongoDB: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use serde_json::json;

    fn doc_of(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_unscored_selection_pipeline() {
        let query = FindQuery::new()
            .missing("toxicity")
            .missing("toxicity_status")
            .limit(100);

        assert_eq!(
            find_pipeline(&query),
            vec![
                doc! { "$match": { "toxicity": { "$exists": false }, "toxicity_status": { "$exists": false } } },
                doc! { "$limit": 100_i64 },
            ]
        );
    }

    #[test]
    fn test_largest_threads_pipeline() {
        let query = FindQuery::new()
            .missing("toxicity_processed")
            .sort_by(SortKey::Length("posts".into()), SortOrder::Descending)
            .limit(2);

        assert_eq!(
            find_pipeline(&query),
            vec![
                doc! { "$match": { "toxicity_processed": { "$exists": false } } },
                doc! { "$addFields": {
                    "_toxscan_sort_length": { "$cond": [{ "$isArray": "$posts" }, { "$size": "$posts" }, 0] }
                } },
                doc! { "$sort": { "_toxscan_sort_length": -1, "_id": 1 } },
                doc! { "$limit": 2_i64 },
                doc! { "$unset": "_toxscan_sort_length" },
            ]
        );
    }

    #[test]
    fn test_value_sort_pipeline() {
        let query = FindQuery::new().sort_by(SortKey::Value("created_utc".into()), SortOrder::Ascending);
        assert_eq!(
            find_pipeline(&query),
            vec![doc! { "$sort": { "created_utc": 1, "_id": 1 } }]
        );

        let query = FindQuery::new().sort_by(SortKey::Value("_id".into()), SortOrder::Descending);
        assert_eq!(find_pipeline(&query), vec![doc! { "$sort": { "_id": -1 } }]);

        assert!(find_pipeline(&FindQuery::new()).is_empty());
    }

    #[test]
    fn test_update_translation() {
        let update = UpdateOne::new(json!(7))
            .set("toxicity", json!({ "class": "flag", "confidence": 0.95 }))
            .set("toxicity_status", json!("scored"));

        assert_eq!(id_filter(&update.id).unwrap(), doc! { "_id": 7 });
        assert_eq!(
            set_update(&update.set).unwrap(),
            Some(doc! { "$set": {
                "toxicity": { "class": "flag", "confidence": 0.95 },
                "toxicity_status": "scored",
            } })
        );
        assert_eq!(set_update(&Document::new()).unwrap(), None);
    }

    #[test]
    fn test_object_id_round_trips_through_json() {
        let oid = ObjectId::parse_str("5f1b0c2a9d3e4f5a6b7c8d9e").unwrap();
        let stored = doc! { "_id": oid, "text": "hi", "posts": [{ "no": 1 }] };

        let document = from_bson_document(stored).unwrap();
        assert_eq!(document["_id"], json!({ "$oid": "5f1b0c2a9d3e4f5a6b7c8d9e" }));
        assert_eq!(document["posts"], json!([{ "no": 1 }]));

        assert_eq!(id_filter(&document["_id"]).unwrap(), doc! { "_id": oid });
    }

    #[test]
    fn test_plain_documents_convert() {
        let document = doc_of(json!({ "_id": "abc", "n": 3, "x": 0.5, "none": null }));
        let converted = to_bson_document(&document).unwrap();
        assert_eq!(converted, doc! { "_id": "abc", "n": 3, "x": 0.5, "none": Bson::Null });
        assert_eq!(from_bson_document(converted).unwrap(), document);
    }

    #[tokio::test]
    async fn test_rejects_invalid_uri() {
        let err = MongoStore::new("localhost:27017").await.err().unwrap();
        assert!(err.is_persistence());
    }
}
