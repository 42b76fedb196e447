//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use toxscan_classifiers::Classifier;
use toxscan_core::{ClassificationError, Error, Result, ToxicityResult};
use toxscan_store::{
    BulkWriteResult, Document, DocumentStore, FindQuery, MemoryStore, StoreConnector, UpdateOne,
};

/// Classifier answering from a fixed table
pub struct ScriptedClassifier {
    answers: HashMap<String, std::result::Result<ToxicityResult, ClassificationError>>,
    fallback: ToxicityResult,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self {
            answers: HashMap::new(),
            fallback: ToxicityResult::new(ToxicityResult::NORMAL, 0.5),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn answer(mut self, text: &str, label: &str, confidence: f64) -> Self {
        self.answers
            .insert(text.to_string(), Ok(ToxicityResult::new(label, confidence)));
        self
    }

    pub fn fail(mut self, text: &str, error: ClassificationError) -> Self {
        self.answers.insert(text.to_string(), Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, text: &str) -> std::result::Result<ToxicityResult, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(text.to_string());

        match self.answers.get(text) {
            Some(answer) => answer.clone(),
            None => Ok(self.fallback.clone()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Store wrapper whose bulk writes always fail
pub struct FailingWrites<S> {
    pub inner: S,
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for FailingWrites<S> {
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>> {
        self.inner.find(collection, query).await
    }

    async fn get(&self, collection: &str, id: &Value) -> Result<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn bulk_update(&self, _collection: &str, _updates: Vec<UpdateOne>) -> Result<BulkWriteResult> {
        Err(Error::persistence("write concern failed"))
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<Value> {
        self.inner.insert(collection, document).await
    }
}

/// Connector over a [`MemoryStore`] that refuses some databases
#[derive(Clone)]
pub struct FlakyConnector {
    pub store: MemoryStore,
    refused: Arc<Mutex<HashSet<String>>>,
    connects: Arc<AtomicUsize>,
}

impl FlakyConnector {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            refused: Arc::new(Mutex::new(HashSet::new())),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn refuse(&self, database: &str) {
        self.refused.lock().insert(database.to_string());
    }

    pub fn accept(&self, database: &str) {
        self.refused.lock().remove(database);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for FlakyConnector {
    async fn connect(&self, database: &str) -> Result<Box<dyn DocumentStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refused.lock().contains(database) {
            return Err(Error::persistence(format!("connection to {database} refused")));
        }
        self.store.connect(database).await
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Build a document from a JSON object literal
pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// A thread document with the given reply texts, numbered from 1
pub fn thread(id: i64, replies: &[&str]) -> Document {
    let posts: Vec<Value> = replies
        .iter()
        .enumerate()
        .map(|(i, text)| json!({ "no": i + 1, "com": text }))
        .collect();
    doc(json!({ "_id": id, "posts": posts }))
}
