//! JSON-lines file store
//!
//! Layout:
//! ```text
//! <root>/<database>/<collection>.jsonl
//! ```
//!
//! One document per line. Bulk updates rewrite the collection into a
//! temporary file and rename it over the original, so a failed write leaves
//! the collection untouched.

use crate::query::FindQuery;
use crate::store::{
    apply_updates, ensure_id, validate_updates, BulkWriteResult, Document, DocumentStore,
    StoreConnector, UpdateOne,
};
use async_trait::async_trait;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use toxscan_core::{fields, Error, Result};
use tracing::{debug, info};

/// File-backed store rooted at a directory
#[derive(Clone)]
pub struct JsonlStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonlStore {
    /// Create a store rooted at `root`; directories are created on connect
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl StoreConnector for JsonlStore {
    async fn connect(&self, database: &str) -> Result<Box<dyn DocumentStore>> {
        if database.is_empty() || database.contains(['/', '\\']) || database == ".." {
            return Err(Error::persistence(format!("invalid database name: {:?}", database)));
        }

        let dir = self.root.join(database);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::persistence(format!("Failed to open database {:?}: {}", dir, e)))?;

        debug!(dir = ?dir, "Connected to JSON-lines database");

        Ok(Box::new(JsonlDatabase {
            dir,
            write_lock: Arc::clone(&self.write_lock),
        }))
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

/// Connection to one database directory
pub struct JsonlDatabase {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonlDatabase {
    fn collection_path(&self, collection: &str) -> Result<PathBuf> {
        if collection.is_empty() || collection.contains(['/', '\\']) || collection == ".." {
            return Err(Error::persistence(format!(
                "invalid collection name: {:?}",
                collection
            )));
        }
        Ok(self.dir.join(format!("{}.jsonl", collection)))
    }
}

#[async_trait]
impl DocumentStore for JsonlDatabase {
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>> {
        let path = self.collection_path(collection)?;
        let documents = run_blocking(move || read_collection(&path)).await?;
        Ok(query.apply(&documents))
    }

    async fn get(&self, collection: &str, id: &Value) -> Result<Option<Document>> {
        let path = self.collection_path(collection)?;
        let documents = run_blocking(move || read_collection(&path)).await?;
        Ok(documents
            .into_iter()
            .find(|doc| doc.get(fields::ID) == Some(id)))
    }

    async fn bulk_update(&self, collection: &str, updates: Vec<UpdateOne>) -> Result<BulkWriteResult> {
        validate_updates(&updates)?;
        let path = self.collection_path(collection)?;

        let _guard = self.write_lock.lock().await;
        let result = run_blocking(move || {
            let mut documents = read_collection(&path)?;
            let result = apply_updates(&mut documents, &updates);
            if result.modified > 0 {
                write_collection(&path, &documents)?;
            }
            Ok(result)
        })
        .await?;

        info!(
            collection,
            matched = result.matched,
            modified = result.modified,
            "Bulk update written"
        );
        Ok(result)
    }

    async fn insert(&self, collection: &str, mut document: Document) -> Result<Value> {
        let path = self.collection_path(collection)?;
        let id = ensure_id(&mut document);

        let _guard = self.write_lock.lock().await;
        run_blocking(move || {
            let line = serde_json::to_string(&document)?;
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            writeln!(file, "{}", line)?;
            Ok(())
        })
        .await?;

        Ok(id)
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::internal(format!("store task failed: {}", e)))?
        .map_err(|e| match e {
            Error::Io(io) => Error::persistence(io.to_string()),
            other => other,
        })
}

/// Read every document of a collection; a missing file is an empty collection
fn read_collection(path: &Path) -> Result<Vec<Document>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut documents = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(&line) {
            Ok(Value::Object(doc)) => documents.push(doc),
            Ok(_) => {
                return Err(Error::persistence(format!(
                    "{:?} line {}: not a JSON object",
                    path,
                    idx + 1
                )))
            }
            Err(e) => {
                return Err(Error::persistence(format!(
                    "{:?} line {}: {}",
                    path,
                    idx + 1,
                    e
                )))
            }
        }
    }

    Ok(documents)
}

/// Replace a collection file atomically
fn write_collection(path: &Path, documents: &[Document]) -> Result<()> {
    let tmp_path = path.with_extension("jsonl.tmp");

    {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        for doc in documents {
            serde_json::to_writer(&mut writer, doc)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
