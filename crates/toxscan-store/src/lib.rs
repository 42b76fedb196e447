//! toxscan Store
//!
//! Document store abstraction used by the batch processors.
//!
//! Provides:
//! - [`DocumentStore`]: filtered, sorted, limited reads and all-or-nothing bulk updates
//! - [`StoreConnector`]: opens one independent connection per batch job
//! - [`MemoryStore`]: shared in-process store for tests and dry runs
//! - [`JsonlStore`]: file-backed store, one JSON-lines file per collection
//! - [`MongoStore`]: MongoDB deployment, one client per connection

pub mod jsonl;
pub mod memory;
pub mod mongo;
pub mod query;
pub mod store;

pub use jsonl::JsonlStore;
pub use memory::{MemoryDatabase, MemoryStore};
pub use mongo::MongoStore;
pub use query::{FindQuery, SortKey, SortOrder};
pub use store::{BulkWriteResult, Document, DocumentStore, StoreConnector, UpdateOne};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::query::{FindQuery, SortKey, SortOrder};
    pub use crate::store::{BulkWriteResult, Document, DocumentStore, StoreConnector, UpdateOne};
}
