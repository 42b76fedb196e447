//! toxscan Core
//!
//! Core types, error kinds, and utilities shared across toxscan components.
//!
//! This crate provides:
//! - The toxicity result and thread summary types persisted alongside content
//! - The tri-state scoring marker used to keep selection idempotent
//! - Error types and result handling
//! - Epoch timestamp normalization

pub mod error;
pub mod timestamp;
pub mod types;

pub use error::{ClassificationError, Error, Result};
pub use timestamp::{normalize, normalize_value, try_normalize, TimestampError, INVALID_DATE};
pub use types::{fields, ScoreStatus, ThreadSummary, ToxicityResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{ClassificationError, Error, Result};
    pub use crate::types::{ScoreStatus, ThreadSummary, ToxicityResult};
}
