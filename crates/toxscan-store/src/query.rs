//! Find queries: missing-field filters, sorting, and limits

use crate::store::Document;
use serde_json::Value;
use std::cmp::Ordering;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// What to sort documents by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// The value of a field
    Value(String),

    /// The length of an array field; missing or non-array counts as 0
    Length(String),
}

/// Filter for [`DocumentStore::find`](crate::DocumentStore::find)
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    /// Fields that must all be absent
    pub missing: Vec<String>,

    /// Optional sort
    pub sort: Option<(SortKey, SortOrder)>,

    /// Maximum results to return
    pub limit: Option<usize>,
}

impl FindQuery {
    /// Create a new empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a field to be absent
    pub fn missing(mut self, field: impl Into<String>) -> Self {
        self.missing.push(field.into());
        self
    }

    /// Sort results
    pub fn sort_by(mut self, key: SortKey, order: SortOrder) -> Self {
        self.sort = Some((key, order));
        self
    }

    /// Set limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if a document matches the filter
    pub fn matches(&self, document: &Document) -> bool {
        self.missing.iter().all(|field| !document.contains_key(field))
    }

    /// Filter, sort, and limit documents in natural order.
    ///
    /// Sorting is stable, so ties keep natural order.
    pub fn apply<'a, I>(&self, documents: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut selected: Vec<&Document> =
            documents.into_iter().filter(|doc| self.matches(doc)).collect();

        if let Some((key, order)) = &self.sort {
            selected.sort_by(|a, b| {
                let ord = match key {
                    SortKey::Value(field) => compare_values(a.get(field), b.get(field)),
                    SortKey::Length(field) => array_len(a, field).cmp(&array_len(b, field)),
                };
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            });
        }

        let limit = self.limit.unwrap_or(usize::MAX);
        selected.into_iter().take(limit).cloned().collect()
    }
}

fn array_len(document: &Document, field: &str) -> usize {
    document
        .get(field)
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

/// Order values by type first (missing/null, bool, number, string, other),
/// then by value within a type.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
