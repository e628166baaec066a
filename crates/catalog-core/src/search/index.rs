//! Search index backends.
//!
//! `SearchIndex` is the seam to a real search cluster client;
//! `MemorySearchIndex` implements the `field:value` subset of query-string
//! syntax over in-memory JSON documents.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use catalog_store::RecordId;
use serde_json::Value;

use crate::error::{CatalogError, Result};

/// Parsed query-string query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// `*` or an empty query
    All,
    /// `field:value`, case-insensitive substring match on `field`
    Field { field: String, value: String },
    /// bare text, matched against every top-level field
    Text(String),
}

impl SearchQuery {
    /// Parse `*`, `field:value`, `field:"quoted value"` or free text.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "*" {
            return Ok(SearchQuery::All);
        }

        match raw.split_once(':') {
            Some((field, value)) => {
                let field = field.trim();
                if field.is_empty() || field.contains(char::is_whitespace) {
                    return Err(CatalogError::InvalidQuery(raw.to_string()));
                }
                let value = unquote(value.trim());
                if value.is_empty() {
                    return Err(CatalogError::InvalidQuery(raw.to_string()));
                }
                Ok(SearchQuery::Field {
                    field: field.to_string(),
                    value: value.to_string(),
                })
            }
            None => Ok(SearchQuery::Text(unquote(raw).to_string())),
        }
    }

    /// Score of `document` for this query, `None` if it does not match.
    fn score(&self, document: &Value) -> Option<f32> {
        match self {
            SearchQuery::All => Some(1.0),
            SearchQuery::Field { field, value } => {
                let needle = value.to_lowercase();
                document
                    .get(field)
                    .map(|candidate| match_count(candidate, &needle))
                    .filter(|hits| *hits > 0)
                    .map(|hits| hits as f32)
            }
            SearchQuery::Text(text) => {
                let needle = text.to_lowercase();
                let hits: usize = document
                    .as_object()
                    .map(|fields| fields.values().map(|v| match_count(v, &needle)).sum())
                    .unwrap_or(0);
                (hits > 0).then_some(hits as f32)
            }
        }
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn match_count(value: &Value, needle: &str) -> usize {
    match value {
        Value::String(s) => usize::from(s.to_lowercase().contains(needle)),
        Value::Number(n) => usize::from(n.to_string() == needle),
        Value::Bool(b) => usize::from(b.to_string() == needle),
        Value::Array(items) => items.iter().map(|item| match_count(item, needle)).sum(),
        Value::Null | Value::Object(_) => 0,
    }
}

/// A hit as returned by the backend, before resolution to a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredId {
    pub id: RecordId,
    pub score: f32,
}

/// Search backend client.
///
/// Guarantees:
/// - `index_document` inserts or replaces the document for `id`.
/// - `search` returns hits by descending score, ties by ascending id.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Index name.
    fn name(&self) -> &str;

    async fn index_document(&self, id: RecordId, document: Value) -> Result<()>;

    /// Remove a document; `false` if it was not indexed.
    async fn remove(&self, id: RecordId) -> Result<bool>;

    async fn document(&self, id: RecordId) -> Result<Option<Value>>;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<ScoredId>>;

    /// Number of indexed documents.
    async fn count(&self) -> Result<usize>;
}

/// In-memory search index keyed by record id.
#[derive(Debug)]
pub struct MemorySearchIndex {
    name: String,
    documents: Mutex<BTreeMap<RecordId, Value>>,
}

impl MemorySearchIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Mutex::new(BTreeMap::new()),
        }
    }

    fn documents(&self) -> Result<MutexGuard<'_, BTreeMap<RecordId, Value>>> {
        self.documents
            .lock()
            .map_err(|_| CatalogError::Search("search index lock poisoned".to_string()))
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn index_document(&self, id: RecordId, document: Value) -> Result<()> {
        self.documents()?.insert(id, document);
        Ok(())
    }

    async fn remove(&self, id: RecordId) -> Result<bool> {
        Ok(self.documents()?.remove(&id).is_some())
    }

    async fn document(&self, id: RecordId) -> Result<Option<Value>> {
        Ok(self.documents()?.get(&id).cloned())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<ScoredId>> {
        let documents = self.documents()?;
        let mut hits: Vec<ScoredId> = documents
            .iter()
            .filter_map(|(id, document)| {
                query
                    .score(document)
                    .map(|score| ScoredId { id: *id, score })
            })
            .collect();
        // BTreeMap iteration already orders ties by id; the sort is stable.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.documents()?.len())
    }
}
