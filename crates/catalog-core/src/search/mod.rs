//! Search results resolved to catalog records.
//!
//! [`execute_search`] runs a query and resolves every hit to its record at
//! query time, so the resulting [`SearchResults`] (and the
//! [`SearchQuerySetWrapper`] around it) never touch storage again.

mod index;
mod wrapper;

pub use index::{MemorySearchIndex, ScoredId, SearchIndex, SearchQuery};
pub use wrapper::SearchQuerySetWrapper;

use catalog_store::{Record, RecordId, RecordStore, RecordStoreExt};
use tracing::{debug, warn};

use crate::error::Result;

/// An already-materialized search result entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<R> {
    pub id: RecordId,
    pub score: f32,
    /// The record the hit resolves to
    pub object: R,
}

/// Ordered hits of one executed query.
#[derive(Debug, Clone)]
pub struct SearchResults<R> {
    index: String,
    hits: Vec<SearchHit<R>>,
    /// Hits the backend returned, including ones that did not resolve
    total_hits: usize,
}

impl<R> SearchResults<R> {
    pub fn new(index: impl Into<String>, hits: Vec<SearchHit<R>>) -> Self {
        let total_hits = hits.len();
        Self {
            index: index.into(),
            hits,
            total_hits,
        }
    }

    /// Record the backend's raw hit count. Never below the resolved count.
    pub fn with_total_hits(mut self, total_hits: usize) -> Self {
        self.total_hits = total_hits.max(self.hits.len());
        self
    }

    /// Number of hits the backend returned before resolution.
    pub fn total_hits(&self) -> usize {
        self.total_hits
    }

    /// Backend hits dropped because their record no longer exists.
    pub fn stale_hits(&self) -> usize {
        self.total_hits - self.hits.len()
    }

    /// Name of the index the query ran against.
    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn count(&self) -> usize {
        self.hits.len()
    }

    pub fn hits(&self) -> &[SearchHit<R>] {
        &self.hits
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchHit<R>> {
        self.hits.iter()
    }
}

impl<R> std::ops::Index<usize> for SearchResults<R> {
    type Output = SearchHit<R>;

    fn index(&self, index: usize) -> &SearchHit<R> {
        &self.hits[index]
    }
}

/// Run `query` against `index` and resolve the hits to `R` records.
///
/// Hits whose record no longer exists in the store are stale index entries
/// and are skipped; [`SearchResults::total_hits`] still counts them and
/// [`SearchResults::stale_hits`] reports how many were dropped.
pub async fn execute_search<R, I, S>(index: &I, store: &S, query: &str) -> Result<SearchResults<R>>
where
    R: Record,
    I: SearchIndex + ?Sized,
    S: RecordStore + ?Sized,
{
    let parsed = SearchQuery::parse(query)?;
    let scored = index.search(&parsed).await?;
    let total_hits = scored.len();

    let mut hits = Vec::with_capacity(scored.len());
    for ScoredId { id, score } in scored {
        match store.find::<R>(id).await? {
            Some(object) => hits.push(SearchHit { id, score, object }),
            None => warn!(
                event = "search.stale_hit",
                index = %index.name(),
                model = R::MODEL,
                id = %id,
            ),
        }
    }

    debug!(
        index = %index.name(),
        query = %query,
        hits = hits.len(),
        total_hits,
        "search executed"
    );
    Ok(SearchResults::new(index.name(), hits).with_total_hits(total_hits))
}
