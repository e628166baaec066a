//! Query-set view over search results.

use catalog_store::Record;

use super::SearchResults;
use crate::query::{ModelRef, QuerySet};

/// Makes [`SearchResults`] usable wherever a [`QuerySet`] is expected.
///
/// Results are fully materialized, so `prefetch_related` and
/// `select_related` are accepted and ignored.
#[derive(Debug, Clone)]
pub struct SearchQuerySetWrapper<R> {
    results: SearchResults<R>,
    model: ModelRef<R>,
}

impl<R: Record> SearchQuerySetWrapper<R> {
    pub fn new(results: SearchResults<R>, model: ModelRef<R>) -> Self {
        Self { results, model }
    }

    /// Model name the hits resolve to.
    pub fn model(&self) -> &'static str {
        self.model.model()
    }

    pub fn results(&self) -> &SearchResults<R> {
        &self.results
    }

    pub fn into_inner(self) -> SearchResults<R> {
        self.results
    }
}

impl<R> QuerySet for SearchQuerySetWrapper<R> {
    type Item = R;

    fn count(&self) -> usize {
        self.results.count()
    }

    fn get(&self, index: usize) -> Option<&R> {
        self.results.hits().get(index).map(|hit| &hit.object)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &R> + '_> {
        Box::new(self.results.iter().map(|hit| &hit.object))
    }

    fn prefetch_related(self, _lookups: &[&str]) -> Self {
        self
    }

    fn select_related(self, _fields: &[&str]) -> Self {
        self
    }
}

impl<R> std::ops::Index<usize> for SearchQuerySetWrapper<R> {
    type Output = R;

    fn index(&self, index: usize) -> &R {
        &self.results[index].object
    }
}

impl<'a, R> IntoIterator for &'a SearchQuerySetWrapper<R> {
    type Item = &'a R;
    type IntoIter = Box<dyn Iterator<Item = &'a R> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
