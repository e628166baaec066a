//! Query-set abstraction shared by storage-backed and search-backed results.
//!
//! Callers that only need "count, index, iterate" depend on [`QuerySet`]
//! instead of on a concrete result type.

use std::marker::PhantomData;

use catalog_store::Record;

/// Materialized, ordered collection of records.
pub trait QuerySet {
    type Item;

    /// Number of records.
    fn count(&self) -> usize;

    /// Record at `index`, `None` when out of range.
    fn get(&self, index: usize) -> Option<&Self::Item>;

    /// Records in result order.
    fn iter(&self) -> Box<dyn Iterator<Item = &Self::Item> + '_>;

    /// Hint that the named relations will be traversed. Implementations may
    /// ignore it.
    fn prefetch_related(self, lookups: &[&str]) -> Self
    where
        Self: Sized;

    /// Hint that the named foreign keys will be followed.
    fn select_related(self, fields: &[&str]) -> Self
    where
        Self: Sized;

    fn is_empty(&self) -> bool {
        self.count() == 0
    }

    fn first(&self) -> Option<&Self::Item> {
        self.get(0)
    }
}

/// Storage-backed query set over loaded records of `R`.
#[derive(Debug, Clone)]
pub struct RecordQuerySet<R> {
    records: Vec<R>,
    related_hints: Vec<String>,
}

impl<R: Record> RecordQuerySet<R> {
    pub fn from_records(records: Vec<R>) -> Self {
        Self {
            records,
            related_hints: Vec::new(),
        }
    }

    /// Keep only the records matching `predicate`.
    pub fn filter(mut self, predicate: impl Fn(&R) -> bool) -> Self {
        self.records.retain(|record| predicate(record));
        self
    }

    /// Drop the records matching `predicate`.
    pub fn exclude(self, predicate: impl Fn(&R) -> bool) -> Self {
        self.filter(|record| !predicate(record))
    }

    /// Relation hints recorded by `prefetch_related` / `select_related`.
    ///
    /// Informational only: nothing in this crate reads them back. They name
    /// the joins a backend could perform; the in-memory loaders fetch
    /// related records in per-page batches instead.
    pub fn related_hints(&self) -> &[String] {
        &self.related_hints
    }

    pub fn into_vec(self) -> Vec<R> {
        self.records
    }
}

impl<R> QuerySet for RecordQuerySet<R> {
    type Item = R;

    fn count(&self) -> usize {
        self.records.len()
    }

    fn get(&self, index: usize) -> Option<&R> {
        self.records.get(index)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &R> + '_> {
        Box::new(self.records.iter())
    }

    fn prefetch_related(mut self, lookups: &[&str]) -> Self {
        self.related_hints
            .extend(lookups.iter().map(|lookup| lookup.to_string()));
        self
    }

    fn select_related(mut self, fields: &[&str]) -> Self {
        self.related_hints
            .extend(fields.iter().map(|field| field.to_string()));
        self
    }
}

impl<R> std::ops::Index<usize> for RecordQuerySet<R> {
    type Output = R;

    fn index(&self, index: usize) -> &R {
        &self.records[index]
    }
}

impl<'a, R> IntoIterator for &'a RecordQuerySet<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Zero-sized marker naming the record type a result set resolves to.
#[derive(Debug)]
pub struct ModelRef<R>(PhantomData<fn() -> R>);

impl<R> Default for ModelRef<R> {
    fn default() -> Self {
        ModelRef(PhantomData)
    }
}

impl<R> Clone for ModelRef<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for ModelRef<R> {}

impl<R: Record> ModelRef<R> {
    pub fn model(&self) -> &'static str {
        R::MODEL
    }
}
