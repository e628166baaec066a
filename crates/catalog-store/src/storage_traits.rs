//! Storage trait definitions for the catalog
//!
//! These traits define the core storage abstractions:
//! - `Record`: a typed entity with an id and statically declared relations
//! - `RelationRegistry`: "what points at model X" without runtime reflection
//! - `RecordStore`: backend-agnostic persistence (save/get/all/delete_many)
//! - `RecordStoreExt`: typed helpers over any `RecordStore`
//!
//! Records travel through the store as JSON field maps. In-memory fakes are
//! provided via the `fakes` module.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StoreError>;

/// Field map of a single stored record.
pub type Fields = Map<String, Value>;

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// Primary key of a record.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Read an id out of a JSON value. Accepts non-negative integers only.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_u64().map(RecordId)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        RecordId(id)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// Cardinality of a relation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// Single optional reference (`null` or an id)
    ForeignKey,
    /// List of references
    ManyToMany,
}

/// Relation descriptor: `source.field -> target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelationDescriptor {
    pub source: &'static str,
    pub field: &'static str,
    pub target: &'static str,
    pub kind: RelationKind,
    related_name: Option<&'static str>,
}

impl RelationDescriptor {
    pub const fn foreign_key(
        source: &'static str,
        field: &'static str,
        target: &'static str,
    ) -> Self {
        Self {
            source,
            field,
            target,
            kind: RelationKind::ForeignKey,
            related_name: None,
        }
    }

    pub const fn many_to_many(
        source: &'static str,
        field: &'static str,
        target: &'static str,
    ) -> Self {
        Self {
            source,
            field,
            target,
            kind: RelationKind::ManyToMany,
            related_name: None,
        }
    }

    /// Override the name the target uses to refer back to the source.
    pub const fn with_related_name(mut self, name: &'static str) -> Self {
        self.related_name = Some(name);
        self
    }

    /// Reverse accessor name as seen from the target model.
    ///
    /// Defaults to the lowercase source model name.
    pub fn related_name(&self) -> String {
        match self.related_name {
            Some(name) => name.to_string(),
            None => self.source.to_lowercase(),
        }
    }

    /// Ids referenced by this relation in one source record.
    pub fn referenced_ids(&self, fields: &Fields) -> StorageResult<Vec<RecordId>> {
        let invalid = |value: &Value| StoreError::InvalidReference {
            model: self.source.to_string(),
            field: self.field.to_string(),
            value: value.to_string(),
        };

        match (self.kind, fields.get(self.field)) {
            (_, None) | (_, Some(Value::Null)) => Ok(Vec::new()),
            (RelationKind::ForeignKey, Some(value)) => RecordId::from_value(value)
                .map(|id| vec![id])
                .ok_or_else(|| invalid(value)),
            (RelationKind::ManyToMany, Some(Value::Array(items))) => items
                .iter()
                .map(|item| RecordId::from_value(item).ok_or_else(|| invalid(item)))
                .collect(),
            (RelationKind::ManyToMany, Some(value)) => Err(invalid(value)),
        }
    }

    /// Whether one source record references any of `targets`.
    pub fn references_any(
        &self,
        fields: &Fields,
        targets: &BTreeSet<RecordId>,
    ) -> StorageResult<bool> {
        Ok(self
            .referenced_ids(fields)?
            .iter()
            .any(|id| targets.contains(id)))
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A typed catalog entity.
///
/// Implementors declare their model name and outgoing relations as
/// constants; fields are read and written through serde.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Model name, unique across the registry.
    const MODEL: &'static str;

    /// Outgoing relations declared on this model.
    const RELATIONS: &'static [RelationDescriptor] = &[];

    fn id(&self) -> RecordId;

    /// Serialize into a field map.
    fn to_fields(&self) -> StorageResult<Fields> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Serialization(format!(
                "{} serialized to non-object value: {other}",
                Self::MODEL
            ))),
        }
    }

    /// Rebuild a record from a field map.
    fn from_fields(fields: Fields) -> StorageResult<Self> {
        Ok(serde_json::from_value(Value::Object(fields))?)
    }
}

// ---------------------------------------------------------------------------
// RelationRegistry
// ---------------------------------------------------------------------------

/// Statically declared relation metadata of every registered model.
#[derive(Debug, Clone, Default)]
pub struct RelationRegistry {
    models: BTreeSet<&'static str>,
    relations: Vec<RelationDescriptor>,
}

impl RelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model and its outgoing relations. Idempotent.
    pub fn register<R: Record>(&mut self) -> &mut Self {
        if self.models.insert(R::MODEL) {
            self.relations.extend_from_slice(R::RELATIONS);
        }
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<R: Record>(mut self) -> Self {
        self.register::<R>();
        self
    }

    pub fn is_registered(&self, model: &str) -> bool {
        self.models.contains(model)
    }

    pub fn models(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.models.iter().copied()
    }

    /// Relations whose target is `model`, in registration order.
    pub fn relations_to<'a>(
        &'a self,
        model: &'a str,
    ) -> impl Iterator<Item = &'a RelationDescriptor> + 'a {
        self.relations.iter().filter(move |rel| rel.target == model)
    }

    /// Relations declared on `model`.
    pub fn relations_from<'a>(
        &'a self,
        model: &'a str,
    ) -> impl Iterator<Item = &'a RelationDescriptor> + 'a {
        self.relations.iter().filter(move |rel| rel.source == model)
    }
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// Backend-agnostic record persistence.
///
/// Guarantees:
/// - `save` inserts or replaces the record with the given id.
/// - `all` returns records ordered by id.
/// - `delete_many` removes the whole batch or fails without removing any.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace a record.
    async fn save(&self, model: &str, id: RecordId, fields: Fields) -> StorageResult<()>;

    /// Fetch a record, `None` if absent.
    async fn get(&self, model: &str, id: RecordId) -> StorageResult<Option<Fields>>;

    /// Every record of a model, ordered by id.
    async fn all(&self, model: &str) -> StorageResult<Vec<(RecordId, Fields)>>;

    /// Delete a batch of records, returning how many existed.
    async fn delete_many(&self, model: &str, ids: &BTreeSet<RecordId>) -> StorageResult<u64>;

    /// Ids of every record of a model.
    async fn ids(&self, model: &str) -> StorageResult<BTreeSet<RecordId>> {
        Ok(self.all(model).await?.into_iter().map(|(id, _)| id).collect())
    }

    /// Target ids referenced through `relation` by any source record.
    async fn referenced_ids(
        &self,
        relation: &RelationDescriptor,
    ) -> StorageResult<BTreeSet<RecordId>> {
        let mut referenced = BTreeSet::new();
        for (_, fields) in self.all(relation.source).await? {
            referenced.extend(relation.referenced_ids(&fields)?);
        }
        Ok(referenced)
    }

    /// Source records of `relation` that reference any of `targets`,
    /// ordered by id.
    ///
    /// Backends that can filter on a field should override this; the
    /// provided version scans every source record.
    async fn find_referencing(
        &self,
        relation: &RelationDescriptor,
        targets: &BTreeSet<RecordId>,
    ) -> StorageResult<Vec<(RecordId, Fields)>> {
        let mut matching = Vec::new();
        for (id, fields) in self.all(relation.source).await? {
            if relation.references_any(&fields, targets)? {
                matching.push((id, fields));
            }
        }
        Ok(matching)
    }
}

/// Typed helpers available on every [`RecordStore`].
#[async_trait]
pub trait RecordStoreExt: RecordStore {
    async fn save_record<R: Record>(&self, record: &R) -> StorageResult<()> {
        let fields = record.to_fields()?;
        self.save(R::MODEL, record.id(), fields).await
    }

    async fn find<R: Record>(&self, id: RecordId) -> StorageResult<Option<R>> {
        match self.get(R::MODEL, id).await? {
            Some(fields) => Ok(Some(R::from_fields(fields)?)),
            None => Ok(None),
        }
    }

    /// Like [`find`](Self::find) but a missing record is `StoreError::NotFound`.
    async fn load<R: Record>(&self, id: RecordId) -> StorageResult<R> {
        self.find::<R>(id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                model: R::MODEL.to_string(),
                id: id.0,
            })
    }

    async fn load_all<R: Record>(&self) -> StorageResult<Vec<R>> {
        self.all(R::MODEL)
            .await?
            .into_iter()
            .map(|(_, fields)| R::from_fields(fields))
            .collect()
    }

    /// Load several records keyed by id, skipping ids that no longer exist.
    async fn load_many<R: Record>(
        &self,
        ids: &[RecordId],
    ) -> StorageResult<BTreeMap<RecordId, R>> {
        let mut loaded = BTreeMap::new();
        for id in ids {
            if let Some(record) = self.find::<R>(*id).await? {
                loaded.insert(*id, record);
            }
        }
        Ok(loaded)
    }

    async fn exists<R: Record>(&self, id: RecordId) -> StorageResult<bool> {
        Ok(self.get(R::MODEL, id).await?.is_some())
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}
