//! In-memory record store
//!
//! `MemoryRecordStore` satisfies the `RecordStore` contract without any
//! external dependencies. Used by tests and by the CLI, which loads and
//! writes JSON snapshots of the whole store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::StoreError;
use crate::storage_traits::*;

type Tables = BTreeMap<String, BTreeMap<RecordId, Fields>>;

/// In-memory store backed by `model -> (id -> fields)` maps.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: Mutex<Tables>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> StorageResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("record store lock poisoned".to_string()))
    }

    /// Build a store from a snapshot document.
    ///
    /// The snapshot is a JSON object mapping model names to arrays of
    /// records; every record must carry a numeric `id`.
    pub fn from_snapshot(snapshot: &Value) -> StorageResult<Self> {
        let models = snapshot
            .as_object()
            .ok_or_else(|| StoreError::Snapshot("top level must be an object".to_string()))?;

        let mut tables = Tables::new();
        for (model, records) in models {
            let records = records.as_array().ok_or_else(|| {
                StoreError::Snapshot(format!("'{model}' must be an array of records"))
            })?;
            let table = tables.entry(model.clone()).or_default();
            for record in records {
                let fields = record.as_object().cloned().ok_or_else(|| {
                    StoreError::Snapshot(format!("'{model}' contains a non-object record"))
                })?;
                let id = fields
                    .get("id")
                    .and_then(RecordId::from_value)
                    .ok_or_else(|| {
                        StoreError::Snapshot(format!("'{model}' record without a numeric id"))
                    })?;
                table.insert(id, fields);
            }
        }

        Ok(Self {
            tables: Mutex::new(tables),
        })
    }

    /// Export the whole store in the format read by [`from_snapshot`](Self::from_snapshot).
    pub fn snapshot(&self) -> StorageResult<Value> {
        let tables = self.tables()?;
        let models: Map<String, Value> = tables
            .iter()
            .map(|(model, table)| {
                let records = table.values().cloned().map(Value::Object).collect();
                (model.clone(), Value::Array(records))
            })
            .collect();
        Ok(Value::Object(models))
    }

    /// Number of stored records of a model.
    pub fn count(&self, model: &str) -> StorageResult<usize> {
        Ok(self.tables()?.get(model).map_or(0, BTreeMap::len))
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn save(&self, model: &str, id: RecordId, fields: Fields) -> StorageResult<()> {
        let mut tables = self.tables()?;
        tables.entry(model.to_string()).or_default().insert(id, fields);
        Ok(())
    }

    async fn get(&self, model: &str, id: RecordId) -> StorageResult<Option<Fields>> {
        let tables = self.tables()?;
        Ok(tables.get(model).and_then(|table| table.get(&id)).cloned())
    }

    async fn all(&self, model: &str) -> StorageResult<Vec<(RecordId, Fields)>> {
        let tables = self.tables()?;
        Ok(tables
            .get(model)
            .map(|table| {
                table
                    .iter()
                    .map(|(id, fields)| (*id, fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_many(&self, model: &str, ids: &BTreeSet<RecordId>) -> StorageResult<u64> {
        // Single lock for the whole batch.
        let mut tables = self.tables()?;
        let Some(table) = tables.get_mut(model) else {
            return Ok(0);
        };
        let deleted = ids.iter().filter(|id| table.remove(id).is_some()).count() as u64;
        debug!(model = %model, deleted, "delete_many");
        Ok(deleted)
    }

    async fn ids(&self, model: &str) -> StorageResult<BTreeSet<RecordId>> {
        let tables = self.tables()?;
        Ok(tables
            .get(model)
            .map(|table| table.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn find_referencing(
        &self,
        relation: &RelationDescriptor,
        targets: &BTreeSet<RecordId>,
    ) -> StorageResult<Vec<(RecordId, Fields)>> {
        let tables = self.tables()?;
        let Some(table) = tables.get(relation.source) else {
            return Ok(Vec::new());
        };
        // Only matching records are cloned out of the table.
        let mut matching = Vec::new();
        for (id, fields) in table {
            if relation.references_any(fields, targets)? {
                matching.push((*id, fields.clone()));
            }
        }
        Ok(matching)
    }
}
