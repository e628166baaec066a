//! Generic model utilities over the relation registry.
//!
//! - [`get_all_related_field_names`]: reverse relation names of a model
//! - [`delete_orphans`]: remove records nothing points at
//! - [`update_instance`] / [`update_instance_and_commit`]: partial updates

use std::collections::BTreeSet;

use catalog_store::{
    Fields, Record, RecordId, RecordStore, RecordStoreExt, RelationRegistry, StorageResult,
    StoreError,
};
use tracing::{debug, info, instrument};

/// Names of every relation on other models that points at `R`.
///
/// Empty when nothing references `R`.
pub fn get_all_related_field_names<R: Record>(registry: &RelationRegistry) -> Vec<String> {
    related_field_names_for(registry, R::MODEL)
}

/// [`get_all_related_field_names`] keyed by model name.
pub fn related_field_names_for(registry: &RelationRegistry, model: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for relation in registry.relations_to(model) {
        let name = relation.related_name();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Delete every `R` that no registered relation references, except the ids
/// in `excluded`. Returns the number of deleted records.
///
/// Orphans are collected first and removed with a single `delete_many`
/// batch. Store errors propagate unchanged.
pub async fn delete_orphans<R, S>(
    store: &S,
    registry: &RelationRegistry,
    excluded: Option<&BTreeSet<RecordId>>,
) -> StorageResult<u64>
where
    R: Record,
    S: RecordStore + ?Sized,
{
    delete_orphans_by_model(store, registry, R::MODEL, excluded).await
}

/// [`delete_orphans`] keyed by model name.
#[instrument(skip(store, registry, excluded))]
pub async fn delete_orphans_by_model<S>(
    store: &S,
    registry: &RelationRegistry,
    model: &str,
    excluded: Option<&BTreeSet<RecordId>>,
) -> StorageResult<u64>
where
    S: RecordStore + ?Sized,
{
    if !registry.is_registered(model) {
        return Err(StoreError::UnknownModel {
            model: model.to_string(),
        });
    }

    let mut referenced = BTreeSet::new();
    for relation in registry.relations_to(model) {
        referenced.extend(store.referenced_ids(relation).await?);
    }

    let orphans: BTreeSet<RecordId> = store
        .ids(model)
        .await?
        .into_iter()
        .filter(|id| !referenced.contains(id))
        .filter(|id| excluded.map_or(true, |excluded| !excluded.contains(id)))
        .collect();

    if orphans.is_empty() {
        debug!(model = %model, "no orphans found");
        return Ok(0);
    }

    let deleted = store.delete_many(model, &orphans).await?;
    info!(
        event = "orphans.deleted",
        model = %model,
        deleted,
        excluded = excluded.map_or(0, BTreeSet::len),
    );
    Ok(deleted)
}

/// Apply `updated` to `instance` without persisting it.
///
/// Returns the (possibly modified) instance and whether any field value
/// actually changed. A `None` instance yields `(None, false)` without
/// looking at `updated`. Naming a field the record does not have is
/// `StoreError::UnknownField`.
pub fn update_instance<R: Record>(
    instance: Option<R>,
    updated: &Fields,
) -> StorageResult<(Option<R>, bool)> {
    let Some(instance) = instance else {
        return Ok((None, false));
    };

    let mut fields = instance.to_fields()?;
    let mut changed_fields = Vec::new();
    for (name, value) in updated {
        let current = fields
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownField {
                model: R::MODEL.to_string(),
                field: name.clone(),
            })?;
        if current != value {
            *current = value.clone();
            changed_fields.push(name.as_str());
        }
    }

    if changed_fields.is_empty() {
        return Ok((Some(instance), false));
    }

    debug!(
        event = "instance.updated",
        model = R::MODEL,
        id = %instance.id(),
        fields = ?changed_fields,
    );
    Ok((Some(R::from_fields(fields)?), true))
}

/// [`update_instance`], then persist the instance when `commit` is set and
/// something changed. Persistence errors propagate.
pub async fn update_instance_and_commit<R, S>(
    store: &S,
    instance: Option<R>,
    updated: &Fields,
    commit: bool,
) -> StorageResult<(Option<R>, bool)>
where
    R: Record,
    S: RecordStore + ?Sized,
{
    let (instance, changed) = update_instance(instance, updated)?;
    if commit && changed {
        if let Some(record) = &instance {
            store.save_record(record).await?;
        }
    }
    Ok((instance, changed))
}
