//! Model utility tests: relation enumeration, orphan deletion, partial updates.

mod common;

use std::collections::BTreeSet;

use catalog_core::{
    delete_orphans, delete_orphans_by_model, get_all_related_field_names, update_instance,
    update_instance_and_commit,
};
use catalog_store::{
    catalog_registry, Fields, Image, MemoryRecordStore, Record, RecordId, RecordStore, RecordStoreExt,
    RelationDescriptor, RelationRegistry, StoreError, Video,
};
use common::Factory;
use serde::{Deserialize, Serialize};
use serde_json::json;

// ===========================================================================
// Relation enumeration
// ===========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UnrelatedModel {
    id: RecordId,
}

impl Record for UnrelatedModel {
    const MODEL: &'static str = "UnrelatedModel";

    fn id(&self) -> RecordId {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RelatedModel {
    id: RecordId,
}

impl Record for RelatedModel {
    const MODEL: &'static str = "RelatedModel";

    fn id(&self) -> RecordId {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForeignRelatedModel {
    id: RecordId,
    fk: RecordId,
}

impl Record for ForeignRelatedModel {
    const MODEL: &'static str = "ForeignRelatedModel";
    const RELATIONS: &'static [RelationDescriptor] = &[RelationDescriptor::foreign_key(
        "ForeignRelatedModel",
        "fk",
        "RelatedModel",
    )];

    fn id(&self) -> RecordId {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct M2MRelatedModel {
    id: RecordId,
    m2m: Vec<RecordId>,
}

impl Record for M2MRelatedModel {
    const MODEL: &'static str = "M2MRelatedModel";
    const RELATIONS: &'static [RelationDescriptor] = &[RelationDescriptor::many_to_many(
        "M2MRelatedModel",
        "m2m",
        "RelatedModel",
    )];

    fn id(&self) -> RecordId {
        self.id
    }
}

fn test_registry() -> RelationRegistry {
    RelationRegistry::new()
        .with::<UnrelatedModel>()
        .with::<RelatedModel>()
        .with::<ForeignRelatedModel>()
        .with::<M2MRelatedModel>()
}

#[test]
fn related_field_names_of_unrelated_model_is_empty() {
    let registry = test_registry();
    assert!(get_all_related_field_names::<UnrelatedModel>(&registry).is_empty());
}

#[test]
fn related_field_names_cover_fk_and_m2m() {
    let registry = test_registry();
    let names: BTreeSet<String> = get_all_related_field_names::<RelatedModel>(&registry)
        .into_iter()
        .collect();

    let expected: BTreeSet<String> = ["foreignrelatedmodel", "m2mrelatedmodel"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn orphans_referenced_through_m2m_are_kept() {
    let store = MemoryRecordStore::new();
    let registry = test_registry();
    for id in 1..=3 {
        store
            .save_record(&RelatedModel { id: RecordId(id) })
            .await
            .unwrap();
    }
    store
        .save_record(&ForeignRelatedModel {
            id: RecordId(10),
            fk: RecordId(1),
        })
        .await
        .unwrap();
    store
        .save_record(&M2MRelatedModel {
            id: RecordId(20),
            m2m: vec![RecordId(2)],
        })
        .await
        .unwrap();

    let deleted = delete_orphans::<RelatedModel, _>(&store, &registry, None)
        .await
        .unwrap();

    assert_eq!(deleted, 1);
    assert_eq!(
        store.ids(RelatedModel::MODEL).await.unwrap(),
        [RecordId(1), RecordId(2)].into_iter().collect()
    );
}

// ===========================================================================
// Orphan deletion over the catalog schema
// ===========================================================================

#[tokio::test]
async fn delete_orphans_removes_unreferenced_videos() {
    let store = MemoryRecordStore::new();
    let registry = catalog_registry();
    let factory = Factory::new(&store);

    let orphan = factory.video().await;
    let course_type = factory.course_type("verified-audit").await;
    let course = factory.course("edX+DemoX", &course_type).await;
    let used = factory.course_run(&course, "Demo").await.video.unwrap();

    delete_orphans::<Video, _>(&store, &registry, None)
        .await
        .unwrap();

    assert!(store.exists::<Video>(used).await.unwrap());
    assert!(!store.exists::<Video>(orphan.id).await.unwrap());
}

#[tokio::test]
async fn delete_orphans_respects_exclusions() {
    let store = MemoryRecordStore::new();
    let registry = catalog_registry();
    let factory = Factory::new(&store);

    let orphan = factory.video().await;
    let excluded: BTreeSet<_> = [orphan.id].into_iter().collect();

    let deleted = delete_orphans::<Video, _>(&store, &registry, Some(&excluded))
        .await
        .unwrap();

    assert_eq!(deleted, 0);
    assert!(store.exists::<Video>(orphan.id).await.unwrap());
}

#[tokio::test]
async fn delete_orphans_keeps_images_referenced_by_videos() {
    let store = MemoryRecordStore::new();
    let registry = catalog_registry();
    let factory = Factory::new(&store);

    let video = factory.video().await;
    let loose = factory.image().await;

    delete_orphans::<Image, _>(&store, &registry, None)
        .await
        .unwrap();

    assert!(store.exists::<Image>(video.image.unwrap()).await.unwrap());
    assert!(!store.exists::<Image>(loose.id).await.unwrap());
}

#[tokio::test]
async fn delete_orphans_of_unregistered_model_fails() {
    let store = MemoryRecordStore::new();
    let registry = catalog_registry();

    let err = delete_orphans_by_model(&store, &registry, "Widget", None)
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::UnknownModel { .. }));
}

// ===========================================================================
// Partial update
// ===========================================================================

fn description_update(description: &str) -> Fields {
    json!({ "description": description })
        .as_object()
        .cloned()
        .unwrap()
}

#[tokio::test]
async fn update_instance_commits_when_asked() {
    let store = MemoryRecordStore::new();
    let factory = Factory::new(&store);

    let image = factory.image().await;
    let (_, changed) = update_instance_and_commit(
        &store,
        Some(image.clone()),
        &description_update("new image description"),
        true,
    )
    .await
    .unwrap();
    let refreshed: Image = store.load(image.id).await.unwrap();
    assert!(changed);
    assert_eq!(
        refreshed.description.as_deref(),
        Some("new image description")
    );

    let video = factory.video().await;
    let (_, changed) = update_instance_and_commit(
        &store,
        Some(video.clone()),
        &description_update("new video description"),
        true,
    )
    .await
    .unwrap();
    let refreshed: Video = store.load(video.id).await.unwrap();
    assert!(changed);
    assert_eq!(
        refreshed.description.as_deref(),
        Some("new video description")
    );
}

#[tokio::test]
async fn update_instance_without_commit_leaves_storage_alone() {
    let store = MemoryRecordStore::new();
    let factory = Factory::new(&store);

    let image = factory.image().await;
    let (updated, changed) =
        update_instance(Some(image.clone()), &description_update("new image description"))
            .unwrap();
    assert!(changed);
    assert_eq!(
        updated.unwrap().description.as_deref(),
        Some("new image description")
    );
    let refreshed: Image = store.load(image.id).await.unwrap();
    assert_ne!(
        refreshed.description.as_deref(),
        Some("new image description")
    );

    let video = factory.video().await;
    let (_, changed) = update_instance_and_commit(
        &store,
        Some(video.clone()),
        &description_update("new video description"),
        false,
    )
    .await
    .unwrap();
    let refreshed: Video = store.load(video.id).await.unwrap();
    assert!(changed);
    assert_ne!(
        refreshed.description.as_deref(),
        Some("new video description")
    );
}

#[tokio::test]
async fn update_instance_without_instance() {
    let store = MemoryRecordStore::new();

    let (instance, changed) =
        update_instance_and_commit::<Video, _>(&store, None, &Fields::new(), true)
            .await
            .unwrap();

    assert!(instance.is_none());
    assert!(!changed);
    assert_eq!(store.count(Video::MODEL).unwrap(), 0);
}
