//! CourseDocument tests: queryset filtering, field derivations, mapping and
//! the indexing job.

mod common;

use catalog_core::{
    execute_search, index_courses, CatalogConfig, CourseDocument, CourseSource, Document,
    MemorySearchIndex, QuerySet, SearchIndex, SearchQuerySetWrapper,
};
use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use catalog_store::{
    AdditionalMetadata, Course, CourseRun, CourseRunStatus, ExpectedLearningItem, Fields,
    LanguageTag, MemoryRecordStore, Prerequisite, ProductSource, RecordId, RecordStore,
    RelationDescriptor, Seat, Skill, StorageResult,
};
use common::{days, now, Factory};
use serde_json::{json, Value};

fn document(config: &CatalogConfig) -> CourseDocument {
    CourseDocument::new(config).with_now(now())
}

/// One course with three runs (one archived, one unmarketable, one current)
/// plus every optional relation populated.
async fn populated_course(factory: &Factory<'_>) -> Course {
    let course_type = factory.course_type("verified-audit").await;
    let mut course = factory.course("edX+DemoX", &course_type).await;

    let english = LanguageTag {
        id: factory.id(),
        code: "en-us".into(),
        name: "English - United States".into(),
    };
    let spanish = LanguageTag {
        id: factory.id(),
        code: "es".into(),
        name: "Spanish".into(),
    };
    factory.save(&english).await;
    factory.save(&spanish).await;

    let product_source = ProductSource {
        id: factory.id(),
        slug: "edx".into(),
        name: "edX".into(),
    };
    factory.save(&product_source).await;
    let metadata = AdditionalMetadata {
        id: factory.id(),
        external_course_marketing_type: Some("sprint".into()),
    };
    factory.save(&metadata).await;

    let items: Vec<ExpectedLearningItem> = ["ownership", "borrowing"]
        .into_iter()
        .map(|value| ExpectedLearningItem {
            id: factory.id(),
            value: value.into(),
        })
        .collect();
    for item in &items {
        factory.save(item).await;
    }
    let prerequisite = Prerequisite {
        id: factory.id(),
        name: "Basic programming".into(),
    };
    factory.save(&prerequisite).await;

    course.product_source = Some(product_source.id);
    course.additional_metadata = Some(metadata.id);
    // Listed in reverse id order on purpose.
    course.expected_learning_items = vec![items[1].id, items[0].id];
    course.prerequisites = vec![prerequisite.id];
    course.course_length = Some("6 weeks".into());
    course.enterprise_subscription_inclusion = true;
    course.skills = vec![Skill {
        name: "Rust".into(),
        description: "Systems programming".into(),
    }];
    factory.save(&course).await;

    let mut archived = factory.course_run(&course, "Archived run").await;
    archived.start = Some(days(-200));
    archived.end = Some(days(-100));
    archived.language = Some(english.id);
    archived.seats.push(Seat {
        seat_type: "professional".into(),
        price: 99,
    });
    factory.save(&archived).await;

    let mut hidden = factory.course_run(&course, "Hidden run").await;
    hidden.marketable = false;
    hidden.language = Some(spanish.id);
    factory.save(&hidden).await;

    let mut current = factory.course_run(&course, "Current run").await;
    current.language = Some(english.id);
    current.status = CourseRunStatus::Unpublished;
    factory.save(&current).await;

    course
}

async fn source_for(store: &MemoryRecordStore, doc: &CourseDocument) -> CourseSource {
    let mut sources = doc.queryset(store, &[]).await.unwrap();
    assert_eq!(sources.len(), 1);
    sources.remove(0)
}

#[tokio::test]
async fn prepare_derives_run_fields_from_visible_runs() {
    let store = MemoryRecordStore::new();
    let factory = Factory::new(&store);
    let course = populated_course(&factory).await;
    let doc = document(&CatalogConfig::default());
    let source = source_for(&store, &doc).await;

    assert_eq!(source.course_runs.len(), 3);
    assert_eq!(source.visible_runs().count(), 2);

    let body = doc.prepare(&source).unwrap();
    assert_eq!(body["aggregation_key"], json!("course:edX+DemoX"));
    assert_eq!(
        body["aggregation_uuid"],
        json!(format!("course:{}", course.uuid))
    );
    assert_eq!(body["availability"], json!(["Archived", "Current"]));
    assert_eq!(body["status"], json!(["published", "unpublished"]));
    assert_eq!(body["course_runs"].as_array().unwrap().len(), 2);
    assert_eq!(body["languages"], json!(["English"]));
    assert_eq!(body["org"], json!("edX"));
    assert_eq!(body["course_ends"], json!("Future"));
    assert_eq!(
        body["seat_types"],
        json!(["audit", "professional", "verified"])
    );
}

#[tokio::test]
async fn prepare_reads_related_records() {
    let store = MemoryRecordStore::new();
    let factory = Factory::new(&store);
    populated_course(&factory).await;
    let doc = document(&CatalogConfig::default());
    let body = doc.prepare(&source_for(&store, &doc).await).unwrap();

    assert_eq!(
        body["expected_learning_items"],
        json!(["borrowing", "ownership"])
    );
    assert_eq!(body["prerequisites"], json!(["Basic programming"]));
    assert_eq!(body["course_type"], json!("verified-audit"));
    assert_eq!(body["product_source"], json!("edx"));
    assert_eq!(body["external_course_marketing_type"], json!("sprint"));
    assert_eq!(body["course_length"], json!("6 weeks"));
    assert_eq!(body["enterprise_subscription_inclusion"], json!(true));
    assert_eq!(body["skill_names"], json!(["Rust"]));
    assert_eq!(
        body["skills"],
        json!([{"name": "Rust", "description": "Systems programming"}])
    );
}

#[tokio::test]
async fn paid_seat_price_only_counts_enrollable_runs() {
    let store = MemoryRecordStore::new();
    let factory = Factory::new(&store);
    populated_course(&factory).await;
    let doc = document(&CatalogConfig::default());
    let source = source_for(&store, &doc).await;

    // The archived run's cheaper professional seat is not enrollable.
    assert_eq!(doc.prepare_first_enrollable_paid_seat_price(&source), Some(149));
}

#[tokio::test]
async fn optional_relations_prepare_as_null() {
    let store = MemoryRecordStore::new();
    let factory = Factory::new(&store);
    let course_type = factory.course_type("audit").await;
    factory.course("MITx+6.002x", &course_type).await;

    let doc = document(&CatalogConfig::default());
    let body = doc.prepare(&source_for(&store, &doc).await).unwrap();

    assert_eq!(body["product_source"], Value::Null);
    assert_eq!(body["external_course_marketing_type"], Value::Null);
    assert_eq!(body["org"], Value::Null);
    assert_eq!(body["first_enrollable_paid_seat_price"], Value::Null);
    assert_eq!(body["course_ends"], json!("Past"));
    assert_eq!(body["availability"], json!([]));
}

#[tokio::test]
async fn course_ends_past_when_every_run_ended() {
    let store = MemoryRecordStore::new();
    let factory = Factory::new(&store);
    let course_type = factory.course_type("audit").await;
    let course = factory.course("MITx+6.002x", &course_type).await;
    let mut run = factory.course_run(&course, "Old").await;
    run.end = Some(days(-1));
    factory.save(&run).await;

    let doc = document(&CatalogConfig::default());
    let source = source_for(&store, &doc).await;
    assert_eq!(doc.prepare_course_ends(&source), "Past");
}

#[tokio::test]
async fn malformed_run_key_fails_prepare() {
    let store = MemoryRecordStore::new();
    let factory = Factory::new(&store);
    let course_type = factory.course_type("audit").await;
    let course = factory.course("MITx+6.002x", &course_type).await;
    let mut run = factory.course_run(&course, "Broken").await;
    run.key = "not a key".into();
    factory.save(&run).await;

    let doc = document(&CatalogConfig::default());
    let source = source_for(&store, &doc).await;
    assert!(doc.prepare(&source).is_err());
}

#[tokio::test]
async fn queryset_skips_retired_types_and_restricted_runs() {
    let store = MemoryRecordStore::new();
    let factory = Factory::new(&store);
    let active = factory.course_type("verified-audit").await;
    let retired = factory.course_type("legacy").await;
    let kept = factory.course("edX+Kept", &active).await;
    factory.course("edX+Retired", &retired).await;

    factory.course_run(&kept, "Open").await;
    let mut restricted = factory.course_run(&kept, "B2B").await;
    restricted.restriction_type = Some("custom-b2b-enterprise".into());
    factory.save(&restricted).await;

    let config = CatalogConfig::default().with_retired_course_types(["legacy"]);
    let doc = document(&config);

    let unrestricted = doc.queryset(&store, &[]).await.unwrap();
    assert_eq!(unrestricted.len(), 1);
    assert_eq!(unrestricted[0].course.id, kept.id);
    assert_eq!(unrestricted[0].course_runs.len(), 2);

    let restricted_out = doc
        .queryset(&store, &["custom-b2b-enterprise".to_string()])
        .await
        .unwrap();
    let titles: Vec<_> = restricted_out[0]
        .course_runs
        .iter()
        .map(|run: &CourseRun| run.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Open"]);
}

#[tokio::test]
async fn missing_course_type_is_not_found() {
    let store = MemoryRecordStore::new();
    let factory = Factory::new(&store);
    factory
        .save(&Course {
            id: RecordId(1),
            key: "edX+Orphan".into(),
            course_type: RecordId(404),
            ..Default::default()
        })
        .await;

    let doc = document(&CatalogConfig::default());
    assert!(doc.queryset(&store, &[]).await.is_err());
}

#[test]
fn mapping_declares_index_settings_and_fields() {
    let config = CatalogConfig::default().with_course_index_name("course_v2");
    let mapping = document(&config).mapping();

    assert_eq!(mapping["index"], json!("course_v2"));
    assert_eq!(mapping["settings"]["number_of_shards"], json!(1));
    assert_eq!(mapping["settings"]["number_of_replicas"], json!(1));

    let properties = &mapping["mappings"]["properties"];
    assert_eq!(properties["availability"]["type"], json!("text"));
    assert_eq!(
        properties["availability"]["fields"]["lower"]["analyzer"],
        json!("case_insensitive_keyword")
    );
    assert_eq!(properties["end"]["type"], json!("date"));
    assert_eq!(
        properties["first_enrollable_paid_seat_price"]["type"],
        json!("integer")
    );
    assert_eq!(
        properties["enterprise_subscription_inclusion"]["type"],
        json!("boolean")
    );
    assert_eq!(
        properties["skills"]["properties"]["description"]["type"],
        json!("text")
    );
}

#[tokio::test]
async fn index_courses_pages_and_feeds_search() {
    let store = MemoryRecordStore::new();
    let factory = Factory::new(&store);
    let course_type = factory.course_type("verified-audit").await;
    for key in ["edX+A", "edX+B", "MITx+C"] {
        let course = factory.course(key, &course_type).await;
        factory.course_run(&course, "Run").await;
    }

    let config = CatalogConfig::default().with_queryset_pagination(2);
    let doc = document(&config);
    let index = MemorySearchIndex::new(doc.index_name());

    let report = index_courses(&store, &index, &doc, &config, &[])
        .await
        .unwrap();
    assert_eq!(report.indexed, 3);
    assert_eq!(report.pages, 2);
    assert_eq!(index.count().await.unwrap(), 3);

    let results = execute_search::<Course, _, _>(&index, &store, "org:edX")
        .await
        .unwrap();
    let wrapper = SearchQuerySetWrapper::new(results, Default::default());
    let keys: Vec<_> = wrapper.iter().map(|course| course.key.as_str()).collect();
    assert_eq!(keys, vec!["edX+A", "edX+B"]);
}

/// Delegates to a memory store and records which models were fully scanned.
struct ScanRecordingStore {
    inner: MemoryRecordStore,
    scans: Mutex<Vec<String>>,
}

impl ScanRecordingStore {
    fn new(inner: MemoryRecordStore) -> Self {
        Self {
            inner,
            scans: Mutex::new(Vec::new()),
        }
    }

    fn scans(&self) -> Vec<String> {
        self.scans.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for ScanRecordingStore {
    async fn save(&self, model: &str, id: RecordId, fields: Fields) -> StorageResult<()> {
        self.inner.save(model, id, fields).await
    }

    async fn get(&self, model: &str, id: RecordId) -> StorageResult<Option<Fields>> {
        self.inner.get(model, id).await
    }

    async fn all(&self, model: &str) -> StorageResult<Vec<(RecordId, Fields)>> {
        self.scans.lock().unwrap().push(model.to_string());
        self.inner.all(model).await
    }

    async fn delete_many(&self, model: &str, ids: &BTreeSet<RecordId>) -> StorageResult<u64> {
        self.inner.delete_many(model, ids).await
    }

    async fn ids(&self, model: &str) -> StorageResult<BTreeSet<RecordId>> {
        self.inner.ids(model).await
    }

    async fn find_referencing(
        &self,
        relation: &RelationDescriptor,
        targets: &BTreeSet<RecordId>,
    ) -> StorageResult<Vec<(RecordId, Fields)>> {
        self.inner.find_referencing(relation, targets).await
    }
}

// ============================================================================
// Paged loading
// ============================================================================

#[tokio::test]
async fn load_page_reads_only_requested_courses() {
    let store = MemoryRecordStore::new();
    let factory = Factory::new(&store);
    let course_type = factory.course_type("verified-audit").await;
    let first = factory.course("edX+A", &course_type).await;
    let second = factory.course("edX+B", &course_type).await;
    let third = factory.course("edX+C", &course_type).await;
    factory.course_run(&first, "A1").await;
    factory.course_run(&second, "B1").await;
    factory.course_run(&second, "B2").await;
    factory.course_run(&third, "C1").await;

    let doc = document(&CatalogConfig::default());
    assert_eq!(
        doc.course_ids(&store).await.unwrap(),
        vec![first.id, second.id, third.id]
    );

    let page = doc
        .load_page(&store, &[third.id, second.id], &[])
        .await
        .unwrap();
    let keys: Vec<_> = page.iter().map(|s| s.course.key.as_str()).collect();
    assert_eq!(keys, vec!["edX+C", "edX+B"]);
    let titles: Vec<_> = page[1]
        .course_runs
        .iter()
        .map(|run| run.title.as_str())
        .collect();
    assert_eq!(titles, vec!["B1", "B2"]);
    assert_eq!(page[0].course_runs.len(), 1);

    assert!(doc.load_page(&store, &[], &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn index_courses_does_not_scan_courses_or_runs() {
    let inner = MemoryRecordStore::new();
    let keys = {
        let factory = Factory::new(&inner);
        let course_type = factory.course_type("verified-audit").await;
        let mut keys = Vec::new();
        for key in ["edX+A", "edX+B", "MITx+C"] {
            let course = factory.course(key, &course_type).await;
            factory.course_run(&course, "Run").await;
            keys.push((course.id, key));
        }
        keys
    };
    let store = ScanRecordingStore::new(inner);

    let config = CatalogConfig::default().with_queryset_pagination(1);
    let doc = document(&config);
    let index = MemorySearchIndex::new(doc.index_name());

    let report = index_courses(&store, &index, &doc, &config, &[])
        .await
        .unwrap();
    assert_eq!(report.pages, 3);
    assert_eq!(report.indexed, 3);

    let scans = store.scans();
    assert!(!scans.iter().any(|model| model == "Course"), "{scans:?}");
    assert!(!scans.iter().any(|model| model == "CourseRun"), "{scans:?}");

    for (id, key) in keys {
        let body = index.document(id).await.unwrap().unwrap();
        assert_eq!(body["key"], json!(key));
        assert_eq!(body["course_runs"].as_array().map(Vec::len), Some(1));
    }
}
