//! Course search document.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use catalog_store::{
    AdditionalMetadata, Course, CourseRun, CourseType, ExpectedLearningItem, LanguageTag,
    Prerequisite, ProductSource, Record, RecordId, RecordStore, RecordStoreExt, Skill, StoreError,
    COURSE_RUN_COURSE,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::{Document, FieldMapping, RAW_AND_LOWER};
use crate::config::CatalogConfig;
use crate::course_key::CourseKey;
use crate::error::Result;
use crate::query::{QuerySet, RecordQuerySet};

const SKILL_PROPERTIES: &[FieldMapping] = &[
    FieldMapping::text("name"),
    FieldMapping::text("description"),
];

/// Field mapping of the course index.
pub const COURSE_FIELDS: &[FieldMapping] = &[
    FieldMapping::keyword("aggregation_key"),
    FieldMapping::keyword("aggregation_uuid"),
    FieldMapping::keyword("key"),
    FieldMapping::keyword("uuid"),
    FieldMapping::text("title").with_fields(RAW_AND_LOWER),
    FieldMapping::keyword("org"),
    FieldMapping::keyword("seat_types").multi(),
    FieldMapping::text("availability")
        .multi()
        .with_fields(RAW_AND_LOWER),
    FieldMapping::text("card_image_url"),
    FieldMapping::keyword("course_runs").multi(),
    FieldMapping::keyword("expected_learning_items").multi(),
    FieldMapping::date("end").multi(),
    FieldMapping::text("course_ends").with_fields(RAW_AND_LOWER),
    FieldMapping::date("end_date"),
    FieldMapping::date("enrollment_start").multi(),
    FieldMapping::date("enrollment_end").multi(),
    FieldMapping::integer("first_enrollable_paid_seat_price"),
    FieldMapping::keyword("languages").multi(),
    FieldMapping::date("modified"),
    FieldMapping::keyword("prerequisites").multi(),
    FieldMapping::keyword("skill_names").multi(),
    FieldMapping::nested("skills", SKILL_PROPERTIES),
    FieldMapping::keyword("status").multi(),
    FieldMapping::date("start").multi(),
    FieldMapping::keyword("course_type").multi(),
    FieldMapping::boolean("enterprise_subscription_inclusion"),
    FieldMapping::keyword("course_length"),
    FieldMapping::keyword("external_course_marketing_type").multi(),
    FieldMapping::keyword("product_source").multi(),
];

/// A course with every related record the document needs.
#[derive(Debug, Clone, Default)]
pub struct CourseSource {
    pub course: Course,
    pub course_type: CourseType,
    pub product_source: Option<ProductSource>,
    pub additional_metadata: Option<AdditionalMetadata>,
    pub expected_learning_items: Vec<ExpectedLearningItem>,
    pub prerequisites: Vec<Prerequisite>,
    /// Runs of the course, ordered by id
    pub course_runs: Vec<CourseRun>,
    /// Language tags referenced by the runs
    pub languages: BTreeMap<RecordId, LanguageTag>,
}

impl CourseSource {
    /// Runs whose run type is marketable.
    pub fn visible_runs(&self) -> impl Iterator<Item = &CourseRun> {
        self.course_runs.iter().filter(|run| run.marketable)
    }
}

/// Course search document.
#[derive(Debug, Clone)]
pub struct CourseDocument {
    index_name: String,
    retired_course_types: Vec<String>,
    now: Option<DateTime<Utc>>,
}

impl CourseDocument {
    pub fn new(config: &CatalogConfig) -> Self {
        Self {
            index_name: config.course_index_name.clone(),
            retired_course_types: config.retired_course_types.clone(),
            now: None,
        }
    }

    /// Pin the clock used for date-relative fields.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// Ids of every course, in id order. Retired course types are filtered
    /// out when a page is loaded.
    pub async fn course_ids<S>(&self, store: &S) -> Result<Vec<RecordId>>
    where
        S: RecordStore + ?Sized,
    {
        Ok(store.ids(Course::MODEL).await?.into_iter().collect())
    }

    /// Courses to index: retired course types are skipped, and runs whose
    /// restriction type is in `excluded_restriction_types` are left out.
    pub async fn queryset<S>(
        &self,
        store: &S,
        excluded_restriction_types: &[String],
    ) -> Result<Vec<CourseSource>>
    where
        S: RecordStore + ?Sized,
    {
        let ids = self.course_ids(store).await?;
        self.load_page(store, &ids, excluded_restriction_types).await
    }

    /// [`queryset`](Self::queryset) restricted to the courses in `ids`.
    ///
    /// Only the page's courses, their runs and the records those reference
    /// are read. Related records are fetched once per page, not per course.
    pub async fn load_page<S>(
        &self,
        store: &S,
        ids: &[RecordId],
        excluded_restriction_types: &[String],
    ) -> Result<Vec<CourseSource>>
    where
        S: RecordStore + ?Sized,
    {
        let course_types: HashMap<RecordId, CourseType> = store
            .load_all::<CourseType>()
            .await?
            .into_iter()
            .map(|course_type| (course_type.id, course_type))
            .collect();
        let retired: BTreeSet<RecordId> = course_types
            .values()
            .filter(|course_type| self.retired_course_types.contains(&course_type.slug))
            .map(|course_type| course_type.id)
            .collect();

        let loaded = store.load_many::<Course>(ids).await?;
        let courses = RecordQuerySet::from_records(ordered(ids, loaded))
            .exclude(|course| retired.contains(&course.course_type))
            .prefetch_related(&["course_runs", "expected_learning_items", "prerequisites"])
            .select_related(&["course_type", "product_source", "additional_metadata"]);

        let page: BTreeSet<RecordId> = courses.iter().map(|course| course.id).collect();
        let mut runs_by_course = load_runs(store, &page, excluded_restriction_types).await?;

        let product_sources = store
            .load_many::<ProductSource>(&collect_ids(&courses, |c| c.product_source))
            .await?;
        let additional_metadata = store
            .load_many::<AdditionalMetadata>(&collect_ids(&courses, |c| c.additional_metadata))
            .await?;
        let expected_learning_items = store
            .load_many::<ExpectedLearningItem>(&flat_ids(&courses, |c| &c.expected_learning_items))
            .await?;
        let prerequisites = store
            .load_many::<Prerequisite>(&flat_ids(&courses, |c| &c.prerequisites))
            .await?;
        let language_ids: Vec<RecordId> = runs_by_course
            .values()
            .flatten()
            .filter_map(|run| run.language)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let languages = store.load_many::<LanguageTag>(&language_ids).await?;

        let mut sources = Vec::with_capacity(courses.count());
        for course in courses.into_vec() {
            let course_type = course_types
                .get(&course.course_type)
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    model: CourseType::MODEL.to_string(),
                    id: course.course_type.0,
                })?;

            let course_runs = runs_by_course.remove(&course.id).unwrap_or_default();
            let run_languages = course_runs
                .iter()
                .filter_map(|run| run.language)
                .filter_map(|id| languages.get(&id).map(|tag| (id, tag.clone())))
                .collect();

            sources.push(CourseSource {
                product_source: course
                    .product_source
                    .and_then(|id| product_sources.get(&id).cloned()),
                additional_metadata: course
                    .additional_metadata
                    .and_then(|id| additional_metadata.get(&id).cloned()),
                expected_learning_items: take_in_order(
                    &course.expected_learning_items,
                    &expected_learning_items,
                ),
                prerequisites: take_in_order(&course.prerequisites, &prerequisites),
                course,
                course_type,
                course_runs,
                languages: run_languages,
            });
        }
        Ok(sources)
    }

    pub fn prepare_aggregation_key(&self, source: &CourseSource) -> String {
        format!("course:{}", source.course.key)
    }

    pub fn prepare_aggregation_uuid(&self, source: &CourseSource) -> String {
        format!("course:{}", source.course.uuid)
    }

    pub fn prepare_availability(&self, source: &CourseSource) -> Vec<String> {
        let now = self.now();
        source
            .visible_runs()
            .map(|run| run.availability(now).to_string())
            .collect()
    }

    pub fn prepare_course_runs(&self, source: &CourseSource) -> Vec<String> {
        source.visible_runs().map(|run| run.key.clone()).collect()
    }

    pub fn prepare_expected_learning_items(&self, source: &CourseSource) -> Vec<String> {
        source
            .expected_learning_items
            .iter()
            .map(|item| item.value.clone())
            .collect()
    }

    /// Distinct macrolanguage names of the visible runs, sorted.
    pub fn prepare_languages(&self, source: &CourseSource) -> Vec<String> {
        source
            .visible_runs()
            .filter_map(|run| run.language)
            .filter_map(|id| source.languages.get(&id))
            .map(|tag| tag.macrolanguage().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn prepare_start(&self, source: &CourseSource) -> Vec<Option<DateTime<Utc>>> {
        source.visible_runs().map(|run| run.start).collect()
    }

    pub fn prepare_end(&self, source: &CourseSource) -> Vec<Option<DateTime<Utc>>> {
        source.visible_runs().map(|run| run.end).collect()
    }

    pub fn prepare_enrollment_start(&self, source: &CourseSource) -> Vec<Option<DateTime<Utc>>> {
        source.visible_runs().map(|run| run.enrollment_start).collect()
    }

    pub fn prepare_enrollment_end(&self, source: &CourseSource) -> Vec<Option<DateTime<Utc>>> {
        source.visible_runs().map(|run| run.enrollment_end).collect()
    }

    /// `Future` while any visible run is open-ended or still running.
    pub fn prepare_course_ends(&self, source: &CourseSource) -> String {
        let now = self.now();
        let future = source
            .visible_runs()
            .any(|run| run.end.map_or(true, |end| end > now));
        let label = if future { "Future" } else { "Past" };
        label.to_string()
    }

    /// Organization of the first visible run's key.
    pub fn prepare_org(&self, source: &CourseSource) -> Result<Option<String>> {
        match source.visible_runs().next() {
            Some(run) => Ok(Some(CourseKey::parse(&run.key)?.org)),
            None => Ok(None),
        }
    }

    pub fn prepare_seat_types(&self, source: &CourseSource) -> Vec<String> {
        source
            .visible_runs()
            .flat_map(|run| run.seat_types())
            .map(String::from)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Cheapest paid seat among visible runs open for enrollment.
    pub fn prepare_first_enrollable_paid_seat_price(
        &self,
        source: &CourseSource,
    ) -> Option<u32> {
        let now = self.now();
        source
            .visible_runs()
            .filter(|run| run.is_enrollable(now))
            .flat_map(|run| run.seats.iter())
            .filter(|seat| seat.is_paid())
            .map(|seat| seat.price)
            .min()
    }

    pub fn prepare_skill_names(&self, source: &CourseSource) -> Vec<String> {
        source
            .course
            .skills
            .iter()
            .map(|skill| skill.name.clone())
            .collect()
    }

    pub fn prepare_skills(&self, source: &CourseSource) -> Vec<Skill> {
        source.course.skills.clone()
    }

    pub fn prepare_status(&self, source: &CourseSource) -> Vec<String> {
        source
            .visible_runs()
            .map(|run| run.status.to_string())
            .collect()
    }

    pub fn prepare_prerequisites(&self, source: &CourseSource) -> Vec<String> {
        source
            .prerequisites
            .iter()
            .map(|prerequisite| prerequisite.name.clone())
            .collect()
    }

    pub fn prepare_course_type(&self, source: &CourseSource) -> String {
        source.course_type.slug.clone()
    }

    pub fn prepare_external_course_marketing_type(
        &self,
        source: &CourseSource,
    ) -> Option<String> {
        source
            .additional_metadata
            .as_ref()
            .and_then(|metadata| metadata.external_course_marketing_type.clone())
    }

    pub fn prepare_product_source(&self, source: &CourseSource) -> Option<String> {
        source
            .product_source
            .as_ref()
            .map(|product_source| product_source.slug.clone())
    }
}

impl Document for CourseDocument {
    type Source = CourseSource;

    fn index_name(&self) -> &str {
        &self.index_name
    }

    fn fields(&self) -> &'static [FieldMapping] {
        COURSE_FIELDS
    }

    fn prepare(&self, source: &CourseSource) -> Result<Value> {
        let course = &source.course;
        let fields = vec![
            ("aggregation_key", json!(self.prepare_aggregation_key(source))),
            ("aggregation_uuid", json!(self.prepare_aggregation_uuid(source))),
            ("key", json!(course.key)),
            ("uuid", json!(course.uuid)),
            ("title", json!(course.title)),
            ("org", json!(self.prepare_org(source)?)),
            ("seat_types", json!(self.prepare_seat_types(source))),
            ("availability", json!(self.prepare_availability(source))),
            ("card_image_url", json!(course.card_image_url)),
            ("course_runs", json!(self.prepare_course_runs(source))),
            ("expected_learning_items", json!(self.prepare_expected_learning_items(source))),
            ("end", json!(self.prepare_end(source))),
            ("course_ends", json!(self.prepare_course_ends(source))),
            ("end_date", json!(course.end_date)),
            ("enrollment_start", json!(self.prepare_enrollment_start(source))),
            ("enrollment_end", json!(self.prepare_enrollment_end(source))),
            (
                "first_enrollable_paid_seat_price",
                json!(self.prepare_first_enrollable_paid_seat_price(source)),
            ),
            ("languages", json!(self.prepare_languages(source))),
            ("modified", json!(course.modified)),
            ("prerequisites", json!(self.prepare_prerequisites(source))),
            ("skill_names", json!(self.prepare_skill_names(source))),
            ("skills", json!(self.prepare_skills(source))),
            ("status", json!(self.prepare_status(source))),
            ("start", json!(self.prepare_start(source))),
            ("course_type", json!(self.prepare_course_type(source))),
            ("enterprise_subscription_inclusion", json!(course.enterprise_subscription_inclusion)),
            ("course_length", json!(course.course_length)),
            (
                "external_course_marketing_type",
                json!(self.prepare_external_course_marketing_type(source)),
            ),
            ("product_source", json!(self.prepare_product_source(source))),
        ];
        Ok(Value::Object(
            fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        ))
    }
}

// Runs of the page's courses, grouped by course and ordered by id.
async fn load_runs<S>(
    store: &S,
    course_ids: &BTreeSet<RecordId>,
    excluded_restriction_types: &[String],
) -> Result<HashMap<RecordId, Vec<CourseRun>>>
where
    S: RecordStore + ?Sized,
{
    let mut runs_by_course: HashMap<RecordId, Vec<CourseRun>> = HashMap::new();
    if course_ids.is_empty() {
        return Ok(runs_by_course);
    }
    for (_, fields) in store.find_referencing(&COURSE_RUN_COURSE, course_ids).await? {
        let run = CourseRun::from_fields(fields)?;
        let restricted = run
            .restriction_type
            .as_ref()
            .is_some_and(|kind| excluded_restriction_types.contains(kind));
        if !restricted {
            runs_by_course.entry(run.course).or_default().push(run);
        }
    }
    Ok(runs_by_course)
}

fn collect_ids(
    courses: &RecordQuerySet<Course>,
    field: impl Fn(&Course) -> Option<RecordId>,
) -> Vec<RecordId> {
    courses
        .iter()
        .filter_map(field)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn flat_ids(
    courses: &RecordQuerySet<Course>,
    field: impl Fn(&Course) -> &Vec<RecordId>,
) -> Vec<RecordId> {
    courses
        .iter()
        .flat_map(|course| field(course).iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// Keep values in the order `ids` lists them.
fn ordered<R>(ids: &[RecordId], mut loaded: BTreeMap<RecordId, R>) -> Vec<R> {
    ids.iter().filter_map(|id| loaded.remove(id)).collect()
}

// Like `ordered`, but the loaded map is shared by every course of a page.
fn take_in_order<R: Clone>(ids: &[RecordId], loaded: &BTreeMap<RecordId, R>) -> Vec<R> {
    ids.iter().filter_map(|id| loaded.get(id).cloned()).collect()
}
