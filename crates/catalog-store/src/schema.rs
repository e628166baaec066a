//! Schema definitions for the course catalog
//!
//! Models:
//! - Image, Video: media shared by courses and runs
//! - CourseType, ProductSource, AdditionalMetadata: course taxonomy
//! - ExpectedLearningItem, Prerequisite: many-to-many course details
//! - LanguageTag: content language of a run
//! - Course, CourseRun: the catalog proper

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage_traits::{Record, RecordId, RelationDescriptor, RelationRegistry};

/// Runs starting within this many days are "Starting Soon".
pub const UPCOMING_WINDOW_DAYS: i64 = 60;

/// Seat types that can be enrolled in without paying.
pub const FREE_SEAT_TYPES: &[&str] = &["audit", "honor"];

/// `CourseRun.course -> Course`, reached from a course as `course_runs`.
pub const COURSE_RUN_COURSE: RelationDescriptor =
    RelationDescriptor::foreign_key("CourseRun", "course", "Course")
        .with_related_name("course_runs");

macro_rules! record {
    ($ty:ty, $model:literal) => {
        impl Record for $ty {
            const MODEL: &'static str = $model;

            fn id(&self) -> RecordId {
                self.id
            }
        }
    };
    ($ty:ty, $model:literal, [$($rel:expr),+ $(,)?]) => {
        impl Record for $ty {
            const MODEL: &'static str = $model;
            const RELATIONS: &'static [RelationDescriptor] = &[$($rel),+];

            fn id(&self) -> RecordId {
                self.id
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: RecordId,
    pub src: String,
    pub description: Option<String>,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

record!(Image, "Image");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: RecordId,
    pub src: String,
    pub description: Option<String>,
    /// Poster frame
    pub image: Option<RecordId>,
}

record!(
    Video,
    "Video",
    [RelationDescriptor::foreign_key("Video", "image", "Image")]
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseType {
    pub id: RecordId,
    pub slug: String,
    pub name: String,
}

record!(CourseType, "CourseType");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductSource {
    pub id: RecordId,
    pub slug: String,
    pub name: String,
}

record!(ProductSource, "ProductSource");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalMetadata {
    pub id: RecordId,
    pub external_course_marketing_type: Option<String>,
}

record!(AdditionalMetadata, "AdditionalMetadata");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedLearningItem {
    pub id: RecordId,
    pub value: String,
}

record!(ExpectedLearningItem, "ExpectedLearningItem");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub id: RecordId,
    pub name: String,
}

record!(Prerequisite, "Prerequisite");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageTag {
    pub id: RecordId,
    /// BCP 47 code, e.g. `en-us`
    pub code: String,
    /// Display name, e.g. `English - United States`
    pub name: String,
}

impl LanguageTag {
    /// Macrolanguage part of the display name (`English - United States` -> `English`).
    pub fn macrolanguage(&self) -> &str {
        self.name
            .split(" - ")
            .next()
            .map(str::trim)
            .unwrap_or(&self.name)
    }
}

record!(LanguageTag, "LanguageTag");

/// A skill tagged on a course by the taxonomy service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Course {
    pub id: RecordId,
    pub uuid: Uuid,
    /// Course key, e.g. `edX+DemoX`
    pub key: String,
    pub title: String,
    pub course_type: RecordId,
    pub product_source: Option<RecordId>,
    pub additional_metadata: Option<RecordId>,
    pub card_image: Option<RecordId>,
    pub card_image_url: Option<String>,
    pub video: Option<RecordId>,
    pub expected_learning_items: Vec<RecordId>,
    pub prerequisites: Vec<RecordId>,
    pub modified: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub course_length: Option<String>,
    pub enterprise_subscription_inclusion: bool,
    pub skills: Vec<Skill>,
}

record!(
    Course,
    "Course",
    [
        RelationDescriptor::foreign_key("Course", "course_type", "CourseType"),
        RelationDescriptor::foreign_key("Course", "product_source", "ProductSource"),
        RelationDescriptor::foreign_key("Course", "additional_metadata", "AdditionalMetadata"),
        RelationDescriptor::foreign_key("Course", "card_image", "Image"),
        RelationDescriptor::foreign_key("Course", "video", "Video"),
        RelationDescriptor::many_to_many(
            "Course",
            "expected_learning_items",
            "ExpectedLearningItem"
        ),
        RelationDescriptor::many_to_many("Course", "prerequisites", "Prerequisite"),
    ]
);

/// Publication workflow state of a course run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseRunStatus {
    #[default]
    Unpublished,
    #[serde(rename = "review_by_legal")]
    LegalReview,
    #[serde(rename = "review_by_internal")]
    InternalReview,
    Reviewed,
    Published,
}

impl CourseRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseRunStatus::Unpublished => "unpublished",
            CourseRunStatus::LegalReview => "review_by_legal",
            CourseRunStatus::InternalReview => "review_by_internal",
            CourseRunStatus::Reviewed => "reviewed",
            CourseRunStatus::Published => "published",
        }
    }
}

impl std::fmt::Display for CourseRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a run sits relative to "now"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    Archived,
    Current,
    StartingSoon,
    Upcoming,
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Availability::Archived => "Archived",
            Availability::Current => "Current",
            Availability::StartingSoon => "Starting Soon",
            Availability::Upcoming => "Upcoming",
        })
    }
}

/// A purchasable enrollment track on a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    /// Seat type slug, e.g. `verified`
    pub seat_type: String,
    /// Whole currency units
    pub price: u32,
}

impl Seat {
    pub fn is_paid(&self) -> bool {
        self.price > 0 && !FREE_SEAT_TYPES.contains(&self.seat_type.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseRun {
    pub id: RecordId,
    pub uuid: Uuid,
    /// Run key, e.g. `course-v1:edX+DemoX+1T2024`
    pub key: String,
    pub title: String,
    pub course: RecordId,
    pub status: CourseRunStatus,
    /// Whether the run's type is marketed; non-marketable runs are never indexed
    pub marketable: bool,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub enrollment_start: Option<DateTime<Utc>>,
    pub enrollment_end: Option<DateTime<Utc>>,
    pub language: Option<RecordId>,
    pub video: Option<RecordId>,
    pub seats: Vec<Seat>,
    /// Restriction applied to the run (e.g. `custom-b2b-enterprise`)
    pub restriction_type: Option<String>,
}

impl CourseRun {
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end.is_some_and(|end| end < now)
    }

    pub fn availability(&self, now: DateTime<Utc>) -> Availability {
        let upcoming_cutoff = now + Duration::days(UPCOMING_WINDOW_DAYS);
        match self.start {
            _ if self.has_ended(now) => Availability::Archived,
            Some(start) if start <= now => Availability::Current,
            Some(start) if start < upcoming_cutoff => Availability::StartingSoon,
            _ => Availability::Upcoming,
        }
    }

    /// Enrollment window is open and the run has not ended.
    pub fn is_enrollable(&self, now: DateTime<Utc>) -> bool {
        let opened = self.enrollment_start.map_or(true, |start| start <= now);
        let not_closed = self.enrollment_end.map_or(true, |end| now < end);
        opened && not_closed && !self.has_ended(now)
    }

    /// Seat type slugs offered on this run, in seat order.
    pub fn seat_types(&self) -> impl Iterator<Item = &str> {
        self.seats.iter().map(|seat| seat.seat_type.as_str())
    }
}

record!(
    CourseRun,
    "CourseRun",
    [
        COURSE_RUN_COURSE,
        RelationDescriptor::foreign_key("CourseRun", "video", "Video"),
        RelationDescriptor::foreign_key("CourseRun", "language", "LanguageTag"),
    ]
);

/// Registry with every catalog model registered.
pub fn catalog_registry() -> RelationRegistry {
    RelationRegistry::new()
        .with::<Image>()
        .with::<Video>()
        .with::<CourseType>()
        .with::<ProductSource>()
        .with::<AdditionalMetadata>()
        .with::<ExpectedLearningItem>()
        .with::<Prerequisite>()
        .with::<LanguageTag>()
        .with::<Course>()
        .with::<CourseRun>()
}
