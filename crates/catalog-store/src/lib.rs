//! Catalog-Store: Record Persistence for the Course Catalog
//!
//! This crate provides the persistence layer for the catalog. It defines the
//! typed record model, the statically declared relation registry and the
//! backend-agnostic store trait.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: record identity, relation metadata, and batched deletes.
//!
//! ## Key Components
//!
//! - `Record`: typed entity with an id and `const` relation descriptors
//! - `RelationRegistry`: answers "which fields point at model X"
//! - `RecordStore` / `RecordStoreExt`: raw and typed persistence
//! - `MemoryRecordStore`: in-memory backend with JSON snapshots
//! - `schema`: the catalog models (Course, CourseRun, Video, ...)

mod error;
pub mod fakes;
pub mod schema;
pub mod storage_traits;

pub use error::StoreError;
pub use fakes::MemoryRecordStore;
pub use schema::{
    catalog_registry, AdditionalMetadata, Availability, Course, CourseRun, CourseRunStatus,
    CourseType, ExpectedLearningItem, Image, LanguageTag, Prerequisite, ProductSource, Seat,
    Skill, Video, COURSE_RUN_COURSE,
};
pub use storage_traits::{
    Fields, Record, RecordId, RecordStore, RecordStoreExt, RelationDescriptor, RelationKind,
    RelationRegistry, StorageResult,
};
