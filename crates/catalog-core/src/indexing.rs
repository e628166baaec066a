//! Course indexing job.

use catalog_store::RecordStore;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::CatalogConfig;
use crate::documents::{CourseDocument, Document};
use crate::error::Result;
use crate::search::SearchIndex;

/// Outcome of an indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub index: String,
    pub indexed: usize,
    pub pages: usize,
}

/// Prepare every indexable course and write it into `index`.
///
/// Course ids are split into pages of `config.queryset_pagination`; each
/// page is loaded, prepared and written before the next one is read.
/// `pages` counts loaded pages, including pages whose courses were all
/// retired.
#[instrument(skip_all, fields(index = %index.name()))]
pub async fn index_courses<S, I>(
    store: &S,
    index: &I,
    document: &CourseDocument,
    config: &CatalogConfig,
    excluded_restriction_types: &[String],
) -> Result<IndexReport>
where
    S: RecordStore + ?Sized,
    I: SearchIndex + ?Sized,
{
    let course_ids = document.course_ids(store).await?;

    let mut report = IndexReport {
        index: index.name().to_string(),
        ..Default::default()
    };

    for page in course_ids.chunks(config.queryset_pagination.max(1)) {
        let sources = document
            .load_page(store, page, excluded_restriction_types)
            .await?;
        for source in &sources {
            let body = document.prepare(source)?;
            index.index_document(source.course.id, body).await?;
        }
        report.pages += 1;
        report.indexed += sources.len();
        debug!(page = report.pages, size = sources.len(), "indexed page");
    }

    info!(
        event = "index.course",
        index = %report.index,
        indexed = report.indexed,
        pages = report.pages,
    );
    Ok(report)
}
