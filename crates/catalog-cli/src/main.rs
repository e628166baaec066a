//! Course catalog management CLI
//!
//! The `catalog` command runs the catalog maintenance jobs against a JSON
//! snapshot of the record store.
//!
//! ## Commands
//!
//! - `related-fields`: List the reverse relations pointing at a model
//! - `delete-orphans`: Delete records nothing references
//! - `update`: Apply field updates to a single record
//! - `index-courses`: Build course search documents and index them
//! - `mapping`: Print the course index creation body
//!
//! Every command runs inside the command monitoring scope; commands that
//! mutate records write the snapshot back to `--data`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use catalog_core::{
    delete_orphans_by_model, execute_search, index_courses, init_tracing,
    monitor_management_command, related_field_names_for, update_instance_and_commit,
    CatalogConfig, CourseDocument, Document, MemorySearchIndex, ModelRef, QuerySet,
    SearchQuerySetWrapper, TracingMonitor,
};
use catalog_store::{
    catalog_registry, AdditionalMetadata, Course, CourseRun, CourseType, ExpectedLearningItem,
    Fields, Image, LanguageTag, MemoryRecordStore, Prerequisite, ProductSource, Record, RecordId,
    RecordStore, RecordStoreExt, RelationRegistry, StoreError, Video,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "catalog")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Course catalog management commands", long_about = None)]
struct Cli {
    /// Catalog snapshot file (`{ "Model": [record, ...] }`)
    #[arg(
        short,
        long,
        global = true,
        env = "CATALOG_DATA",
        default_value = "catalog.json"
    )]
    data: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the reverse relation names pointing at a model
    RelatedFields {
        /// Model name (e.g. Video)
        model: String,
    },

    /// Delete records of a model that no relation references
    DeleteOrphans {
        /// Model name (e.g. Image)
        model: String,

        /// Record id to keep even if orphaned (repeatable)
        #[arg(long = "exclude")]
        exclude: Vec<u64>,
    },

    /// Apply field updates to one record
    Update {
        /// Model name
        model: String,

        /// Record id
        id: u64,

        /// Field assignment `field=value`; the value is parsed as JSON and
        /// falls back to a plain string (repeatable)
        #[arg(long = "set", value_parser = parse_assignment, required = true)]
        set: Vec<(String, Value)>,

        /// Persist the record when something changed
        #[arg(long)]
        commit: bool,
    },

    /// Prepare course documents and write them into a search index
    IndexCourses {
        /// Leave out course runs with this restriction type (repeatable)
        #[arg(long = "exclude-restriction")]
        exclude_restriction: Vec<String>,

        /// Query to run against the fresh index (`field:value`, `*`)
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Print the course index mapping
    Mapping,
}

impl Commands {
    /// Transaction name reported to the monitoring backend.
    fn name(&self) -> &'static str {
        match self {
            Commands::RelatedFields { .. } => "related_fields",
            Commands::DeleteOrphans { .. } => "delete_orphans",
            Commands::Update { .. } => "update",
            Commands::IndexCourses { .. } => "index_courses",
            Commands::Mapping => "mapping",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let config = CatalogConfig::from_env().context("Invalid catalog configuration")?;
    let scope = monitor_management_command(&config, &TracingMonitor, cli.command.name());
    scope.run_async(run(cli, &config)).await
}

async fn run(cli: Cli, config: &CatalogConfig) -> Result<()> {
    let registry = catalog_registry();

    match cli.command {
        Commands::RelatedFields { model } => {
            for name in cmd_related_fields(&registry, &model)? {
                println!("{name}");
            }
            Ok(())
        }
        Commands::DeleteOrphans { model, exclude } => {
            let store = load_store(&cli.data)?;
            let deleted = cmd_delete_orphans(&store, &registry, &model, &exclude).await?;
            save_store(&store, &cli.data)?;
            println!("Deleted {deleted} orphaned {model} record(s)");
            Ok(())
        }
        Commands::Update {
            model,
            id,
            set,
            commit,
        } => {
            let store = load_store(&cli.data)?;
            let updated: Fields = set.into_iter().collect();
            let outcome = cmd_update(&store, &model, RecordId(id), &updated, commit).await?;
            if outcome.committed {
                save_store(&store, &cli.data)?;
            }
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Commands::IndexCourses {
            exclude_restriction,
            query,
        } => {
            let store = load_store(&cli.data)?;
            let keys =
                cmd_index_courses(&store, config, &exclude_restriction, query.as_deref()).await?;
            for key in keys {
                println!("{key}");
            }
            Ok(())
        }
        Commands::Mapping => {
            let mapping = CourseDocument::new(config).mapping();
            println!("{}", serde_json::to_string_pretty(&mapping)?);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot I/O
// ---------------------------------------------------------------------------

fn load_store(path: &Path) -> Result<MemoryRecordStore> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog snapshot {}", path.display()))?;
    let snapshot: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Catalog snapshot {} is not valid JSON", path.display()))?;
    let store = MemoryRecordStore::from_snapshot(&snapshot)
        .with_context(|| format!("Failed to load catalog snapshot {}", path.display()))?;
    info!(path = %path.display(), "loaded catalog snapshot");
    Ok(store)
}

fn save_store(store: &MemoryRecordStore, path: &Path) -> Result<()> {
    let snapshot = store.snapshot()?;
    std::fs::write(path, serde_json::to_string_pretty(&snapshot)?)
        .with_context(|| format!("Failed to write catalog snapshot {}", path.display()))?;
    info!(path = %path.display(), "wrote catalog snapshot");
    Ok(())
}

fn parse_assignment(raw: &str) -> std::result::Result<(String, Value), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((field.to_string(), value))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_related_fields(registry: &RelationRegistry, model: &str) -> Result<Vec<String>> {
    if !registry.is_registered(model) {
        bail!("Unknown model '{model}'");
    }
    Ok(related_field_names_for(registry, model))
}

async fn cmd_delete_orphans(
    store: &MemoryRecordStore,
    registry: &RelationRegistry,
    model: &str,
    exclude: &[u64],
) -> Result<u64> {
    let excluded: BTreeSet<RecordId> = exclude.iter().copied().map(RecordId).collect();
    let excluded = (!excluded.is_empty()).then_some(&excluded);
    delete_orphans_by_model(store, registry, model, excluded)
        .await
        .with_context(|| format!("Failed to delete orphaned {model} records"))
}

/// Result of `catalog update`.
#[derive(Debug, Serialize)]
struct UpdateOutcome {
    model: String,
    id: RecordId,
    changed: bool,
    committed: bool,
    record: Value,
}

macro_rules! dispatch_update {
    ($store:expr, $model:expr, $id:expr, $updated:expr, $commit:expr; $($record:ty),+ $(,)?) => {{
        $(
            if $model == <$record as Record>::MODEL {
                return update_record::<$record>($store, $id, $updated, $commit).await;
            }
        )+
        Err(StoreError::UnknownModel {
            model: $model.to_string(),
        }
        .into())
    }};
}

async fn cmd_update(
    store: &MemoryRecordStore,
    model: &str,
    id: RecordId,
    updated: &Fields,
    commit: bool,
) -> Result<UpdateOutcome> {
    dispatch_update!(
        store, model, id, updated, commit;
        Image,
        Video,
        CourseType,
        ProductSource,
        AdditionalMetadata,
        ExpectedLearningItem,
        Prerequisite,
        LanguageTag,
        Course,
        CourseRun,
    )
}

async fn update_record<R: Record>(
    store: &MemoryRecordStore,
    id: RecordId,
    updated: &Fields,
    commit: bool,
) -> Result<UpdateOutcome> {
    let instance: R = store.load(id).await?;
    let (instance, changed) = update_instance_and_commit(store, Some(instance), updated, commit)
        .await
        .with_context(|| format!("Failed to update {} {id}", R::MODEL))?;
    let record = match instance {
        Some(record) => Value::Object(record.to_fields()?),
        None => Value::Null,
    };
    Ok(UpdateOutcome {
        model: R::MODEL.to_string(),
        id,
        changed,
        committed: commit && changed,
        record,
    })
}

/// Index every course, then return the keys matching `query` (all indexed
/// keys without a query).
async fn cmd_index_courses<S>(
    store: &S,
    config: &CatalogConfig,
    exclude_restriction: &[String],
    query: Option<&str>,
) -> Result<Vec<String>>
where
    S: RecordStore,
{
    let document = CourseDocument::new(config);
    let index = MemorySearchIndex::new(document.index_name());
    let report = index_courses(store, &index, &document, config, exclude_restriction)
        .await
        .context("Failed to index courses")?;
    info!(
        index = %report.index,
        indexed = report.indexed,
        pages = report.pages,
        "course index built"
    );

    let results = execute_search::<Course, _, _>(&index, store, query.unwrap_or("*"))
        .await
        .context("Search failed")?;
    let courses = SearchQuerySetWrapper::new(results, ModelRef::default());
    Ok(courses.iter().map(|course| course.key.clone()).collect())
}
