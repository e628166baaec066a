//! Search document schemas.
//!
//! A document is a static field mapping plus a `prepare` step that derives
//! the indexable JSON body from catalog records. [`Document::mapping`]
//! renders the index creation body (settings, analysis and mappings).

mod course;

pub use course::{CourseDocument, CourseSource, COURSE_FIELDS};

use serde_json::{json, Map, Value};

use crate::error::Result;

/// Analyzer used by `lower` subfields: whole value, lowercased.
pub const CASE_INSENSITIVE_KEYWORD: &str = "case_insensitive_keyword";

/// Index field datatype
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Keyword,
    Date,
    Integer,
    Boolean,
    Nested,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Keyword => "keyword",
            FieldKind::Date => "date",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Nested => "nested",
        }
    }
}

/// Declarative mapping of one document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Field holds a list of values
    pub multi: bool,
    pub analyzer: Option<&'static str>,
    /// Multi-fields (`raw`, `lower`, ...)
    pub fields: &'static [FieldMapping],
    /// Properties of a nested field
    pub properties: &'static [FieldMapping],
}

impl FieldMapping {
    const fn of(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            multi: false,
            analyzer: None,
            fields: &[],
            properties: &[],
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::of(name, FieldKind::Text)
    }

    pub const fn keyword(name: &'static str) -> Self {
        Self::of(name, FieldKind::Keyword)
    }

    pub const fn date(name: &'static str) -> Self {
        Self::of(name, FieldKind::Date)
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::of(name, FieldKind::Integer)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::of(name, FieldKind::Boolean)
    }

    pub const fn nested(name: &'static str, properties: &'static [FieldMapping]) -> Self {
        let mut mapping = Self::of(name, FieldKind::Nested);
        mapping.properties = properties;
        mapping
    }

    pub const fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    pub const fn analyzer(mut self, analyzer: &'static str) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub const fn with_fields(mut self, fields: &'static [FieldMapping]) -> Self {
        self.fields = fields;
        self
    }

    /// Mapping fragment for this field.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("type".into(), json!(self.kind.as_str()));
        if let Some(analyzer) = self.analyzer {
            body.insert("analyzer".into(), json!(analyzer));
        }
        if !self.fields.is_empty() {
            body.insert("fields".into(), properties_json(self.fields));
        }
        if !self.properties.is_empty() {
            body.insert("properties".into(), properties_json(self.properties));
        }
        Value::Object(body)
    }
}

/// The `raw` + `lower` multi-fields shared by sortable text fields.
pub const RAW_AND_LOWER: &[FieldMapping] = &[
    FieldMapping::keyword("raw"),
    FieldMapping::text("lower").analyzer(CASE_INSENSITIVE_KEYWORD),
];

fn properties_json(fields: &[FieldMapping]) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|field| (field.name.to_string(), field.to_json()))
            .collect(),
    )
}

/// Index-level settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSettings {
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
    /// `blocks.read_only_allow_delete`; `None` clears the block
    pub read_only_allow_delete: Option<bool>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            number_of_shards: 1,
            number_of_replicas: 1,
            read_only_allow_delete: None,
        }
    }
}

impl IndexSettings {
    pub fn to_json(&self) -> Value {
        json!({
            "number_of_shards": self.number_of_shards,
            "number_of_replicas": self.number_of_replicas,
            "blocks": { "read_only_allow_delete": self.read_only_allow_delete },
            "analysis": {
                "analyzer": {
                    CASE_INSENSITIVE_KEYWORD: {
                        "type": "custom",
                        "tokenizer": "keyword",
                        "filter": ["lowercase"],
                    }
                }
            }
        })
    }
}

/// A search document type.
pub trait Document {
    /// Records a document is prepared from.
    type Source;

    fn index_name(&self) -> &str;

    fn fields(&self) -> &'static [FieldMapping];

    fn settings(&self) -> IndexSettings {
        IndexSettings::default()
    }

    /// Derive the indexable body from `source`.
    fn prepare(&self, source: &Self::Source) -> Result<Value>;

    /// Index creation body: settings plus field mappings.
    fn mapping(&self) -> Value {
        json!({
            "index": self.index_name(),
            "settings": self.settings().to_json(),
            "mappings": { "properties": properties_json(self.fields()) },
        })
    }
}
