//! Raw catalog config types. Deserializable so a JSON file can replace the built-in catalog.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Storage type of an attribute column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Uuid,
    String,
    Text,
    Boolean,
    SmallInt,
    Integer,
    Timestamp,
}

impl ColumnType {
    /// PostgreSQL type name, also used for `$n::type` casts when binding.
    pub fn pg_type(self) -> &'static str {
        match self {
            ColumnType::Uuid => "uuid",
            ColumnType::String => "varchar(255)",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::SmallInt => "smallint",
            ColumnType::Integer => "integer",
            ColumnType::Timestamp => "timestamptz",
        }
    }

    /// Inclusive value range of integer column types.
    pub fn int_range(self) -> Option<(f64, f64)> {
        match self {
            ColumnType::SmallInt => Some((i16::MIN as f64, i16::MAX as f64)),
            ColumnType::Integer => Some((i32::MIN as f64, i32::MAX as f64)),
            _ => None,
        }
    }

    /// Type used in `$n::type` parameter casts. An explicit varchar(n) cast would truncate.
    pub fn cast_type(self) -> &'static str {
        match self {
            ColumnType::String => "text",
            other => other.pg_type(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Literal default applied when a create omits the column.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl ColumnConfig {
    pub fn new(name: &str, type_: ColumnType) -> Self {
        ColumnConfig {
            name: name.to_string(),
            type_,
            nullable: true,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }
}

fn default_true() -> bool {
    true
}

/// Expected JSON shape of a field after normalization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Boolean,
    Integer,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub kind: Option<ValueKind>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

impl ValidationRule {
    pub fn of(kind: ValueKind) -> Self {
        ValidationRule {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = Some(true);
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = Some(true);
        self
    }

    pub fn max_length(mut self, max: u32) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn allowed(mut self, values: Vec<serde_json::Value>) -> Self {
        self.allowed = Some(values);
        self
    }

    pub fn minimum(mut self, min: f64) -> Self {
        self.minimum = Some(min);
        self
    }
}

/// Many-to-many relation written through an id-array field (e.g. `categories_id`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationConfig {
    /// Request field carrying the related ids.
    pub field: String,
    /// Path segment of the related entity.
    pub related: String,
    pub pivot_table: String,
    /// Pivot column referencing the owning record.
    pub owner_key: String,
    /// Pivot column referencing the related record.
    pub related_key: String,
    #[serde(default)]
    pub required: bool,
}

/// Uploadable file attribute. The column of the same name stores the hashed file name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileFieldConfig {
    pub field: String,
    #[serde(default)]
    pub mime_types: Vec<String>,
    pub max_kb: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    pub table: String,
    pub path_segment: String,
    #[serde(default = "default_true")]
    pub soft_delete: bool,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
    #[serde(default)]
    pub files: Vec<FileFieldConfig>,
}

/// Every entity the API serves.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub entities: Vec<EntityConfig>,
}
