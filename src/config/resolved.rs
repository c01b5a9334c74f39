//! Resolved entity model: config validated and flattened for runtime use.

use crate::config::{ColumnType, ValidationRule};
use std::collections::HashMap;

pub const PK_COLUMN: &str = "id";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub default: Option<serde_json::Value>,
}

impl ColumnInfo {
    pub fn pg_type(&self) -> &'static str {
        self.column_type.pg_type()
    }

    pub fn cast_type(&self) -> &'static str {
        self.column_type.cast_type()
    }
}

/// Soft-delete capability: rows are flagged through `column` instead of removed.
#[derive(Clone, Debug)]
pub struct SoftDelete {
    pub column: String,
}

impl Default for SoftDelete {
    fn default() -> Self {
        SoftDelete {
            column: "deleted_at".into(),
        }
    }
}

/// Many-to-many relation between the owning entity and `related_path`, stored in a pivot table.
#[derive(Clone, Debug)]
pub struct ResolvedRelation {
    pub field: String,
    pub schema_name: String,
    pub pivot_table: String,
    pub owner_table: String,
    pub owner_key: String,
    pub related_path: String,
    pub related_table: String,
    pub related_key: String,
    pub required: bool,
}

#[derive(Clone, Debug)]
pub struct FileField {
    pub field: String,
    pub mime_types: Vec<String>,
    pub max_bytes: u64,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub name: String,
    pub schema_name: String,
    pub table_name: String,
    pub path_segment: String,
    pub pk_column: String,
    /// Attribute columns, excluding the primary key and bookkeeping timestamps.
    pub columns: Vec<ColumnInfo>,
    pub soft_delete: Option<SoftDelete>,
    pub validation: HashMap<String, ValidationRule>,
    pub relations: Vec<ResolvedRelation>,
    pub files: Vec<FileField>,
}

impl ResolvedEntity {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn file_field(&self, field: &str) -> Option<&FileField> {
        self.files.iter().find(|f| f.field == field)
    }

    /// Every column of a materialized row with its PostgreSQL type, in output order.
    pub fn row_columns(&self) -> Vec<(&str, &'static str)> {
        let mut out = Vec::with_capacity(self.columns.len() + 4);
        out.push((self.pk_column.as_str(), ColumnType::Uuid.pg_type()));
        for c in &self.columns {
            out.push((c.name.as_str(), c.pg_type()));
        }
        out.push((CREATED_AT, ColumnType::Timestamp.pg_type()));
        out.push((UPDATED_AT, ColumnType::Timestamp.pg_type()));
        if let Some(sd) = &self.soft_delete {
            out.push((sd.column.as_str(), ColumnType::Timestamp.pg_type()));
        }
        out
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub by_path: HashMap<String, usize>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.by_path.get(path).and_then(|i| self.entities.get(*i))
    }
}
