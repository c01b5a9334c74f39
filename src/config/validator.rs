//! Catalog config validation: referential integrity and API consistency.

use crate::config::resolved::{CREATED_AT, PK_COLUMN, UPDATED_AT};
use crate::config::CatalogConfig;
use crate::error::ConfigError;
use std::collections::HashSet;

const RESERVED_COLUMNS: &[&str] = &[PK_COLUMN, CREATED_AT, UPDATED_AT, "deleted_at"];

pub fn validate(config: &CatalogConfig) -> Result<(), ConfigError> {
    if config.entities.is_empty() {
        return Err(ConfigError::Validation("at least one entity required".into()));
    }

    let mut path_segments = HashSet::new();
    let mut tables = HashSet::new();
    for e in &config.entities {
        if !path_segments.insert(e.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(e.path_segment.clone()));
        }
        if !tables.insert(e.table.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate table: {}", e.table)));
        }
    }

    for e in &config.entities {
        let mut columns = HashSet::new();
        for c in &e.columns {
            if RESERVED_COLUMNS.contains(&c.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "{}: column '{}' is managed by the store",
                    e.name, c.name
                )));
            }
            if !columns.insert(c.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "{}: duplicate column '{}'",
                    e.name, c.name
                )));
            }
        }

        for field in e.validation.keys() {
            if !columns.contains(field.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", e.name, field),
                });
            }
        }

        for r in &e.relations {
            if !path_segments.contains(r.related.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "entity",
                    id: r.related.clone(),
                });
            }
            if columns.contains(r.field.as_str()) || tables.contains(r.pivot_table.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "{}: relation '{}' collides with a column or table",
                    e.name, r.field
                )));
            }
            if r.owner_key == r.related_key {
                return Err(ConfigError::Validation(format!(
                    "{}: relation '{}' uses the same pivot column twice",
                    e.name, r.field
                )));
            }
        }

        for f in &e.files {
            if !columns.contains(f.field.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "file column",
                    id: format!("{}.{}", e.name, f.field),
                });
            }
            if e.validation.contains_key(&f.field) {
                return Err(ConfigError::Validation(format!(
                    "{}: file field '{}' cannot also carry a value rule",
                    e.name, f.field
                )));
            }
        }
    }

    Ok(())
}
