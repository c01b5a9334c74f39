//! Load catalog config from a JSON file and resolve it into the runtime model.

use crate::config::resolved::{
    ColumnInfo, FileField, ResolvedEntity, ResolvedModel, ResolvedRelation, SoftDelete, PK_COLUMN,
};
use crate::config::{validate, CatalogConfig, EntityConfig, ValidationRule};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Build resolved model from catalog config. Validates first.
pub fn resolve(config: &CatalogConfig, schema_name: &str) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let table_by_path: HashMap<&str, &str> = config
        .entities
        .iter()
        .map(|e| (e.path_segment.as_str(), e.table.as_str()))
        .collect();

    let mut entities = Vec::with_capacity(config.entities.len());
    let mut by_path = HashMap::new();

    for e in &config.entities {
        let columns = e
            .columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                column_type: c.type_,
                nullable: c.nullable,
                default: c.default.clone(),
            })
            .collect();

        let mut relations = Vec::with_capacity(e.relations.len());
        for r in &e.relations {
            let related_table = table_by_path
                .get(r.related.as_str())
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "entity",
                    id: r.related.clone(),
                })?;
            relations.push(ResolvedRelation {
                field: r.field.clone(),
                schema_name: schema_name.to_string(),
                pivot_table: r.pivot_table.clone(),
                owner_table: e.table.clone(),
                owner_key: r.owner_key.clone(),
                related_path: r.related.clone(),
                related_table: (*related_table).to_string(),
                related_key: r.related_key.clone(),
                required: r.required,
            });
        }

        let files = e
            .files
            .iter()
            .map(|f| FileField {
                field: f.field.clone(),
                mime_types: f.mime_types.clone(),
                max_bytes: f.max_kb.saturating_mul(1024),
            })
            .collect();

        by_path.insert(e.path_segment.clone(), entities.len());
        entities.push(ResolvedEntity {
            name: e.name.clone(),
            schema_name: schema_name.to_string(),
            table_name: e.table.clone(),
            path_segment: e.path_segment.clone(),
            pk_column: PK_COLUMN.to_string(),
            columns,
            soft_delete: e.soft_delete.then(SoftDelete::default),
            validation: column_bounded_rules(e),
            relations,
            files,
        });
    }

    Ok(ResolvedModel { entities, by_path })
}

/// Rules with minimum/maximum narrowed to what the column type can hold, so out-of-range
/// numbers fail validation instead of the insert.
fn column_bounded_rules(e: &EntityConfig) -> HashMap<String, ValidationRule> {
    let mut rules = e.validation.clone();
    for (field, rule) in rules.iter_mut() {
        let range = e
            .columns
            .iter()
            .find(|c| &c.name == field)
            .and_then(|c| c.type_.int_range());
        if let Some((lo, hi)) = range {
            rule.minimum = Some(rule.minimum.map_or(lo, |m| m.max(lo)));
            rule.maximum = Some(rule.maximum.map_or(hi, |m| m.min(hi)));
        }
    }
    rules
}

/// Read a catalog definition from a JSON file (`{"entities": [...]}`).
pub async fn load_from_path(path: &Path) -> Result<CatalogConfig, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}
