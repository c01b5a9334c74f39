//! Bootstrap the database for a resolved model: schema, entity tables, pivot tables with
//! foreign keys. Every statement is IF NOT EXISTS, so this runs on every startup.

use crate::config::{ResolvedEntity, ResolvedModel, ResolvedRelation, CREATED_AT, UPDATED_AT};
use crate::error::AppError;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashSet;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote(schema), quote(table))
}

/// Render a JSON default as a SQL literal. Objects and arrays are not valid column defaults.
fn literal(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("NULL".into()),
        Value::Bool(b) => Some(if *b { "TRUE".into() } else { "FALSE".into() }),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        Value::Array(_) | Value::Object(_) => None,
    }
}

pub fn create_schema_sql(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote(schema))
}

pub fn create_entity_table_sql(entity: &ResolvedEntity) -> String {
    let mut col_defs = vec![format!("{} UUID PRIMARY KEY", quote(&entity.pk_column))];
    for c in &entity.columns {
        let mut def = format!("{} {}", quote(&c.name), c.pg_type().to_uppercase());
        if !c.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(d) = c.default.as_ref().and_then(literal) {
            def.push_str(" DEFAULT ");
            def.push_str(&d);
        }
        col_defs.push(def);
    }
    for (name, def_suffix) in [
        (CREATED_AT, "TIMESTAMPTZ NOT NULL DEFAULT NOW()"),
        (UPDATED_AT, "TIMESTAMPTZ NOT NULL DEFAULT NOW()"),
    ] {
        col_defs.push(format!("{} {}", quote(name), def_suffix));
    }
    if let Some(sd) = &entity.soft_delete {
        col_defs.push(format!("{} TIMESTAMPTZ", quote(&sd.column)));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified(&entity.schema_name, &entity.table_name),
        col_defs.join(",\n  ")
    )
}

pub fn create_pivot_table_sql(relation: &ResolvedRelation) -> String {
    let owner = quote(&relation.owner_key);
    let related = quote(&relation.related_key);
    let col_defs = [
        format!(
            "{} UUID NOT NULL REFERENCES {} (\"id\")",
            owner,
            qualified(&relation.schema_name, &relation.owner_table)
        ),
        format!(
            "{} UUID NOT NULL REFERENCES {} (\"id\")",
            related,
            qualified(&relation.schema_name, &relation.related_table)
        ),
        format!("PRIMARY KEY ({}, {})", owner, related),
    ];
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified(&relation.schema_name, &relation.pivot_table),
        col_defs.join(",\n  ")
    )
}

/// Every DDL statement for the model, in dependency order.
pub fn migration_statements(model: &ResolvedModel) -> Vec<String> {
    let mut out = Vec::new();
    let mut schemas = HashSet::new();
    for e in &model.entities {
        if schemas.insert(e.schema_name.as_str()) {
            out.push(create_schema_sql(&e.schema_name));
        }
    }
    for e in &model.entities {
        out.push(create_entity_table_sql(e));
    }
    let mut pivots = HashSet::new();
    for r in model.entities.iter().flat_map(|e| e.relations.iter()) {
        if pivots.insert((r.schema_name.as_str(), r.pivot_table.as_str())) {
            out.push(create_pivot_table_sql(r));
        }
    }
    out
}

pub async fn apply_migrations(pool: &PgPool, model: &ResolvedModel) -> Result<(), AppError> {
    for sql in migration_statements(model) {
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(&sql).execute(pool).await?;
    }
    tracing::info!(entities = model.entities.len(), "schema ready");
    Ok(())
}
