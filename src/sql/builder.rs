//! Builds parameterized SELECT, INSERT, UPDATE and soft-delete statements from a resolved entity.

use crate::config::{ResolvedEntity, ResolvedRelation, CREATED_AT, UPDATED_AT};
use crate::store::TrashScope;
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

pub fn entity_table(entity: &ResolvedEntity) -> String {
    qualified_table(&entity.schema_name, &entity.table_name)
}

pub fn pivot_table(relation: &ResolvedRelation) -> String {
    qualified_table(&relation.schema_name, &relation.pivot_table)
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

fn select_column_list(entity: &ResolvedEntity) -> String {
    entity
        .row_columns()
        .iter()
        .map(|(name, _)| quoted(name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Soft-delete predicate for the scope, or None when the entity is not soft-deletable.
fn scope_predicate(entity: &ResolvedEntity, scope: TrashScope) -> Option<String> {
    let sd = entity.soft_delete.as_ref()?;
    match scope {
        TrashScope::Active => Some(format!("{} IS NULL", quoted(&sd.column))),
        TrashScope::OnlyTrashed => Some(format!("{} IS NOT NULL", quoted(&sd.column))),
        TrashScope::WithTrashed => None,
    }
}

fn and_scope(entity: &ResolvedEntity, scope: TrashScope) -> String {
    scope_predicate(entity, scope)
        .map(|p| format!(" AND {}", p))
        .unwrap_or_default()
}

/// SELECT every row in scope, in storage order (created_at, then id).
/// A non-soft-deletable entity has no trashed rows.
pub fn select_list(entity: &ResolvedEntity, scope: TrashScope) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = match (entity.soft_delete.is_some(), scope) {
        (false, TrashScope::OnlyTrashed) => " WHERE 1 = 0".to_string(),
        _ => scope_predicate(entity, scope)
            .map(|p| format!(" WHERE {}", p))
            .unwrap_or_default(),
    };
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}, {}",
        select_column_list(entity),
        entity_table(entity),
        where_clause,
        quoted(CREATED_AT),
        quoted(&entity.pk_column)
    );
    q
}

/// SELECT by primary key. Caller binds the id as $1.
pub fn select_by_id(entity: &ResolvedEntity, scope: TrashScope) -> QueryBuf {
    let mut q = QueryBuf::new();
    let scope_sql = match (entity.soft_delete.is_some(), scope) {
        (false, TrashScope::OnlyTrashed) => " AND 1 = 0".to_string(),
        _ => and_scope(entity, scope),
    };
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = $1{}",
        select_column_list(entity),
        entity_table(entity),
        quoted(&entity.pk_column),
        scope_sql
    );
    q
}

/// SELECT ids among `$1` (uuid[]) that name live rows.
pub fn select_active_ids(entity: &ResolvedEntity) -> String {
    format!(
        "SELECT {pk} FROM {} WHERE {pk} = ANY($1){}",
        entity_table(entity),
        and_scope(entity, TrashScope::Active),
        pk = quoted(&entity.pk_column)
    )
}

/// INSERT with an assigned id. Columns omitted from `body` that have a default are left to the
/// database; timestamps default to NOW().
pub fn insert(entity: &ResolvedEntity, id: Value, body: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let id_param = q.push_param(id);
    let mut cols = vec![quoted(&entity.pk_column)];
    let mut placeholders = vec![format!("${}::uuid", id_param)];
    for c in &entity.columns {
        let val = body.get(&c.name).cloned();
        if val.is_none() && c.default.is_some() {
            continue;
        }
        let param_num = q.push_param(val.unwrap_or(Value::Null));
        cols.push(quoted(&c.name));
        placeholders.push(format!("${}::{}", param_num, c.cast_type()));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        entity_table(entity),
        cols.join(", "),
        placeholders.join(", "),
        select_column_list(entity)
    );
    q
}

/// UPDATE a live row by id: SET only attribute columns present in body, always touching updated_at.
pub fn update(entity: &ResolvedEntity, id: Value, body: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &entity.columns {
        let Some(v) = body.get(&c.name) else { continue };
        let param_num = q.push_param(v.clone());
        sets.push(format!("{} = ${}::{}", quoted(&c.name), param_num, c.cast_type()));
    }
    sets.push(format!("{} = NOW()", quoted(UPDATED_AT)));
    let id_param = q.push_param(id);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}::uuid{} RETURNING {}",
        entity_table(entity),
        sets.join(", "),
        quoted(&entity.pk_column),
        id_param,
        and_scope(entity, TrashScope::Active),
        select_column_list(entity)
    );
    q
}

/// Delete a live row by id ($1): flag it when soft-deletable, remove it otherwise.
pub fn delete(entity: &ResolvedEntity) -> String {
    let table = entity_table(entity);
    let pk = quoted(&entity.pk_column);
    let returning = select_column_list(entity);
    match &entity.soft_delete {
        Some(sd) => format!(
            "UPDATE {} SET {col} = NOW() WHERE {} = $1 AND {col} IS NULL RETURNING {}",
            table,
            pk,
            returning,
            col = quoted(&sd.column)
        ),
        None => format!("DELETE FROM {} WHERE {} = $1 RETURNING {}", table, pk, returning),
    }
}

/// Clear the soft-delete flag of a trashed row ($1). None when the entity cannot be trashed.
pub fn restore(entity: &ResolvedEntity) -> Option<String> {
    let sd = entity.soft_delete.as_ref()?;
    Some(format!(
        "UPDATE {} SET {col} = NULL, {} = NOW() WHERE {} = $1 AND {col} IS NOT NULL RETURNING {}",
        entity_table(entity),
        quoted(UPDATED_AT),
        quoted(&entity.pk_column),
        select_column_list(entity),
        col = quoted(&sd.column)
    ))
}

/// Related ids linked to owner $1.
pub fn pivot_select(relation: &ResolvedRelation) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = $1",
        quoted(&relation.related_key),
        pivot_table(relation),
        quoted(&relation.owner_key)
    )
}

/// Unlink owner $1 from every related id in $2 (uuid[]).
pub fn pivot_detach(relation: &ResolvedRelation) -> String {
    format!(
        "DELETE FROM {} WHERE {} = $1 AND {} = ANY($2)",
        pivot_table(relation),
        quoted(&relation.owner_key),
        quoted(&relation.related_key)
    )
}

/// Link owner $1 to every related id in $2 (uuid[]); existing links are kept.
pub fn pivot_attach(relation: &ResolvedRelation) -> String {
    format!(
        "INSERT INTO {} ({}, {}) SELECT $1, UNNEST($2::uuid[]) ON CONFLICT DO NOTHING",
        pivot_table(relation),
        quoted(&relation.owner_key),
        quoted(&relation.related_key)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin, resolve, ResolvedModel, DEFAULT_VIDEO_MAX_KB};
    use serde_json::json;

    fn model() -> ResolvedModel {
        resolve(&builtin(DEFAULT_VIDEO_MAX_KB), "catalog").unwrap()
    }

    #[test]
    fn list_filters_by_trash_scope() {
        let model = model();
        let categories = model.entity_by_path("categories").unwrap();
        let active = select_list(categories, TrashScope::Active);
        assert!(active.sql.contains("FROM \"catalog\".\"categories\" WHERE \"deleted_at\" IS NULL"));
        assert!(active.sql.ends_with("ORDER BY \"created_at\", \"id\""));
        let trashed = select_list(categories, TrashScope::OnlyTrashed);
        assert!(trashed.sql.contains("WHERE \"deleted_at\" IS NOT NULL"));
        let all = select_list(categories, TrashScope::WithTrashed);
        assert!(!all.sql.contains("WHERE"));
    }

    #[test]
    fn insert_leaves_defaults_to_database() {
        let model = model();
        let categories = model.entity_by_path("categories").unwrap();
        let mut body = Map::new();
        body.insert("name".into(), json!("Drama"));
        let q = insert(categories, json!("6f1c3c4e-4b8a-4c1e-9d55-1c2b3a4d5e6f"), &body);
        assert!(q.sql.starts_with(
            "INSERT INTO \"catalog\".\"categories\" (\"id\", \"name\", \"description\") VALUES ($1::uuid, $2::text, $3::text)"
        ));
        assert_eq!(q.params.len(), 3);
        assert_eq!(q.params[2], Value::Null);
    }

    #[test]
    fn update_only_touches_live_rows() {
        let model = model();
        let categories = model.entity_by_path("categories").unwrap();
        let mut body = Map::new();
        body.insert("is_active".into(), json!(false));
        let q = update(categories, json!("6f1c3c4e-4b8a-4c1e-9d55-1c2b3a4d5e6f"), &body);
        assert!(q.sql.contains("SET \"is_active\" = $1::boolean, \"updated_at\" = NOW()"));
        assert!(q.sql.contains("WHERE \"id\" = $2::uuid AND \"deleted_at\" IS NULL"));
    }

    #[test]
    fn delete_and_restore_use_soft_delete_column() {
        let model = model();
        let videos = model.entity_by_path("videos").unwrap();
        assert!(delete(videos).starts_with("UPDATE \"catalog\".\"videos\" SET \"deleted_at\" = NOW()"));
        assert!(restore(videos).unwrap().contains("SET \"deleted_at\" = NULL"));

        let mut hard = videos.clone();
        hard.soft_delete = None;
        assert!(delete(&hard).starts_with("DELETE FROM"));
        assert!(restore(&hard).is_none());
        assert!(select_list(&hard, TrashScope::OnlyTrashed).sql.contains("WHERE 1 = 0"));
    }

    #[test]
    fn pivot_statements_target_relation_columns() {
        let model = model();
        let videos = model.entity_by_path("videos").unwrap();
        let categories = &videos.relations[0];
        assert_eq!(
            pivot_select(categories),
            "SELECT \"category_id\" FROM \"catalog\".\"category_video\" WHERE \"video_id\" = $1"
        );
        assert!(pivot_attach(categories).ends_with("ON CONFLICT DO NOTHING"));
        assert!(pivot_detach(categories).contains("\"category_id\" = ANY($2)"));
    }
}
