//! PostgreSQL entity store on a sqlx pool.

use super::{EntityStore, StoreTx, TrashScope};
use crate::config::{ResolvedEntity, ResolvedRelation};
use crate::error::{AppError, ConfigError};
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{ConnectOptions, PgPool, Postgres, Transaction};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn list(&self, entity: &ResolvedEntity, scope: TrashScope) -> Result<Vec<Value>, AppError> {
        let q = sql::select_list(entity, scope);
        tracing::debug!(sql = %q.sql, "query");
        let rows = sqlx::query(&q.sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn find(
        &self,
        entity: &ResolvedEntity,
        id: Uuid,
        scope: TrashScope,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::select_by_id(entity, scope);
        tracing::debug!(sql = %q.sql, %id, "query");
        let row = sqlx::query(&q.sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    async fn active_ids(&self, entity: &ResolvedEntity, ids: &[Uuid]) -> Result<HashSet<Uuid>, AppError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let sql = sql::select_active_ids(entity);
        tracing::debug!(sql = %sql, count = ids.len(), "query");
        let rows: Vec<(Uuid,)> = sqlx::query_as(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Open transaction. sqlx rolls back on drop unless committed.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    async fn execute_returning_one(&mut self, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&mut *self.tx).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    async fn execute_by_id(&mut self, sql: &str, id: Uuid) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %sql, %id, "query (tx)");
        let row = sqlx::query(sql).bind(id).fetch_optional(&mut *self.tx).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn find(
        &mut self,
        entity: &ResolvedEntity,
        id: Uuid,
        scope: TrashScope,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::select_by_id(entity, scope);
        self.execute_by_id(&q.sql, id).await
    }

    async fn insert(
        &mut self,
        entity: &ResolvedEntity,
        id: Uuid,
        attrs: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        let q = sql::insert(entity, Value::String(id.to_string()), attrs);
        self.execute_returning_one(&q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn update(
        &mut self,
        entity: &ResolvedEntity,
        id: Uuid,
        attrs: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::update(entity, Value::String(id.to_string()), attrs);
        self.execute_returning_one(&q).await
    }

    async fn delete(&mut self, entity: &ResolvedEntity, id: Uuid) -> Result<Option<Value>, AppError> {
        let sql = sql::delete(entity);
        self.execute_by_id(&sql, id).await
    }

    async fn restore(&mut self, entity: &ResolvedEntity, id: Uuid) -> Result<Option<Value>, AppError> {
        let Some(sql) = sql::restore(entity) else {
            return Ok(None);
        };
        self.execute_by_id(&sql, id).await
    }

    async fn related_ids(&mut self, relation: &ResolvedRelation, owner: Uuid) -> Result<Vec<Uuid>, AppError> {
        let sql = sql::pivot_select(relation);
        tracing::debug!(sql = %sql, %owner, "query (tx)");
        let rows: Vec<(Uuid,)> = sqlx::query_as(&sql)
            .bind(owner)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn attach(&mut self, relation: &ResolvedRelation, owner: Uuid, ids: &[Uuid]) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }
        let sql = sql::pivot_attach(relation);
        tracing::debug!(sql = %sql, %owner, count = ids.len(), "query (tx)");
        sqlx::query(&sql)
            .bind(owner)
            .bind(ids.to_vec())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn detach(&mut self, relation: &ResolvedRelation, owner: Uuid, ids: &[Uuid]) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }
        let sql = sql::pivot_detach(relation);
        tracing::debug!(sql = %sql, %owner, count = ids.len(), "query (tx)");
        sqlx::query(&sql)
            .bind(owner)
            .bind(ids.to_vec())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let PgTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| ConfigError::Load(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), ConfigError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| ConfigError::Load("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
