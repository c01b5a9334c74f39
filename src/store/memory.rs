//! In-process entity store. A transaction holds the writer lock from `begin` until commit or
//! drop and works on a snapshot that replaces the shared state on commit, so an abandoned
//! transaction leaves no trace. NOT NULL and pivot foreign keys are enforced the way the
//! database schema enforces them.

use super::{EntityStore, StoreTx, TrashScope};
use crate::config::{ResolvedEntity, ResolvedRelation, CREATED_AT, PK_COLUMN, UPDATED_AT};
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as WriterLock, OwnedMutexGuard};
use uuid::Uuid;

type Row = Map<String, Value>;

#[derive(Clone, Debug, Default)]
struct Tables {
    /// Table name -> rows in insertion order.
    rows: HashMap<String, Vec<Row>>,
    /// Pivot table name -> (owner id, related id) links.
    pivots: HashMap<String, Vec<(Uuid, Uuid)>>,
}

fn now() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

fn row_id(entity: &ResolvedEntity, row: &Row) -> Option<Uuid> {
    row.get(&entity.pk_column)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn is_trashed(entity: &ResolvedEntity, row: &Row) -> bool {
    entity
        .soft_delete
        .as_ref()
        .map(|sd| row.get(&sd.column).map(|v| !v.is_null()).unwrap_or(false))
        .unwrap_or(false)
}

fn in_scope(entity: &ResolvedEntity, row: &Row, scope: TrashScope) -> bool {
    match scope {
        TrashScope::Active => !is_trashed(entity, row),
        TrashScope::OnlyTrashed => is_trashed(entity, row),
        TrashScope::WithTrashed => true,
    }
}

fn check_not_null(entity: &ResolvedEntity, row: &Row) -> Result<(), AppError> {
    for c in entity.columns.iter().filter(|c| !c.nullable) {
        if row.get(&c.name).map(Value::is_null).unwrap_or(true) {
            return Err(AppError::Integrity(format!(
                "null value in column \"{}\" of relation \"{}\"",
                c.name, entity.table_name
            )));
        }
    }
    Ok(())
}

impl Tables {
    fn table(&self, name: &str) -> &[Row] {
        self.rows.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn position(&self, entity: &ResolvedEntity, id: Uuid, scope: TrashScope) -> Option<usize> {
        self.table(&entity.table_name)
            .iter()
            .position(|row| row_id(entity, row) == Some(id) && in_scope(entity, row, scope))
    }

    fn find(&self, entity: &ResolvedEntity, id: Uuid, scope: TrashScope) -> Option<Value> {
        self.position(entity, id, scope)
            .map(|i| Value::Object(self.table(&entity.table_name)[i].clone()))
    }

    fn row_mut(&mut self, entity: &ResolvedEntity, index: usize) -> Option<&mut Row> {
        self.rows
            .get_mut(&entity.table_name)
            .and_then(|rows| rows.get_mut(index))
    }

    fn contains_id(&self, table: &str, id: Uuid) -> bool {
        let key = Value::String(id.to_string());
        self.table(table).iter().any(|row| row.get(PK_COLUMN) == Some(&key))
    }

    fn insert(&mut self, entity: &ResolvedEntity, id: Uuid, attrs: &Row) -> Result<Value, AppError> {
        if self.position(entity, id, TrashScope::WithTrashed).is_some() {
            return Err(AppError::Integrity(format!(
                "duplicate key value violates unique constraint \"{}_pkey\"",
                entity.table_name
            )));
        }
        let mut row = Row::new();
        row.insert(entity.pk_column.clone(), Value::String(id.to_string()));
        for c in &entity.columns {
            let value = attrs
                .get(&c.name)
                .cloned()
                .or_else(|| c.default.clone())
                .unwrap_or(Value::Null);
            row.insert(c.name.clone(), value);
        }
        let ts = now();
        row.insert(CREATED_AT.to_string(), ts.clone());
        row.insert(UPDATED_AT.to_string(), ts);
        if let Some(sd) = &entity.soft_delete {
            row.insert(sd.column.clone(), Value::Null);
        }
        check_not_null(entity, &row)?;
        self.rows
            .entry(entity.table_name.clone())
            .or_default()
            .push(row.clone());
        Ok(Value::Object(row))
    }

    fn update(&mut self, entity: &ResolvedEntity, id: Uuid, attrs: &Row) -> Result<Option<Value>, AppError> {
        let Some(index) = self.position(entity, id, TrashScope::Active) else {
            return Ok(None);
        };
        let Some(current) = self.row_mut(entity, index) else {
            return Ok(None);
        };
        let mut row = current.clone();
        for (k, v) in attrs {
            if entity.column(k).is_some() {
                row.insert(k.clone(), v.clone());
            }
        }
        row.insert(UPDATED_AT.to_string(), now());
        check_not_null(entity, &row)?;
        *current = row.clone();
        Ok(Some(Value::Object(row)))
    }

    fn delete(&mut self, entity: &ResolvedEntity, id: Uuid) -> Result<Option<Value>, AppError> {
        let Some(index) = self.position(entity, id, TrashScope::Active) else {
            return Ok(None);
        };
        match entity.soft_delete.clone() {
            Some(sd) => {
                let Some(row) = self.row_mut(entity, index) else {
                    return Ok(None);
                };
                row.insert(sd.column, now());
                Ok(Some(Value::Object(row.clone())))
            }
            None => {
                let referenced = self.pivots.iter().any(|(_, links)| {
                    links.iter().any(|(owner, related)| *owner == id || *related == id)
                });
                if referenced {
                    return Err(AppError::Integrity(format!(
                        "row {} of \"{}\" is still referenced by a pivot table",
                        id, entity.table_name
                    )));
                }
                let rows = self.rows.entry(entity.table_name.clone()).or_default();
                Ok(Some(Value::Object(rows.remove(index))))
            }
        }
    }

    fn restore(&mut self, entity: &ResolvedEntity, id: Uuid) -> Option<Value> {
        let sd = entity.soft_delete.clone()?;
        let index = self.position(entity, id, TrashScope::OnlyTrashed)?;
        let row = self.row_mut(entity, index)?;
        row.insert(sd.column, Value::Null);
        row.insert(UPDATED_AT.to_string(), now());
        Some(Value::Object(row.clone()))
    }

    fn attach(&mut self, relation: &ResolvedRelation, owner: Uuid, ids: &[Uuid]) -> Result<(), AppError> {
        if !self.contains_id(&relation.owner_table, owner) {
            return Err(AppError::Integrity(format!(
                "insert on \"{}\" violates foreign key \"{}\": {} not present in \"{}\"",
                relation.pivot_table, relation.owner_key, owner, relation.owner_table
            )));
        }
        if let Some(missing) = ids
            .iter()
            .find(|id| !self.contains_id(&relation.related_table, **id))
        {
            return Err(AppError::Integrity(format!(
                "insert on \"{}\" violates foreign key \"{}\": {} not present in \"{}\"",
                relation.pivot_table, relation.related_key, missing, relation.related_table
            )));
        }
        let links = self.pivots.entry(relation.pivot_table.clone()).or_default();
        for id in ids {
            if !links.contains(&(owner, *id)) {
                links.push((owner, *id));
            }
        }
        Ok(())
    }

    fn detach(&mut self, relation: &ResolvedRelation, owner: Uuid, ids: &[Uuid]) {
        if let Some(links) = self.pivots.get_mut(&relation.pivot_table) {
            links.retain(|(o, r)| !(*o == owner && ids.contains(r)));
        }
    }

    fn related_ids(&self, relation: &ResolvedRelation, owner: Uuid) -> Vec<Uuid> {
        self.pivots
            .get(&relation.pivot_table)
            .map(|links| {
                links
                    .iter()
                    .filter(|(o, _)| *o == owner)
                    .map(|(_, r)| *r)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<Tables>>,
    /// One open transaction at a time; readers only take `state`.
    writer: Arc<WriterLock<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn list(&self, entity: &ResolvedEntity, scope: TrashScope) -> Result<Vec<Value>, AppError> {
        let tables = self.lock();
        Ok(tables
            .table(&entity.table_name)
            .iter()
            .filter(|row| in_scope(entity, row, scope))
            .map(|row| Value::Object(row.clone()))
            .collect())
    }

    async fn find(
        &self,
        entity: &ResolvedEntity,
        id: Uuid,
        scope: TrashScope,
    ) -> Result<Option<Value>, AppError> {
        Ok(self.lock().find(entity, id, scope))
    }

    async fn active_ids(&self, entity: &ResolvedEntity, ids: &[Uuid]) -> Result<HashSet<Uuid>, AppError> {
        let tables = self.lock();
        Ok(ids
            .iter()
            .copied()
            .filter(|id| tables.position(entity, *id, TrashScope::Active).is_some())
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        let working = self.lock().clone();
        Ok(Box::new(MemoryTx {
            shared: Arc::clone(&self.state),
            working,
            _guard: guard,
        }))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

pub struct MemoryTx {
    shared: Arc<Mutex<Tables>>,
    working: Tables,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find(
        &mut self,
        entity: &ResolvedEntity,
        id: Uuid,
        scope: TrashScope,
    ) -> Result<Option<Value>, AppError> {
        Ok(self.working.find(entity, id, scope))
    }

    async fn insert(
        &mut self,
        entity: &ResolvedEntity,
        id: Uuid,
        attrs: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        self.working.insert(entity, id, attrs)
    }

    async fn update(
        &mut self,
        entity: &ResolvedEntity,
        id: Uuid,
        attrs: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        self.working.update(entity, id, attrs)
    }

    async fn delete(&mut self, entity: &ResolvedEntity, id: Uuid) -> Result<Option<Value>, AppError> {
        self.working.delete(entity, id)
    }

    async fn restore(&mut self, entity: &ResolvedEntity, id: Uuid) -> Result<Option<Value>, AppError> {
        Ok(self.working.restore(entity, id))
    }

    async fn related_ids(&mut self, relation: &ResolvedRelation, owner: Uuid) -> Result<Vec<Uuid>, AppError> {
        Ok(self.working.related_ids(relation, owner))
    }

    async fn attach(&mut self, relation: &ResolvedRelation, owner: Uuid, ids: &[Uuid]) -> Result<(), AppError> {
        self.working.attach(relation, owner, ids)
    }

    async fn detach(&mut self, relation: &ResolvedRelation, owner: Uuid, ids: &[Uuid]) -> Result<(), AppError> {
        self.working.detach(relation, owner, ids);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTx {
            shared,
            working,
            _guard,
        } = *self;
        *shared.lock().unwrap_or_else(PoisonError::into_inner) = working;
        drop(_guard);
        Ok(())
    }
}
