//! Entity store: soft-delete-aware record access and pivot membership, behind a transaction seam.
//!
//! Every mutation goes through a [`StoreTx`]. Dropping a transaction without calling
//! [`StoreTx::commit`] discards everything it wrote.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgStore};

use crate::config::{ResolvedEntity, ResolvedRelation};
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

/// Which rows a query sees with respect to the soft-delete flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrashScope {
    /// Rows not soft-deleted.
    Active,
    /// Only soft-deleted rows.
    OnlyTrashed,
    /// Every row.
    WithTrashed,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn list(&self, entity: &ResolvedEntity, scope: TrashScope) -> Result<Vec<Value>, AppError>;

    async fn find(
        &self,
        entity: &ResolvedEntity,
        id: Uuid,
        scope: TrashScope,
    ) -> Result<Option<Value>, AppError>;

    /// Subset of `ids` naming rows that exist and are not soft-deleted.
    async fn active_ids(&self, entity: &ResolvedEntity, ids: &[Uuid]) -> Result<HashSet<Uuid>, AppError>;

    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError>;

    /// Cheap liveness probe for readiness checks.
    async fn ping(&self) -> Result<(), AppError>;
}

#[async_trait]
pub trait StoreTx: Send {
    async fn find(
        &mut self,
        entity: &ResolvedEntity,
        id: Uuid,
        scope: TrashScope,
    ) -> Result<Option<Value>, AppError>;

    /// Insert a row with the given id. Omitted columns take their defaults.
    async fn insert(
        &mut self,
        entity: &ResolvedEntity,
        id: Uuid,
        attrs: &Map<String, Value>,
    ) -> Result<Value, AppError>;

    /// Merge `attrs` onto a live row. None when no live row has that id.
    async fn update(
        &mut self,
        entity: &ResolvedEntity,
        id: Uuid,
        attrs: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError>;

    /// Soft-delete a live row (hard delete for entities without the capability).
    async fn delete(&mut self, entity: &ResolvedEntity, id: Uuid) -> Result<Option<Value>, AppError>;

    /// Clear the soft-delete flag of a trashed row.
    async fn restore(&mut self, entity: &ResolvedEntity, id: Uuid) -> Result<Option<Value>, AppError>;

    async fn related_ids(&mut self, relation: &ResolvedRelation, owner: Uuid) -> Result<Vec<Uuid>, AppError>;

    async fn attach(&mut self, relation: &ResolvedRelation, owner: Uuid, ids: &[Uuid]) -> Result<(), AppError>;

    async fn detach(&mut self, relation: &ResolvedRelation, owner: Uuid, ids: &[Uuid]) -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
