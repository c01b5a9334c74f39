//! Generic CRUD over the entity store. Writes run in one store transaction covering the record,
//! its relation memberships and its uploaded files.

use crate::config::ResolvedEntity;
use crate::error::{AppError, ValidationErrors};
use crate::service::relations::{RelationSynchronizer, RelationWrite};
use crate::service::validation::{RequestValidator, ValidationMode};
use crate::state::AppState;
use crate::storage::{hash_name, validate_upload, UploadedFile};
use crate::store::{StoreTx, TrashScope};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Record a write applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteTarget {
    Create(Uuid),
    Update(Uuid),
}

impl WriteTarget {
    pub fn id(self) -> Uuid {
        match self {
            WriteTarget::Create(id) | WriteTarget::Update(id) => id,
        }
    }
}

/// Upload paired with the name it is stored under.
struct PendingFile {
    file: UploadedFile,
    name: String,
}

pub struct CrudService;

impl CrudService {
    /// Active rows, or only soft-deleted ones, in storage order.
    pub async fn list(state: &AppState, entity: &ResolvedEntity, only_trashed: bool) -> Result<Vec<Value>, AppError> {
        let scope = if only_trashed {
            TrashScope::OnlyTrashed
        } else {
            TrashScope::Active
        };
        state.store.list(entity, scope).await
    }

    pub async fn read(
        state: &AppState,
        entity: &ResolvedEntity,
        id: Uuid,
        with_trashed: bool,
    ) -> Result<Value, AppError> {
        let scope = if with_trashed {
            TrashScope::WithTrashed
        } else {
            TrashScope::Active
        };
        state
            .store
            .find(entity, id, scope)
            .await?
            .ok_or_else(|| not_found(entity, id))
    }

    /// Validate and insert a new record with a freshly assigned id.
    pub async fn create(
        state: &AppState,
        entity: &ResolvedEntity,
        body: &Map<String, Value>,
        files: Vec<UploadedFile>,
    ) -> Result<Value, AppError> {
        let (attrs, relations, files) =
            Self::check_input(state, entity, body, files, ValidationMode::Full).await?;
        let id = state.ids.assign();
        let row = Self::write(state, entity, WriteTarget::Create(id), attrs, &relations, files).await?;
        tracing::info!(entity = %entity.name, %id, "created");
        Ok(row)
    }

    /// Validate (whole rule set or present fields only) and merge onto a live record.
    pub async fn update(
        state: &AppState,
        entity: &ResolvedEntity,
        id: Uuid,
        body: &Map<String, Value>,
        files: Vec<UploadedFile>,
        mode: ValidationMode,
    ) -> Result<Value, AppError> {
        if state.store.find(entity, id, TrashScope::Active).await?.is_none() {
            return Err(not_found(entity, id));
        }
        let (attrs, relations, files) = Self::check_input(state, entity, body, files, mode).await?;
        let row = Self::write(state, entity, WriteTarget::Update(id), attrs, &relations, files).await?;
        tracing::info!(entity = %entity.name, %id, "updated");
        Ok(row)
    }

    /// Soft-delete a live record and remove its stored files.
    pub async fn delete(state: &AppState, entity: &ResolvedEntity, id: Uuid) -> Result<(), AppError> {
        let mut tx = state.store.begin().await?;
        let row = tx.delete(entity, id).await?.ok_or_else(|| not_found(entity, id))?;
        tx.commit().await?;
        for f in &entity.files {
            if let Some(name) = row.get(&f.field).and_then(Value::as_str) {
                if let Err(e) = state.files.delete(id, name).await {
                    tracing::warn!(error = %e, %id, file = %name, "failed to delete stored file");
                }
            }
        }
        tracing::info!(entity = %entity.name, %id, "deleted");
        Ok(())
    }

    pub async fn restore(state: &AppState, entity: &ResolvedEntity, id: Uuid) -> Result<Value, AppError> {
        let mut tx = state.store.begin().await?;
        let row = tx.restore(entity, id).await?.ok_or_else(|| not_found(entity, id))?;
        tx.commit().await?;
        tracing::info!(entity = %entity.name, %id, "restored");
        Ok(row)
    }

    /// Collect every attribute, relation and upload violation before anything is written.
    async fn check_input<'a>(
        state: &AppState,
        entity: &'a ResolvedEntity,
        body: &Map<String, Value>,
        files: Vec<UploadedFile>,
        mode: ValidationMode,
    ) -> Result<(Map<String, Value>, Vec<RelationWrite<'a>>, Vec<UploadedFile>), AppError> {
        let mut errors = ValidationErrors::new();
        let attrs = match RequestValidator::validate(body, &entity.validation, mode) {
            Ok(attrs) => attrs,
            Err(AppError::Validation(e)) => {
                errors.merge(e);
                Map::new()
            }
            Err(e) => return Err(e),
        };

        for f in &entity.files {
            let given = body
                .get(&f.field)
                .map(|v| !v.is_null() && v.as_str().map(|s| !s.trim().is_empty()).unwrap_or(true))
                .unwrap_or(false);
            if given {
                errors.add(&f.field, format!("{} must be a file", f.field));
            }
        }

        let relations =
            RelationSynchronizer::collect(state.store.as_ref(), &state.model, entity, body, mode, &mut errors)
                .await?;

        let mut accepted = Vec::with_capacity(files.len());
        for file in files {
            match entity.file_field(&file.field) {
                Some(field) => {
                    validate_upload(field, &file, &mut errors);
                    accepted.retain(|f: &UploadedFile| f.field != file.field);
                    accepted.push(file);
                }
                None => tracing::debug!(field = %file.field, "ignoring upload for unknown field"),
            }
        }

        errors.into_result()?;
        Ok((attrs, relations, accepted))
    }

    /// Write already-validated input: record, then relations in declaration order, then files,
    /// all in one transaction. On failure nothing is committed and files stored by this call are
    /// removed. Returns the record re-read after commit.
    pub async fn write(
        state: &AppState,
        entity: &ResolvedEntity,
        target: WriteTarget,
        mut attrs: Map<String, Value>,
        relations: &[RelationWrite<'_>],
        files: Vec<UploadedFile>,
    ) -> Result<Value, AppError> {
        let id = target.id();
        let pending: Vec<PendingFile> = files
            .into_iter()
            .map(|file| PendingFile {
                name: hash_name(file.file_name.as_deref()),
                file,
            })
            .collect();
        for p in &pending {
            attrs.insert(p.file.field.clone(), Value::String(p.name.clone()));
        }

        let mut stored = Vec::with_capacity(pending.len());
        let mut tx = state.store.begin().await?;
        let applied = Self::apply(state, &mut *tx, entity, target, &attrs, relations, &pending, &mut stored).await;
        let outcome = match applied {
            Ok(previous) => tx.commit().await.map(|()| previous),
            Err(e) => Err(e),
        };
        let previous = match outcome {
            Ok(previous) => previous,
            Err(e) => {
                for name in &stored {
                    if let Err(del) = state.files.delete(id, name).await {
                        tracing::warn!(error = %del, %id, file = %name, "failed to remove upload after rollback");
                    }
                }
                tracing::warn!(entity = %entity.name, %id, error = %e, "write rolled back");
                return Err(e);
            }
        };

        if let Some(previous) = previous {
            for p in &pending {
                if let Some(old) = previous.get(&p.file.field).and_then(Value::as_str) {
                    if old != p.name {
                        if let Err(e) = state.files.delete(id, old).await {
                            tracing::warn!(error = %e, %id, file = %old, "failed to delete replaced file");
                        }
                    }
                }
            }
        }

        state
            .store
            .find(entity, id, TrashScope::Active)
            .await?
            .ok_or_else(|| not_found(entity, id))
    }

    /// Steps inside the transaction. Returns the row as it was before an update.
    #[allow(clippy::too_many_arguments)]
    async fn apply(
        state: &AppState,
        tx: &mut dyn StoreTx,
        entity: &ResolvedEntity,
        target: WriteTarget,
        attrs: &Map<String, Value>,
        relations: &[RelationWrite<'_>],
        pending: &[PendingFile],
        stored: &mut Vec<String>,
    ) -> Result<Option<Value>, AppError> {
        let previous = match target {
            WriteTarget::Create(id) => {
                tx.insert(entity, id, attrs).await?;
                None
            }
            WriteTarget::Update(id) => {
                let previous = tx
                    .find(entity, id, TrashScope::Active)
                    .await?
                    .ok_or_else(|| not_found(entity, id))?;
                if !attrs.is_empty() {
                    tx.update(entity, id, attrs)
                        .await?
                        .ok_or_else(|| not_found(entity, id))?;
                }
                Some(previous)
            }
        };
        let id = target.id();
        for write in relations {
            RelationSynchronizer::sync(tx, write.relation, id, &write.ids).await?;
        }
        for p in pending {
            state.files.put(id, &p.name, &p.file.bytes).await?;
            stored.push(p.name.clone());
        }
        Ok(previous)
    }
}

fn not_found(entity: &ResolvedEntity, id: Uuid) -> AppError {
    AppError::NotFound(format!("{} {}", entity.name, id))
}
