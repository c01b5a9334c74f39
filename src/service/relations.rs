//! Many-to-many membership replacement. Id lists are checked against the store before any
//! write; inside the transaction each membership becomes exactly the requested set.

use crate::config::{ResolvedEntity, ResolvedModel, ResolvedRelation};
use crate::error::{AppError, ConfigError, ValidationErrors};
use crate::service::validation::ValidationMode;
use crate::store::{EntityStore, StoreTx};
use serde_json::{Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

/// Requested membership for one relation of the owning entity.
#[derive(Clone, Debug)]
pub struct RelationWrite<'a> {
    pub relation: &'a ResolvedRelation,
    pub ids: Vec<Uuid>,
}

/// Pivot changes needed to go from the current membership to the requested one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub attach: Vec<Uuid>,
    pub detach: Vec<Uuid>,
    pub keep: Vec<Uuid>,
}

pub fn plan_sync(current: &[Uuid], wanted: &[Uuid]) -> SyncPlan {
    let current_set: HashSet<&Uuid> = current.iter().collect();
    let wanted_set: HashSet<&Uuid> = wanted.iter().collect();
    let mut plan = SyncPlan::default();
    for id in current {
        if wanted_set.contains(id) {
            plan.keep.push(*id);
        } else {
            plan.detach.push(*id);
        }
    }
    let mut seen = HashSet::new();
    for id in wanted {
        if !current_set.contains(id) && seen.insert(*id) {
            plan.attach.push(*id);
        }
    }
    plan
}

pub struct RelationSynchronizer;

impl RelationSynchronizer {
    /// Parse and check every relation field of `body`, recording violations in `errors`.
    /// Relations whose field is absent are left out and keep their membership.
    pub async fn collect<'a>(
        store: &dyn EntityStore,
        model: &ResolvedModel,
        entity: &'a ResolvedEntity,
        body: &Map<String, Value>,
        mode: ValidationMode,
        errors: &mut ValidationErrors,
    ) -> Result<Vec<RelationWrite<'a>>, AppError> {
        let mut writes = Vec::with_capacity(entity.relations.len());
        for relation in &entity.relations {
            let field = relation.field.as_str();
            let ids = match body.get(field) {
                None => {
                    if mode == ValidationMode::Full && relation.required {
                        errors.add(field, format!("{} is required", field));
                    }
                    continue;
                }
                Some(v) => match parse_ids(field, v, errors) {
                    Some(ids) => ids,
                    None => continue,
                },
            };
            if ids.is_empty() && relation.required {
                errors.add(field, format!("{} is required", field));
                continue;
            }

            let related = model.entity_by_path(&relation.related_path).ok_or_else(|| {
                AppError::Config(ConfigError::MissingReference {
                    kind: "entity",
                    id: relation.related_path.clone(),
                })
            })?;
            let active = store.active_ids(related, &ids).await?;
            let mut ok = true;
            for id in ids.iter().filter(|id| !active.contains(id)) {
                errors.add(field, format!("{} references an unknown or deleted record: {}", field, id));
                ok = false;
            }
            if ok {
                writes.push(RelationWrite { relation, ids });
            }
        }
        Ok(writes)
    }

    /// Replace the membership of `owner` in `relation` with `wanted`.
    pub async fn sync(
        tx: &mut dyn StoreTx,
        relation: &ResolvedRelation,
        owner: Uuid,
        wanted: &[Uuid],
    ) -> Result<SyncPlan, AppError> {
        let current = tx.related_ids(relation, owner).await?;
        let plan = plan_sync(&current, wanted);
        tx.detach(relation, owner, &plan.detach).await?;
        tx.attach(relation, owner, &plan.attach).await?;
        tracing::debug!(
            relation = %relation.field,
            %owner,
            attached = plan.attach.len(),
            detached = plan.detach.len(),
            kept = plan.keep.len(),
            "synced relation"
        );
        Ok(plan)
    }
}

/// Null and empty string mean "no members". Duplicates are collapsed.
fn parse_ids(field: &str, v: &Value, errors: &mut ValidationErrors) -> Option<Vec<Uuid>> {
    let items = match v {
        Value::Null => return Some(Vec::new()),
        Value::String(s) if s.trim().is_empty() => return Some(Vec::new()),
        Value::Array(items) => items,
        _ => {
            errors.add(field, format!("{} must be an array", field));
            return None;
        }
    };
    let mut ids = Vec::with_capacity(items.len());
    let mut ok = true;
    for item in items {
        match item.as_str().map(str::trim).and_then(|s| Uuid::parse_str(s).ok()) {
            Some(id) => {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            None => {
                errors.add(field, format!("{} contains an invalid id: {}", field, item));
                ok = false;
            }
        }
    }
    ok.then_some(ids)
}
