//! CrudService: generic resource operations over the entity store.

mod crud;
pub mod relations;
pub mod validation;
pub use crud::{CrudService, WriteTarget};
pub use relations::{plan_sync, RelationSynchronizer, RelationWrite, SyncPlan};
pub use validation::{RequestValidator, ValidationMode};
