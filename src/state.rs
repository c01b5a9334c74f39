//! Shared application state for all routes.

use crate::config::ResolvedModel;
use crate::identity::IdentifierAssigner;
use crate::storage::FileStorage;
use crate::store::EntityStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub model: Arc<ResolvedModel>,
    pub files: Arc<dyn FileStorage>,
    /// Assigns the primary key of every created record.
    pub ids: Arc<dyn IdentifierAssigner>,
}
