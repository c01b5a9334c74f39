//! Media catalog back office: REST resources for categories, genres, cast members and videos
//! over a soft-delete-aware entity store.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod identity;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod storage;
pub mod store;

pub use config::{builtin, load_from_path, resolve, CatalogConfig, ResolvedEntity, ResolvedModel, Settings, StoreBackend};
pub use error::{AppError, ConfigError, ValidationErrors};
pub use identity::{IdentifierAssigner, UuidV4Assigner};
pub use migration::apply_migrations;
pub use response::{created, record, records};
pub use routes::{common_routes, entity_routes};
pub use service::CrudService;
pub use state::AppState;
pub use storage::{FileStorage, LocalFileStorage};
pub use store::{ensure_database_exists, EntityStore, MemoryStore, PgStore, StoreTx, TrashScope};

use axum::{extract::DefaultBodyLimit, Router};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Full application: operational routes at the root, resources under `/api`.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .nest("/api", entity_routes(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
}
