//! Resource routes. Parameterized paths; handlers resolve the entity by its path segment.

use crate::handlers::entity::{create, delete as delete_handler, list, patch, read, restore, update};
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(list).post(create))
        .route(
            "/:path_segment/:id",
            get(read).put(update).patch(patch).delete(delete_handler),
        )
        .route("/:path_segment/:id/restore", post(restore))
        .with_state(state)
}
