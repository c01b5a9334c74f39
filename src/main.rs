//! Server: reads settings from the environment, bootstraps the store, serves the catalog API.

use media_catalog::{
    apply_migrations, build_router, builtin, ensure_database_exists, load_from_path, resolve, AppState,
    EntityStore, LocalFileStorage, MemoryStore, PgStore, Settings, StoreBackend, UuidV4Assigner,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("media_catalog=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let catalog = match &settings.catalog_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading catalog definition");
            load_from_path(path).await?
        }
        None => builtin(settings.video_max_kb),
    };
    let model = resolve(&catalog, &settings.schema)?;

    let store: Arc<dyn EntityStore> = match settings.store {
        StoreBackend::Postgres => {
            ensure_database_exists(&settings.database_url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&settings.database_url)
                .await?;
            apply_migrations(&pool, &model).await?;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    tokio::fs::create_dir_all(&settings.upload_dir).await?;
    let state = AppState {
        store,
        model: Arc::new(model),
        files: Arc::new(LocalFileStorage::new(&settings.upload_dir)),
        ids: Arc::new(UuidV4Assigner),
    };

    let app = build_router(state, settings.max_body_bytes);
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
