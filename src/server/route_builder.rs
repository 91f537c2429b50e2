use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::AppState;
use crate::database::{self, DbPool};
use crate::server::config::AppConfig;
use crate::services::dispatcher::MessageDispatcher;
use crate::services::identity::{IdentityProvider, JwtIdentityProvider};
use crate::services::message_store::SqliteMessageStore;
use crate::utils::jwt::JwtService;
use crate::websocket::connection::Gateway;
use crate::websocket::registry::ConnectionRegistry;

/// Wires store, registry, dispatcher and gateway around an existing pool.
pub fn build_state(db: DbPool, identity: Arc<dyn IdentityProvider>) -> Arc<AppState> {
    let registry = Arc::new(ConnectionRegistry::new());
    let store = Arc::new(SqliteMessageStore::new(db.clone()));
    let dispatcher = Arc::new(MessageDispatcher::new(store, registry));
    let gateway = Arc::new(Gateway::new(dispatcher.clone()));

    Arc::new(AppState {
        db,
        identity,
        dispatcher,
        gateway,
    })
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", crate::api::routes(state))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn register_routes(config: &AppConfig) -> anyhow::Result<Router> {
    let db = database::create_pool(&config.database_url).await?;

    tracing::info!("Database connected and migrations applied");

    let identity = Arc::new(JwtIdentityProvider::new(
        JwtService::new(&config.secret_key),
        db.clone(),
    ));

    Ok(build_router(build_state(db, identity)))
}
