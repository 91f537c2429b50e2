pub mod messages;

use axum::{Router, extract::State, routing::get};
use std::sync::Arc;

use crate::database::DbPool;
use crate::services::dispatcher::MessageDispatcher;
use crate::services::identity::IdentityProvider;
use crate::utils::error::AppResult;
use crate::websocket::connection::Gateway;

pub struct AppState {
    pub db: DbPool,
    pub identity: Arc<dyn IdentityProvider>,
    pub dispatcher: Arc<MessageDispatcher>,
    pub gateway: Arc<Gateway>,
}

async fn health_check(State(state): State<Arc<AppState>>) -> AppResult<&'static str> {
    sqlx::query("SELECT 1").execute(state.db.as_ref()).await?;
    Ok("OK")
}

pub fn routes(state: Arc<AppState>) -> Router {
    let ws_route = Router::new()
        .route(
            "/ws",
            axum::routing::get(crate::websocket::handlers::ws_handler),
        )
        .with_state(state.clone());

    let protected_routes = Router::new()
        .nest("/messages", messages::routes(state.clone()))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
        .merge(ws_route)
        .merge(protected_routes)
}
