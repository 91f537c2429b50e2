use axum::{
    extract::{FromRequest, Query, Request, State, ws::WebSocketUpgrade},
    http::header,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::utils::error::{AppError, AppResult};

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Authenticates before upgrading; a bad credential never reaches the registry.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    request: Request,
) -> AppResult<Response> {
    let token = query
        .token
        .or_else(|| {
            request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(|t| t.to_string())
        })
        .ok_or_else(|| AppError::Unauthenticated("Missing credential".to_string()))?;

    let user_id = state.identity.authenticate(&token).await.inspect_err(|e| {
        tracing::warn!("Rejected websocket handshake: {}", e);
    })?;

    let ws = WebSocketUpgrade::from_request(request, &state)
        .await
        .map_err(|_| AppError::Validation("Expected a websocket upgrade request".to_string()))?;

    let gateway = state.gateway.clone();
    Ok(ws.on_upgrade(move |socket| gateway.handle_connection(socket, user_id)))
}
