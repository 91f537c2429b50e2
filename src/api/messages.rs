use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::HeaderMap,
    routing::{get, patch, post},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::models::message::{
    ConversationSummary, Message, SendMessageRequest, UpdateStatusRequest,
};
use crate::models::page::Paginated;
use crate::utils::error::AppResult;
use crate::utils::helpers::extract_user_id;
use crate::utils::validation::clamp_page;

#[derive(Deserialize)]
struct GetMessagesQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> AppResult<Json<Message>> {
    let user_id = extract_user_id(&headers)?;
    let Json(req) = payload?;
    let message = state.dispatcher.send(&user_id, req, None).await?;
    Ok(Json(message))
}

async fn get_conversation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(other_user_id): Path<String>,
    query: Result<Query<GetMessagesQuery>, QueryRejection>,
) -> AppResult<Json<Paginated<Message>>> {
    let user_id = extract_user_id(&headers)?;
    let Query(query) = query?;
    let page = clamp_page(query.limit, query.offset);
    let messages = state
        .dispatcher
        .get_conversation(&user_id, &other_user_id, page)
        .await?;
    Ok(Json(messages))
}

async fn get_received(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<GetMessagesQuery>, QueryRejection>,
) -> AppResult<Json<Paginated<Message>>> {
    let user_id = extract_user_id(&headers)?;
    let Query(query) = query?;
    let page = clamp_page(query.limit, query.offset);
    Ok(Json(state.dispatcher.get_received(&user_id, page).await?))
}

async fn get_sent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<GetMessagesQuery>, QueryRejection>,
) -> AppResult<Json<Paginated<Message>>> {
    let user_id = extract_user_id(&headers)?;
    let Query(query) = query?;
    let page = clamp_page(query.limit, query.offset);
    Ok(Json(state.dispatcher.get_sent(&user_id, page).await?))
}

async fn get_conversation_list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    let user_id = extract_user_id(&headers)?;
    Ok(Json(state.dispatcher.get_conversation_list(&user_id).await?))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(message_id): Path<String>,
) -> AppResult<Json<Message>> {
    let user_id = extract_user_id(&headers)?;
    Ok(Json(state.dispatcher.get_one(&message_id, &user_id).await?))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(message_id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> AppResult<Json<Message>> {
    let user_id = extract_user_id(&headers)?;
    let Json(req) = payload?;
    let message = state
        .dispatcher
        .update_status(&message_id, req.status, &user_id)
        .await?;
    Ok(Json(message))
}

async fn delete_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(message_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let user_id = extract_user_id(&headers)?;
    state.dispatcher.delete(&message_id, &user_id).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(send_message_handler))
        .route("/conversation/:other_user_id", get(get_conversation))
        .route("/received", get(get_received))
        .route("/sent", get(get_sent))
        .route("/list", get(get_conversation_list))
        .route("/:id", get(get_one).delete(delete_message))
        .route("/:id/status", patch(update_status))
        .with_state(state)
}
