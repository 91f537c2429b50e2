use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use std::sync::Arc;

use crate::api::AppState;
use crate::utils::error::AppError;

pub const AUTH_USER_ID_HEADER: &str = "x-user-id";

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Whatever the client put here is replaced below.
    request.headers_mut().remove(AUTH_USER_ID_HEADER);

    let TypedHeader(auth) = bearer.ok_or_else(|| {
        AppError::Unauthenticated("Missing or invalid authorization header".to_string())
    })?;

    let user_id = state.identity.authenticate(auth.token()).await?;

    request.headers_mut().insert(
        AUTH_USER_ID_HEADER,
        user_id
            .parse()
            .map_err(|_| AppError::Internal("Failed to set user id header".to_string()))?,
    );

    Ok(next.run(request).await)
}
