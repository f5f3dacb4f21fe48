use axum::extract::State;
use axum::http::HeaderMap;

use super::API_KEY_HEADER;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::ApiKey;
use crate::services::ServiceError;
use crate::state::AppState;

/// GET /api/v1/management/me - the key presented, with its environment grants
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<ApiKey> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::unauthorized("Missing x-api-key header"))?;

    match state.api_keys().authenticate_api_key(presented.trim()).await {
        Ok(api_key) => Ok(ApiResponse::success(api_key)),
        Err(ServiceError::Authorization(msg)) => Err(ApiError::unauthorized(msg)),
        Err(e) => Err(e.into()),
    }
}
