use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde_json::Value;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// GET /api/actions - names of every registered action
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<&'static str>> {
    Ok(ApiResponse::success(state.actions.names()))
}

/// POST /api/actions/:name - run one server action with the JSON body as input
pub async fn run(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(input) = body.map_err(|e| ApiError::invalid_json(e.body_text()))?;

    let action = state
        .actions
        .get(&name)
        .ok_or_else(|| ApiError::not_found(format!("Unknown action: {}", name)))?;

    let data = action.call(&state, &user, input).await.map_err(|e| {
        tracing::debug!("Action {} failed for user {}: {}", name, user.user_id, e);
        ApiError::from(e)
    })?;
    Ok(ApiResponse::success(data))
}
