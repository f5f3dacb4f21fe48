use axum::extract::{Path, State};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::personal_links::LinkTarget;
use crate::state::AppState;

/// GET /c/:token - resolve a personal survey link to its contact and survey
pub async fn resolve_link(State(state): State<AppState>, Path(token): Path<String>) -> ApiResult<LinkTarget> {
    let target = state.personal_links().verify_personal_link(&token).await?;
    Ok(ApiResponse::success(target))
}
