use serde_json::Value;

use super::{Access, ActionContext, ServerAction};
use crate::authz::check_authorization;
use crate::middleware::AuthUser;
use crate::services::validation::Validate;
use crate::services::{ServiceError, ServiceResult};
use crate::state::AppState;

/// Run one action for an authenticated user.
/// Validation and authorization both finish before anything is written.
pub async fn run_action<A: ServerAction>(
    action: &A,
    state: &AppState,
    user: &AuthUser,
    body: Value,
) -> ServiceResult<A::Output> {
    let input: A::Input = serde_json::from_value(body)
        .map_err(|e| ServiceError::validation(format!("Invalid input for {}: {}", A::NAME, e)))?;
    input.validate()?;

    let ctx = ActionContext { state, user };

    match action.access(&ctx, &input).await? {
        Access::Authenticated => {}
        Access::Rules { organization_id, rules } => {
            check_authorization(state.store.as_ref(), user.user_id, organization_id, &rules).await?;
        }
    }

    let output = action.execute(&ctx, &input).await?;

    let tags = action.invalidations(&input, &output);
    if !tags.is_empty() {
        state.cache.invalidate_all(&tags).await;
    }

    if state.config.security.enable_audit_logging {
        tracing::info!(target: "audit", "action={} user={}", A::NAME, user.user_id);
    }
    tracing::debug!("Action {} completed for user {}", A::NAME, user.user_id);
    Ok(output)
}
