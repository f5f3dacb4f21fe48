use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::teams::OrganizationIdInput;
use super::{Access, ActionContext, ServerAction};
use crate::cache::{CacheScope, CacheTag};
use crate::models::{ApiKey, ApiKeyWithSecret};
use crate::services::api_key_service::EnvironmentPermissionInput;
use crate::services::{FieldErrors, ServiceResult, Validate};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyInput {
    pub organization_id: Uuid,
    pub label: String,
    #[serde(default)]
    pub environment_permissions: Vec<EnvironmentPermissionInput>,
}

impl Validate for CreateApiKeyInput {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        errors.require_non_blank(&self.label, "label");
        errors.into_result("Invalid API key")
    }
}

pub struct CreateApiKey;

#[async_trait]
impl ServerAction for CreateApiKey {
    const NAME: &'static str = "createApiKey";
    type Input = CreateApiKeyInput;
    type Output = ApiKeyWithSecret;

    async fn access(&self, _ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        Ok(Access::org_admins(input.organization_id))
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<ApiKeyWithSecret> {
        ctx.state
            .api_keys()
            .create_api_key(
                input.organization_id,
                ctx.user.user_id,
                &input.label,
                &input.environment_permissions,
            )
            .await
    }

    fn invalidations(&self, input: &Self::Input, output: &ApiKeyWithSecret) -> Vec<CacheTag> {
        vec![
            CacheTag::new(CacheScope::ApiKey, output.api_key.id),
            CacheTag::new(CacheScope::Organization, input.organization_id),
        ]
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteApiKeyInput {
    pub organization_id: Uuid,
    pub api_key_id: Uuid,
}

impl Validate for DeleteApiKeyInput {}

pub struct DeleteApiKey;

#[async_trait]
impl ServerAction for DeleteApiKey {
    const NAME: &'static str = "deleteApiKey";
    type Input = DeleteApiKeyInput;
    type Output = ApiKey;

    async fn access(&self, _ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        Ok(Access::org_admins(input.organization_id))
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<ApiKey> {
        ctx.state
            .api_keys()
            .delete_api_key(input.organization_id, input.api_key_id)
            .await
    }

    fn invalidations(&self, input: &Self::Input, _output: &ApiKey) -> Vec<CacheTag> {
        vec![
            CacheTag::new(CacheScope::ApiKey, input.api_key_id),
            CacheTag::new(CacheScope::Organization, input.organization_id),
        ]
    }
}

pub struct GetApiKeys;

#[async_trait]
impl ServerAction for GetApiKeys {
    const NAME: &'static str = "getApiKeys";
    type Input = OrganizationIdInput;
    type Output = Vec<ApiKey>;

    async fn access(&self, _ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        Ok(Access::org_admins(input.organization_id))
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Vec<ApiKey>> {
        ctx.state.api_keys().list_api_keys(input.organization_id).await
    }
}
