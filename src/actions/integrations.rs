use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::segments::EnvironmentIdInput;
use super::{environment_access, Access, ActionContext, ServerAction};
use crate::authz::ProjectPermission;
use crate::cache::{CacheScope, CacheTag};
use crate::models::{Integration, IntegrationType};
use crate::services::{FieldErrors, ServiceResult, Validate};

fn integration_tags(environment_id: Uuid) -> Vec<CacheTag> {
    vec![
        CacheTag::new(CacheScope::Integration, environment_id),
        CacheTag::new(CacheScope::Environment, environment_id),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectIntegrationInput {
    pub environment_id: Uuid,
    #[serde(rename = "type")]
    pub kind: IntegrationType,
    /// Provider token, stored encrypted
    pub key: String,
    pub user_email: Option<String>,
}

impl Validate for ConnectIntegrationInput {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        errors.require_non_blank(&self.key, "key");
        if let Some(email) = &self.user_email {
            errors.require(email.contains('@'), "userEmail", "must be an email address");
        }
        errors.into_result("Invalid integration")
    }
}

pub struct ConnectIntegration;

#[async_trait]
impl ServerAction for ConnectIntegration {
    const NAME: &'static str = "connectIntegration";
    type Input = ConnectIntegrationInput;
    type Output = Integration;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::ReadWrite).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Integration> {
        ctx.state
            .integrations()
            .connect_integration(input.environment_id, input.kind, &input.key, input.user_email.clone())
            .await
    }

    fn invalidations(&self, input: &Self::Input, _output: &Integration) -> Vec<CacheTag> {
        integration_tags(input.environment_id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationRef {
    pub environment_id: Uuid,
    #[serde(rename = "type")]
    pub kind: IntegrationType,
}

impl Validate for IntegrationRef {}

pub struct DisconnectIntegration;

#[async_trait]
impl ServerAction for DisconnectIntegration {
    const NAME: &'static str = "disconnectIntegration";
    type Input = IntegrationRef;
    type Output = ();

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::ReadWrite).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<()> {
        ctx.state
            .integrations()
            .disconnect_integration(input.environment_id, input.kind)
            .await
    }

    fn invalidations(&self, input: &Self::Input, _output: &()) -> Vec<CacheTag> {
        integration_tags(input.environment_id)
    }
}

pub struct GetIntegrations;

#[async_trait]
impl ServerAction for GetIntegrations {
    const NAME: &'static str = "getIntegrations";
    type Input = EnvironmentIdInput;
    type Output = Vec<Integration>;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::Read).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Vec<Integration>> {
        ctx.state.integrations().get_integrations(input.environment_id).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIntegrationDataInput {
    pub environment_id: Uuid,
    #[serde(rename = "type")]
    pub kind: IntegrationType,
    pub data: Value,
}

impl Validate for UpdateIntegrationDataInput {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        errors.require(self.data.is_array(), "data", "must be a list");
        errors.into_result("Invalid integration data")
    }
}

pub struct UpdateIntegrationData;

#[async_trait]
impl ServerAction for UpdateIntegrationData {
    const NAME: &'static str = "updateIntegrationData";
    type Input = UpdateIntegrationDataInput;
    type Output = Integration;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::ReadWrite).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Integration> {
        ctx.state
            .integrations()
            .update_integration_data(input.environment_id, input.kind, input.data.clone())
            .await
    }

    fn invalidations(&self, input: &Self::Input, _output: &Integration) -> Vec<CacheTag> {
        integration_tags(input.environment_id)
    }
}
