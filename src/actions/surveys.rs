use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::{environment_access, Access, ActionContext, ServerAction};
use crate::authz::ProjectPermission;
use crate::cache::{CacheScope, CacheTag};
use crate::models::Survey;
use super::segments::EnvironmentIdInput;
use crate::services::{CopySummary, CopyTarget, FieldErrors, PersonalLink, ServiceResult, Validate};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSurveyInput {
    pub environment_id: Uuid,
    pub name: String,
    pub segment_id: Option<Uuid>,
    #[serde(default)]
    pub definition: Value,
}

impl Validate for CreateSurveyInput {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        errors.require_non_blank(&self.name, "name");
        errors.into_result("Invalid survey")
    }
}

pub struct CreateSurvey;

#[async_trait]
impl ServerAction for CreateSurvey {
    const NAME: &'static str = "createSurvey";
    type Input = CreateSurveyInput;
    type Output = Survey;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::ReadWrite).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Survey> {
        ctx.state
            .surveys()
            .create_survey(
                input.environment_id,
                ctx.user.user_id,
                &input.name,
                input.segment_id,
                input.definition.clone(),
            )
            .await
    }

    fn invalidations(&self, input: &Self::Input, output: &Survey) -> Vec<CacheTag> {
        vec![
            CacheTag::new(CacheScope::Survey, output.id),
            CacheTag::new(CacheScope::Environment, input.environment_id),
        ]
    }
}

pub struct GetSurveys;

#[async_trait]
impl ServerAction for GetSurveys {
    const NAME: &'static str = "getSurveys";
    type Input = EnvironmentIdInput;
    type Output = Vec<Survey>;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::Read).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Vec<Survey>> {
        ctx.state.surveys().list_surveys(input.environment_id).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopySurveyInput {
    pub environment_id: Uuid,
    pub survey_id: Uuid,
    pub targets: Vec<CopyTarget>,
}

impl Validate for CopySurveyInput {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        errors.require(!self.targets.is_empty(), "targets", "Select at least one environment");
        errors.into_result("Invalid copy request")
    }
}

/// Copies into each target independently. Target permissions are checked per copy,
/// so the action itself only needs write access to the source.
pub struct CopySurveyToOtherEnvironments;

#[async_trait]
impl ServerAction for CopySurveyToOtherEnvironments {
    const NAME: &'static str = "copySurveyToOtherEnvironments";
    type Input = CopySurveyInput;
    type Output = CopySummary;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::ReadWrite).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<CopySummary> {
        ctx.state
            .surveys()
            .copy_survey_to_environments(ctx.user.user_id, input.environment_id, input.survey_id, &input.targets)
            .await
    }

    fn invalidations(&self, _input: &Self::Input, output: &CopySummary) -> Vec<CacheTag> {
        output
            .copies
            .iter()
            .flat_map(|copy| {
                [
                    CacheTag::new(CacheScope::Survey, copy.id),
                    CacheTag::new(CacheScope::Environment, copy.environment_id),
                ]
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePersonalLinksInput {
    pub environment_id: Uuid,
    pub survey_id: Uuid,
    pub segment_id: Uuid,
    pub expiration_days: Option<u32>,
}

impl Validate for GeneratePersonalLinksInput {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        errors.require(
            self.expiration_days.map(|d| d > 0).unwrap_or(true),
            "expirationDays",
            "must be at least one day",
        );
        errors.into_result("Invalid link request")
    }
}

/// `null` data means generation failed, an empty list means no contact matched
pub struct GeneratePersonalLinks;

#[async_trait]
impl ServerAction for GeneratePersonalLinks {
    const NAME: &'static str = "generatePersonalLinks";
    type Input = GeneratePersonalLinksInput;
    type Output = Option<Vec<PersonalLink>>;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::ReadWrite).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Option<Vec<PersonalLink>>> {
        Ok(ctx
            .state
            .personal_links()
            .generate_personal_links(input.environment_id, input.survey_id, input.segment_id, input.expiration_days)
            .await)
    }
}
