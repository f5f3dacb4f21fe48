use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::{environment_access, Access, ActionContext, ServerAction};
use crate::authz::ProjectPermission;
use crate::cache::{CacheScope, CacheTag};
use crate::filter::BaseFilters;
use crate::models::Segment;
use crate::services::segment_service::SegmentUpdate;
use crate::services::{FieldErrors, ServiceResult, Validate};

fn segment_tags(environment_id: Uuid, segment_id: Uuid) -> Vec<CacheTag> {
    vec![
        CacheTag::new(CacheScope::Segment, segment_id),
        CacheTag::new(CacheScope::Environment, environment_id),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSegmentInput {
    pub environment_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub filters: BaseFilters,
}

impl Validate for CreateSegmentInput {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        errors.require_non_blank(&self.title, "title");
        errors.into_result("Invalid segment")
    }
}

pub struct CreateSegment;

#[async_trait]
impl ServerAction for CreateSegment {
    const NAME: &'static str = "createSegment";
    type Input = CreateSegmentInput;
    type Output = Segment;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::ReadWrite).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Segment> {
        ctx.state
            .segments()
            .create_segment(
                input.environment_id,
                &input.title,
                input.description.clone(),
                input.is_private,
                input.filters.clone(),
            )
            .await
    }

    fn invalidations(&self, input: &Self::Input, output: &Segment) -> Vec<CacheTag> {
        segment_tags(input.environment_id, output.id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSegmentInput {
    pub environment_id: Uuid,
    pub segment_id: Uuid,
    #[serde(flatten)]
    pub update: SegmentUpdate,
}

impl Validate for UpdateSegmentInput {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.update.title {
            errors.require_non_blank(title, "title");
        }
        errors.into_result("Invalid segment")
    }
}

pub struct UpdateSegment;

#[async_trait]
impl ServerAction for UpdateSegment {
    const NAME: &'static str = "updateSegment";
    type Input = UpdateSegmentInput;
    type Output = Segment;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::ReadWrite).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Segment> {
        ctx.state
            .segments()
            .update_segment(input.environment_id, input.segment_id, input.update.clone())
            .await
    }

    fn invalidations(&self, input: &Self::Input, _output: &Segment) -> Vec<CacheTag> {
        segment_tags(input.environment_id, input.segment_id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRef {
    pub environment_id: Uuid,
    pub segment_id: Uuid,
}

impl Validate for SegmentRef {}

pub struct ResetSegmentFilters;

#[async_trait]
impl ServerAction for ResetSegmentFilters {
    const NAME: &'static str = "resetSegmentFilters";
    type Input = SegmentRef;
    type Output = Segment;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::ReadWrite).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Segment> {
        ctx.state
            .segments()
            .reset_segment_filters(input.environment_id, input.segment_id)
            .await
    }

    fn invalidations(&self, input: &Self::Input, _output: &Segment) -> Vec<CacheTag> {
        segment_tags(input.environment_id, input.segment_id)
    }
}

pub struct CloneSegment;

#[async_trait]
impl ServerAction for CloneSegment {
    const NAME: &'static str = "cloneSegment";
    type Input = SegmentRef;
    type Output = Segment;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::ReadWrite).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Segment> {
        ctx.state.segments().clone_segment(input.environment_id, input.segment_id).await
    }

    fn invalidations(&self, input: &Self::Input, output: &Segment) -> Vec<CacheTag> {
        segment_tags(input.environment_id, output.id)
    }
}

pub struct DeleteSegment;

#[async_trait]
impl ServerAction for DeleteSegment {
    const NAME: &'static str = "deleteSegment";
    type Input = SegmentRef;
    type Output = Segment;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::ReadWrite).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Segment> {
        ctx.state.segments().delete_segment(input.environment_id, input.segment_id).await
    }

    fn invalidations(&self, input: &Self::Input, _output: &Segment) -> Vec<CacheTag> {
        segment_tags(input.environment_id, input.segment_id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentIdInput {
    pub environment_id: Uuid,
}

impl Validate for EnvironmentIdInput {}

pub struct GetSegments;

#[async_trait]
impl ServerAction for GetSegments {
    const NAME: &'static str = "getSegments";
    type Input = EnvironmentIdInput;
    type Output = Vec<Segment>;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::Read).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Vec<Segment>> {
        ctx.state.segments().list_segments(input.environment_id).await
    }
}
