use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::{Access, ActionContext, ServerAction};
use crate::authz::OrganizationRole;
use crate::cache::{CacheScope, CacheTag};
use crate::models::{Membership, Organization};
use crate::services::organization_service::ProjectWithEnvironments;
use crate::services::{FieldErrors, ServiceResult, Validate};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationInput {
    pub name: String,
}

impl Validate for CreateOrganizationInput {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        errors.require_non_blank(&self.name, "name");
        errors.into_result("Invalid organization")
    }
}

pub struct CreateOrganization;

#[async_trait]
impl ServerAction for CreateOrganization {
    const NAME: &'static str = "createOrganization";
    type Input = CreateOrganizationInput;
    type Output = Organization;

    async fn access(&self, _ctx: &ActionContext<'_>, _input: &Self::Input) -> ServiceResult<Access> {
        Ok(Access::Authenticated)
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Organization> {
        ctx.state
            .organizations()
            .create_organization(ctx.user.user_id, &input.name)
            .await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMembershipInput {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: OrganizationRole,
}

impl Validate for AddMembershipInput {}

pub struct AddMembership;

#[async_trait]
impl ServerAction for AddMembership {
    const NAME: &'static str = "addMembership";
    type Input = AddMembershipInput;
    type Output = Membership;

    async fn access(&self, _ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        Ok(Access::org_admins(input.organization_id))
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Membership> {
        ctx.state
            .organizations()
            .add_membership(input.organization_id, input.user_id, input.role)
            .await
    }

    fn invalidations(&self, input: &Self::Input, _output: &Membership) -> Vec<CacheTag> {
        vec![
            CacheTag::new(CacheScope::Organization, input.organization_id),
            CacheTag::new(CacheScope::User, input.user_id),
        ]
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectInput {
    pub organization_id: Uuid,
    pub name: String,
}

impl Validate for CreateProjectInput {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        errors.require_non_blank(&self.name, "name");
        errors.into_result("Invalid project")
    }
}

pub struct CreateProject;

#[async_trait]
impl ServerAction for CreateProject {
    const NAME: &'static str = "createProject";
    type Input = CreateProjectInput;
    type Output = ProjectWithEnvironments;

    async fn access(&self, _ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        Ok(Access::org_admins(input.organization_id))
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<ProjectWithEnvironments> {
        ctx.state
            .organizations()
            .create_project(input.organization_id, &input.name)
            .await
    }

    fn invalidations(&self, input: &Self::Input, output: &ProjectWithEnvironments) -> Vec<CacheTag> {
        vec![
            CacheTag::new(CacheScope::Organization, input.organization_id),
            CacheTag::new(CacheScope::Project, output.project.id),
        ]
    }
}
