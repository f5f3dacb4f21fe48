use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::{Access, ActionContext, ServerAction};
use crate::authz::{AccessRule, TeamRole};
use crate::cache::{CacheScope, CacheTag};
use crate::models::{Team, TeamDetails, TeamUser};
use crate::services::team_service::{TeamMemberInput, TeamProjectInput};
use crate::services::{FieldErrors, ServiceResult, Validate};

/// Organization of the team, so rules can be checked before the team is touched
async fn team_organization(ctx: &ActionContext<'_>, team_id: Uuid) -> ServiceResult<Uuid> {
    Ok(ctx.state.teams().get_team(team_id).await?.organization_id)
}

/// Owners, managers and admins of the team itself
async fn team_admin_access(ctx: &ActionContext<'_>, team_id: Uuid) -> ServiceResult<Access> {
    let organization_id = team_organization(ctx, team_id).await?;
    Ok(Access::organization(
        organization_id,
        vec![AccessRule::org_admins(), AccessRule::team(team_id, TeamRole::Admin)],
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamInput {
    pub organization_id: Uuid,
    pub name: String,
}

impl Validate for CreateTeamInput {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        errors.require_non_blank(&self.name, "name");
        errors.into_result("Invalid team")
    }
}

pub struct CreateTeam;

#[async_trait]
impl ServerAction for CreateTeam {
    const NAME: &'static str = "createTeam";
    type Input = CreateTeamInput;
    type Output = Team;

    async fn access(&self, _ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        Ok(Access::org_admins(input.organization_id))
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Team> {
        ctx.state.teams().create_team(input.organization_id, &input.name).await
    }

    fn invalidations(&self, input: &Self::Input, _output: &Team) -> Vec<CacheTag> {
        vec![CacheTag::new(CacheScope::Organization, input.organization_id)]
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTeamInput {
    pub team_id: Uuid,
    pub name: Option<String>,
    pub projects: Option<Vec<TeamProjectInput>>,
}

impl Validate for UpdateTeamInput {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            errors.require_non_blank(name, "name");
        }
        if let Some(projects) = &self.projects {
            for (i, project) in projects.iter().enumerate() {
                if projects[..i].iter().any(|p| p.project_id == project.project_id) {
                    errors.add(format!("projects[{}].projectId", i), "Project is listed twice");
                }
            }
        }
        errors.into_result("Invalid team update")
    }
}

pub struct UpdateTeam;

#[async_trait]
impl ServerAction for UpdateTeam {
    const NAME: &'static str = "updateTeam";
    type Input = UpdateTeamInput;
    type Output = TeamDetails;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        Ok(Access::org_admins(team_organization(ctx, input.team_id).await?))
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<TeamDetails> {
        ctx.state
            .teams()
            .update_team(input.team_id, input.name.as_deref(), input.projects.as_deref())
            .await
    }

    fn invalidations(&self, input: &Self::Input, output: &TeamDetails) -> Vec<CacheTag> {
        let mut tags = vec![CacheTag::new(CacheScope::Team, input.team_id)];
        tags.extend(output.projects.iter().map(|p| CacheTag::new(CacheScope::Project, p.project_id)));
        tags
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamIdInput {
    pub team_id: Uuid,
}

impl Validate for TeamIdInput {}

pub struct DeleteTeam;

#[async_trait]
impl ServerAction for DeleteTeam {
    const NAME: &'static str = "deleteTeam";
    type Input = TeamIdInput;
    type Output = Team;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        Ok(Access::org_admins(team_organization(ctx, input.team_id).await?))
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Team> {
        ctx.state.teams().delete_team(input.team_id).await
    }

    fn invalidations(&self, input: &Self::Input, output: &Team) -> Vec<CacheTag> {
        vec![
            CacheTag::new(CacheScope::Team, input.team_id),
            CacheTag::new(CacheScope::Organization, output.organization_id),
        ]
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTeamMembersInput {
    pub team_id: Uuid,
    pub members: Vec<TeamMemberInput>,
}

impl Validate for AddTeamMembersInput {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        errors.require(!self.members.is_empty(), "members", "Add at least one member");
        for (i, member) in self.members.iter().enumerate() {
            if self.members[..i].iter().any(|m| m.user_id == member.user_id) {
                errors.add(format!("members[{}].userId", i), "User is listed twice");
            }
        }
        errors.into_result("Invalid team members")
    }
}

pub struct AddTeamMembers;

#[async_trait]
impl ServerAction for AddTeamMembers {
    const NAME: &'static str = "addTeamMembers";
    type Input = AddTeamMembersInput;
    type Output = Vec<TeamUser>;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        team_admin_access(ctx, input.team_id).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Vec<TeamUser>> {
        ctx.state.teams().add_team_members(input.team_id, &input.members).await
    }

    fn invalidations(&self, input: &Self::Input, _output: &Vec<TeamUser>) -> Vec<CacheTag> {
        let mut tags = vec![CacheTag::new(CacheScope::Team, input.team_id)];
        tags.extend(input.members.iter().map(|m| CacheTag::new(CacheScope::User, m.user_id)));
        tags
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveTeamMemberInput {
    pub team_id: Uuid,
    pub user_id: Uuid,
}

impl Validate for RemoveTeamMemberInput {}

pub struct RemoveTeamMember;

#[async_trait]
impl ServerAction for RemoveTeamMember {
    const NAME: &'static str = "removeTeamMember";
    type Input = RemoveTeamMemberInput;
    type Output = ();

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        team_admin_access(ctx, input.team_id).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<()> {
        ctx.state.teams().remove_team_member(input.team_id, input.user_id).await
    }

    fn invalidations(&self, input: &Self::Input, _output: &()) -> Vec<CacheTag> {
        vec![
            CacheTag::new(CacheScope::Team, input.team_id),
            CacheTag::new(CacheScope::User, input.user_id),
        ]
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationIdInput {
    pub organization_id: Uuid,
}

impl Validate for OrganizationIdInput {}

pub struct GetTeams;

#[async_trait]
impl ServerAction for GetTeams {
    const NAME: &'static str = "getTeams";
    type Input = OrganizationIdInput;
    type Output = Vec<Team>;

    async fn access(&self, _ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        Ok(Access::org_members(input.organization_id))
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Vec<Team>> {
        ctx.state.teams().list_teams(input.organization_id).await
    }
}

pub struct GetTeamDetails;

#[async_trait]
impl ServerAction for GetTeamDetails {
    const NAME: &'static str = "getTeamDetails";
    type Input = TeamIdInput;
    type Output = TeamDetails;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        Ok(Access::org_members(team_organization(ctx, input.team_id).await?))
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<TeamDetails> {
        ctx.state.teams().get_team_details(input.team_id).await
    }
}
