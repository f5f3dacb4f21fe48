use std::sync::Arc;
use uuid::Uuid;

use crate::authz::{OrganizationRole, ProjectPermission, TeamRole};
use crate::config::AppConfig;
use crate::database::MemoryStore;
use crate::models::Organization;
use crate::services::organization_service::ProjectWithEnvironments;
use crate::services::team_service::{TeamMemberInput, TeamProjectInput};
use crate::state::AppState;

/// In-memory organization with one project, ready for service tests
pub struct Fixture {
    pub state: AppState,
    pub owner: Uuid,
    pub organization: Organization,
    pub project: ProjectWithEnvironments,
    /// Production environment of `project`
    pub environment_id: Uuid,
}

impl Fixture {
    pub async fn new() -> Self {
        let state = AppState::new(Arc::new(MemoryStore::new()), AppConfig::development())
            .expect("development config carries a valid key");
        let owner = Uuid::new_v4();
        let organizations = state.organizations();
        let organization = organizations
            .create_organization(owner, "Test Org")
            .await
            .expect("create organization");
        let project = organizations
            .create_project(organization.id, "Test Project")
            .await
            .expect("create project");
        let environment_id = project.environments[0].id;

        Self {
            state,
            owner,
            organization,
            project,
            environment_id,
        }
    }

    /// Fresh user with the given organization role
    pub async fn member(&self, role: OrganizationRole) -> Uuid {
        let user = Uuid::new_v4();
        self.state
            .organizations()
            .add_membership(self.organization.id, user, role)
            .await
            .expect("add membership");
        user
    }

    /// Fresh organization member holding `permission` on the fixture project through a new team
    pub async fn project_member(&self, permission: ProjectPermission) -> Uuid {
        let user = self.member(OrganizationRole::Member).await;
        let teams = self.state.teams();
        let team = teams
            .create_team(self.organization.id, &format!("team-{}", Uuid::new_v4().simple()))
            .await
            .expect("create team");
        teams
            .add_team_members(team.id, &[TeamMemberInput { user_id: user, role: TeamRole::Contributor }])
            .await
            .expect("add team member");
        teams
            .update_team(
                team.id,
                None,
                Some(&[TeamProjectInput {
                    project_id: self.project.project.id,
                    permission,
                }]),
            )
            .await
            .expect("grant project");
        user
    }
}
