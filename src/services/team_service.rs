use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::authz::{ProjectPermission, TeamRole};
use crate::cache::{CacheScope, CacheService, CacheTag};
use crate::database::{DatabaseError, OrganizationStore, Store, TeamStore};
use crate::models::{ProjectTeam, Team, TeamDetails, TeamUser};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberInput {
    pub user_id: Uuid,
    pub role: TeamRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamProjectInput {
    pub project_id: Uuid,
    pub permission: ProjectPermission,
}

#[derive(Clone)]
pub struct TeamService {
    store: Arc<dyn Store>,
    cache: CacheService,
}

impl TeamService {
    pub fn new(store: Arc<dyn Store>, cache: CacheService) -> Self {
        Self { store, cache }
    }

    pub async fn get_team(&self, team_id: Uuid) -> ServiceResult<Team> {
        self.store
            .get_team(team_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("team", team_id))
    }

    pub async fn create_team(&self, organization_id: Uuid, name: &str) -> ServiceResult<Team> {
        let name = name.trim();
        if self.store.find_team_by_name(organization_id, name).await?.is_some() {
            return Err(ServiceError::field("name", "Team name already exists"));
        }

        let team = Team {
            id: Uuid::new_v4(),
            organization_id,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.store.create_team(&team).await?;
        tracing::info!("Created team {} in organization {}", team.id, organization_id);
        Ok(team)
    }

    /// Rename and/or replace the project grants of a team
    pub async fn update_team(
        &self,
        team_id: Uuid,
        name: Option<&str>,
        projects: Option<&[TeamProjectInput]>,
    ) -> ServiceResult<TeamDetails> {
        let team = self.get_team(team_id).await?;

        if let Some(name) = name.map(str::trim) {
            if name != team.name {
                if self.store.find_team_by_name(team.organization_id, name).await?.is_some() {
                    return Err(ServiceError::field("name", "Team name already exists"));
                }
                self.store.rename_team(team_id, name).await?;
            }
        }

        if let Some(projects) = projects {
            let mut grants = Vec::with_capacity(projects.len());
            for input in projects {
                let belongs = self
                    .store
                    .get_project(input.project_id)
                    .await?
                    .map(|p| p.organization_id == team.organization_id)
                    .unwrap_or(false);
                if !belongs {
                    return Err(ServiceError::field(
                        "projects",
                        format!("Project {} is not part of this organization", input.project_id),
                    ));
                }
                grants.push(ProjectTeam {
                    project_id: input.project_id,
                    team_id,
                    permission: input.permission,
                });
            }
            self.store.set_team_projects(team_id, &grants).await?;
        }

        self.cache.invalidate(CacheScope::Team, team_id).await;
        self.get_team_details(team_id).await
    }

    pub async fn delete_team(&self, team_id: Uuid) -> ServiceResult<Team> {
        let team = self.get_team(team_id).await?;
        self.store.delete_team(team_id).await?;
        tracing::info!("Deleted team {}", team_id);
        Ok(team)
    }

    pub async fn list_teams(&self, organization_id: Uuid) -> ServiceResult<Vec<Team>> {
        Ok(self.store.list_teams(organization_id).await?)
    }

    pub async fn get_team_details(&self, team_id: Uuid) -> ServiceResult<TeamDetails> {
        let key = format!("team_details:{}", team_id);
        let tags = [CacheTag::new(CacheScope::Team, team_id)];
        let store = self.store.clone();

        self.cache
            .get_or_load(&key, &tags, || async move {
                let team = store
                    .get_team(team_id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("team", team_id))?;
                Ok::<_, ServiceError>(TeamDetails {
                    members: store.list_team_users(team_id).await?,
                    projects: store.list_team_projects(team_id).await?,
                    team,
                })
            })
            .await
    }

    /// Every user must already belong to the organization and not be on the team yet.
    /// The whole list joins in one write or not at all.
    pub async fn add_team_members(&self, team_id: Uuid, members: &[TeamMemberInput]) -> ServiceResult<Vec<TeamUser>> {
        let team = self.get_team(team_id).await?;
        let current = self.store.list_team_users(team_id).await?;

        let mut added: Vec<TeamUser> = Vec::with_capacity(members.len());
        for member in members {
            if added.iter().any(|u| u.user_id == member.user_id) {
                return Err(ServiceError::field(
                    "members",
                    format!("User {} is listed twice", member.user_id),
                ));
            }
            if current.iter().any(|u| u.user_id == member.user_id) {
                return Err(ServiceError::field(
                    "members",
                    format!("User {} is already on this team", member.user_id),
                ));
            }
            if self.store.get_membership(team.organization_id, member.user_id).await?.is_none() {
                return Err(ServiceError::field(
                    "members",
                    format!("User {} is not a member of this organization", member.user_id),
                ));
            }
            added.push(TeamUser {
                team_id,
                user_id: member.user_id,
                role: member.role,
            });
        }

        let written = self.store.add_team_users(&added).await;
        self.cache.invalidate(CacheScope::Team, team_id).await;
        match written {
            Ok(()) => {}
            Err(DatabaseError::UniqueViolation(_)) => {
                return Err(ServiceError::field("members", "A user is already on this team"))
            }
            Err(e) => return Err(e.into()),
        }
        for team_user in &added {
            self.cache.invalidate(CacheScope::User, team_user.user_id).await;
        }
        Ok(added)
    }

    pub async fn remove_team_member(&self, team_id: Uuid, user_id: Uuid) -> ServiceResult<()> {
        if !self.store.remove_team_user(team_id, user_id).await? {
            return Err(ServiceError::not_found("team member", user_id));
        }
        self.cache.invalidate(CacheScope::User, user_id).await;
        self.cache.invalidate(CacheScope::Team, team_id).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::OrganizationRole;
    use crate::testing::Fixture;

    #[tokio::test]
    async fn team_names_are_unique_per_organization() {
        let fx = Fixture::new().await;
        let teams = fx.state.teams();

        teams.create_team(fx.organization.id, "Growth").await.unwrap();
        let err = teams.create_team(fx.organization.id, " Growth ").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));

        let other = fx.state.organizations().create_organization(fx.owner, "Other").await.unwrap();
        teams.create_team(other.id, "Growth").await.unwrap();
    }

    #[tokio::test]
    async fn only_organization_members_can_join() {
        let fx = Fixture::new().await;
        let teams = fx.state.teams();
        let team = teams.create_team(fx.organization.id, "Growth").await.unwrap();

        let outsider = TeamMemberInput {
            user_id: Uuid::new_v4(),
            role: TeamRole::Contributor,
        };
        assert!(teams.add_team_members(team.id, &[outsider]).await.is_err());
        assert!(teams.get_team_details(team.id).await.unwrap().members.is_empty());

        let member = fx.member(OrganizationRole::Member).await;
        let added = teams
            .add_team_members(team.id, &[TeamMemberInput { user_id: member, role: TeamRole::Admin }])
            .await
            .unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(teams.get_team_details(team.id).await.unwrap().members.len(), 1);
    }

    #[tokio::test]
    async fn a_rejected_member_list_adds_nobody() {
        let fx = Fixture::new().await;
        let teams = fx.state.teams();
        let team = teams.create_team(fx.organization.id, "Growth").await.unwrap();
        let first = fx.member(OrganizationRole::Member).await;
        let second = fx.member(OrganizationRole::Member).await;

        assert!(teams.get_team_details(team.id).await.unwrap().members.is_empty());

        let twice = [
            TeamMemberInput { user_id: first, role: TeamRole::Contributor },
            TeamMemberInput { user_id: first, role: TeamRole::Admin },
        ];
        let err = teams.add_team_members(team.id, &twice).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
        assert!(fx.state.store.list_team_users(team.id).await.unwrap().is_empty());
        assert!(teams.get_team_details(team.id).await.unwrap().members.is_empty());

        teams
            .add_team_members(team.id, &[TeamMemberInput { user_id: first, role: TeamRole::Admin }])
            .await
            .unwrap();
        let again = [
            TeamMemberInput { user_id: second, role: TeamRole::Contributor },
            TeamMemberInput { user_id: first, role: TeamRole::Contributor },
        ];
        assert!(teams.add_team_members(team.id, &again).await.is_err());

        let details = teams.get_team_details(team.id).await.unwrap();
        assert_eq!(details.members.len(), 1);
        assert_eq!(details.members[0].user_id, first);
    }

    #[tokio::test]
    async fn store_rejects_the_whole_batch_on_a_duplicate() {
        let fx = Fixture::new().await;
        let team = fx.state.teams().create_team(fx.organization.id, "Growth").await.unwrap();
        let user_id = Uuid::new_v4();
        let row = TeamUser { team_id: team.id, user_id, role: TeamRole::Contributor };

        let err = fx.state.store.add_team_users(&[row.clone(), row]).await.unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation(_)));
        assert!(fx.state.store.list_team_users(team.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn project_grants_must_stay_inside_the_organization() {
        let fx = Fixture::new().await;
        let teams = fx.state.teams();
        let team = teams.create_team(fx.organization.id, "Growth").await.unwrap();

        let grant = TeamProjectInput {
            project_id: fx.project.project.id,
            permission: ProjectPermission::ReadWrite,
        };
        let details = teams.update_team(team.id, Some("Growth 2"), Some(&[grant])).await.unwrap();
        assert_eq!(details.team.name, "Growth 2");
        assert_eq!(details.projects.len(), 1);

        let foreign = TeamProjectInput {
            project_id: Uuid::new_v4(),
            permission: ProjectPermission::Read,
        };
        assert!(teams.update_team(team.id, None, Some(&[foreign])).await.is_err());
    }
}
