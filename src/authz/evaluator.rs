use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::roles::{OrganizationRole, ProjectPermission, TeamRole};
use crate::database::{OrganizationStore, Store, TeamStore};
use crate::services::ServiceError;

/// One way of being allowed to run an action. A list of rules is OR-ed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AccessRule {
    #[serde(rename_all = "camelCase")]
    Organization { roles: Vec<OrganizationRole> },
    #[serde(rename_all = "camelCase")]
    ProjectTeam {
        project_id: Uuid,
        min_permission: ProjectPermission,
    },
    #[serde(rename_all = "camelCase")]
    Team { team_id: Uuid, min_permission: TeamRole },
}

impl AccessRule {
    /// Shorthand for the common owner-or-manager rule
    pub fn org_admins() -> Self {
        AccessRule::Organization {
            roles: vec![OrganizationRole::Owner, OrganizationRole::Manager],
        }
    }

    pub fn project(project_id: Uuid, min_permission: ProjectPermission) -> Self {
        AccessRule::ProjectTeam { project_id, min_permission }
    }

    pub fn team(team_id: Uuid, min_permission: TeamRole) -> Self {
        AccessRule::Team { team_id, min_permission }
    }
}

/// What a user actually holds inside one organization, as far as the rules need to know
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAccess {
    pub organization_role: Option<OrganizationRole>,
    pub project_permissions: HashMap<Uuid, ProjectPermission>,
    pub team_roles: HashMap<Uuid, TeamRole>,
}

/// Pure OR-evaluation of `rules` against resolved grants.
/// A user without membership never passes, whatever the rules say.
pub fn evaluate_access(access: &ResolvedAccess, rules: &[AccessRule]) -> bool {
    if access.organization_role.is_none() {
        return false;
    }

    rules.iter().any(|rule| match rule {
        AccessRule::Organization { roles } => access
            .organization_role
            .map(|role| roles.contains(&role))
            .unwrap_or(false),
        AccessRule::ProjectTeam { project_id, min_permission } => access
            .project_permissions
            .get(project_id)
            .map(|held| held.satisfies(*min_permission))
            .unwrap_or(false),
        AccessRule::Team { team_id, min_permission } => access
            .team_roles
            .get(team_id)
            .map(|held| held >= min_permission)
            .unwrap_or(false),
    })
}

/// Load the grants `rules` refer to. Projects and teams outside the organization resolve to nothing.
pub async fn resolve_access(
    store: &dyn Store,
    user_id: Uuid,
    organization_id: Uuid,
    rules: &[AccessRule],
) -> Result<ResolvedAccess, ServiceError> {
    let mut access = ResolvedAccess {
        organization_role: store
            .get_membership(organization_id, user_id)
            .await?
            .map(|m| m.role),
        ..Default::default()
    };

    if access.organization_role.is_none() {
        return Ok(access);
    }

    for rule in rules {
        match rule {
            AccessRule::Organization { .. } => {}
            AccessRule::ProjectTeam { project_id, .. } => {
                if access.project_permissions.contains_key(project_id) {
                    continue;
                }
                let in_org = store
                    .get_project(*project_id)
                    .await?
                    .map(|p| p.organization_id == organization_id)
                    .unwrap_or(false);
                if !in_org {
                    continue;
                }
                if let Some(permission) = store.get_project_permission(user_id, *project_id).await? {
                    access.project_permissions.insert(*project_id, permission);
                }
            }
            AccessRule::Team { team_id, .. } => {
                if access.team_roles.contains_key(team_id) {
                    continue;
                }
                let in_org = store
                    .get_team(*team_id)
                    .await?
                    .map(|t| t.organization_id == organization_id)
                    .unwrap_or(false);
                if !in_org {
                    continue;
                }
                if let Some(role) = store.get_team_role(*team_id, user_id).await? {
                    access.team_roles.insert(*team_id, role);
                }
            }
        }
    }

    Ok(access)
}

/// Guard run before every mutating domain operation
pub async fn check_authorization(
    store: &dyn Store,
    user_id: Uuid,
    organization_id: Uuid,
    rules: &[AccessRule],
) -> Result<(), ServiceError> {
    let access = resolve_access(store, user_id, organization_id, rules).await?;

    if evaluate_access(&access, rules) {
        return Ok(());
    }

    tracing::warn!(
        "Authorization denied: user={} organization={} rules={}",
        user_id,
        organization_id,
        rules.len()
    );
    Err(ServiceError::authorization("Not authorized"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member_with(role: OrganizationRole) -> ResolvedAccess {
        ResolvedAccess {
            organization_role: Some(role),
            ..Default::default()
        }
    }

    #[test]
    fn admin_or_project_read_write_is_or_semantics() {
        let project_id = Uuid::new_v4();
        let rules = vec![AccessRule::org_admins(), AccessRule::project(project_id, ProjectPermission::ReadWrite)];

        // Neither rule holds
        let mut access = member_with(OrganizationRole::Member);
        assert!(!evaluate_access(&access, &rules));

        // Only the project rule holds
        access.project_permissions.insert(project_id, ProjectPermission::ReadWrite);
        assert!(evaluate_access(&access, &rules));

        // Only the organization rule holds
        assert!(evaluate_access(&member_with(OrganizationRole::Manager), &rules));
        assert!(evaluate_access(&member_with(OrganizationRole::Owner), &rules));
    }

    #[test]
    fn project_permission_threshold_is_inclusive() {
        let project_id = Uuid::new_v4();
        let rules = vec![AccessRule::project(project_id, ProjectPermission::ReadWrite)];
        let mut access = member_with(OrganizationRole::Member);

        access.project_permissions.insert(project_id, ProjectPermission::Read);
        assert!(!evaluate_access(&access, &rules));

        access.project_permissions.insert(project_id, ProjectPermission::Manage);
        assert!(evaluate_access(&access, &rules));
    }

    #[test]
    fn permission_on_another_project_does_not_count() {
        let rules = vec![AccessRule::project(Uuid::new_v4(), ProjectPermission::Read)];
        let mut access = member_with(OrganizationRole::Member);
        access.project_permissions.insert(Uuid::new_v4(), ProjectPermission::Manage);
        assert!(!evaluate_access(&access, &rules));
    }

    #[test]
    fn team_rule_compares_team_role() {
        let team_id = Uuid::new_v4();
        let rules = vec![AccessRule::team(team_id, TeamRole::Admin)];
        let mut access = member_with(OrganizationRole::Member);

        access.team_roles.insert(team_id, TeamRole::Contributor);
        assert!(!evaluate_access(&access, &rules));

        access.team_roles.insert(team_id, TeamRole::Admin);
        assert!(evaluate_access(&access, &rules));
    }

    #[test]
    fn non_members_are_always_denied() {
        let project_id = Uuid::new_v4();
        let mut access = ResolvedAccess::default();
        access.project_permissions.insert(project_id, ProjectPermission::Manage);
        assert!(!evaluate_access(&access, &[AccessRule::project(project_id, ProjectPermission::Read)]));
    }

    #[test]
    fn empty_rule_list_denies() {
        assert!(!evaluate_access(&member_with(OrganizationRole::Owner), &[]));
    }

    #[test]
    fn rules_deserialize_from_tagged_json() {
        let project_id = Uuid::new_v4();
        let json = serde_json::json!([
            { "type": "organization", "roles": ["owner", "manager"] },
            { "type": "projectTeam", "projectId": project_id, "minPermission": "readWrite" }
        ]);
        let rules: Vec<AccessRule> = serde_json::from_value(json).unwrap();
        assert_eq!(rules[0], AccessRule::org_admins());
        assert_eq!(rules[1], AccessRule::project(project_id, ProjectPermission::ReadWrite));
    }
}
