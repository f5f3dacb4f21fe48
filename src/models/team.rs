use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authz::{ProjectPermission, TeamRole};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamUser {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
}

/// Grant of a project to a team at a given permission level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTeam {
    pub project_id: Uuid,
    pub team_id: Uuid,
    pub permission: ProjectPermission,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDetails {
    #[serde(flatten)]
    pub team: Team,
    pub members: Vec<TeamUser>,
    pub projects: Vec<ProjectTeam>,
}
