use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a user inside an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationRole {
    Owner,
    Manager,
    Member,
}

impl OrganizationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationRole::Owner => "owner",
            OrganizationRole::Manager => "manager",
            OrganizationRole::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(OrganizationRole::Owner),
            "manager" => Some(OrganizationRole::Manager),
            "member" => Some(OrganizationRole::Member),
            _ => None,
        }
    }

    /// Owners and managers administer every project of the organization
    pub fn is_admin(&self) -> bool {
        matches!(self, OrganizationRole::Owner | OrganizationRole::Manager)
    }
}

/// Role of a user inside a team. Declaration order is the privilege order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Contributor,
    Admin,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Contributor => "contributor",
            TeamRole::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "contributor" => Some(TeamRole::Contributor),
            "admin" => Some(TeamRole::Admin),
            _ => None,
        }
    }
}

/// Permission a team holds on a project. Ordered `Read < ReadWrite < Manage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectPermission {
    Read,
    ReadWrite,
    #[serde(alias = "admin")]
    Manage,
}

impl ProjectPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectPermission::Read => "read",
            ProjectPermission::ReadWrite => "readWrite",
            ProjectPermission::Manage => "manage",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "read" => Some(ProjectPermission::Read),
            "readWrite" => Some(ProjectPermission::ReadWrite),
            "manage" | "admin" => Some(ProjectPermission::Manage),
            _ => None,
        }
    }

    pub fn satisfies(&self, required: ProjectPermission) -> bool {
        *self >= required
    }
}

impl fmt::Display for OrganizationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ProjectPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
