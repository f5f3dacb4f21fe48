// Storage ports. Postgres and in-memory backends implement every trait with the same semantics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::manager::DatabaseError;
use crate::authz::{ProjectPermission, TeamRole};
use crate::filter::FilterExpr;
use crate::models::{
    ApiKey, Contact, ContactAttributeKey, ContactWrite, Environment, EnvironmentScope, Integration, IntegrationType,
    Membership, Organization, Project, ProjectTeam, Segment, Survey, Team, TeamUser,
};

pub type StoreResult<T> = Result<T, DatabaseError>;

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn create_organization(&self, organization: &Organization, owner: &Membership) -> StoreResult<()>;
    async fn get_organization(&self, id: Uuid) -> StoreResult<Option<Organization>>;
    /// Insert or change the role of a membership
    async fn upsert_membership(&self, membership: &Membership) -> StoreResult<()>;
    async fn get_membership(&self, organization_id: Uuid, user_id: Uuid) -> StoreResult<Option<Membership>>;
    async fn create_project(&self, project: &Project, environments: &[Environment]) -> StoreResult<()>;
    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>>;
    async fn get_environment(&self, id: Uuid) -> StoreResult<Option<Environment>>;
    async fn get_environment_scope(&self, environment_id: Uuid) -> StoreResult<Option<EnvironmentScope>>;
}

#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn create_team(&self, team: &Team) -> StoreResult<()>;
    async fn get_team(&self, id: Uuid) -> StoreResult<Option<Team>>;
    async fn find_team_by_name(&self, organization_id: Uuid, name: &str) -> StoreResult<Option<Team>>;
    async fn list_teams(&self, organization_id: Uuid) -> StoreResult<Vec<Team>>;
    async fn rename_team(&self, id: Uuid, name: &str) -> StoreResult<()>;
    async fn delete_team(&self, id: Uuid) -> StoreResult<bool>;
    /// Fails with `UniqueViolation` when the user is already on the team
    /// All-or-nothing: either every user joins or none does
    async fn add_team_users(&self, team_users: &[TeamUser]) -> StoreResult<()>;
    async fn remove_team_user(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    async fn list_team_users(&self, team_id: Uuid) -> StoreResult<Vec<TeamUser>>;
    async fn get_team_role(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<TeamRole>>;
    /// Replace the project grants of a team
    async fn set_team_projects(&self, team_id: Uuid, projects: &[ProjectTeam]) -> StoreResult<()>;
    async fn list_team_projects(&self, team_id: Uuid) -> StoreResult<Vec<ProjectTeam>>;
    /// Highest permission any of the user's teams holds on the project
    async fn get_project_permission(&self, user_id: Uuid, project_id: Uuid) -> StoreResult<Option<ProjectPermission>>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn list_attribute_keys(&self, environment_id: Uuid) -> StoreResult<Vec<ContactAttributeKey>>;
    /// Plain insert. A concurrent creator of the same key makes this fail with `UniqueViolation`.
    async fn create_attribute_keys(&self, keys: &[ContactAttributeKey]) -> StoreResult<()>;
    async fn find_contacts_by_attribute(
        &self,
        environment_id: Uuid,
        key: &str,
        values: &[String],
    ) -> StoreResult<Vec<Contact>>;
    /// Apply all writes atomically and return the touched contacts in write order
    async fn apply_contact_writes(&self, environment_id: Uuid, writes: &[ContactWrite]) -> StoreResult<Vec<Contact>>;
    async fn get_contact(&self, id: Uuid) -> StoreResult<Option<Contact>>;
    async fn list_contacts(&self, environment_id: Uuid, offset: i64, limit: i64) -> StoreResult<Vec<Contact>>;
    async fn delete_contact(&self, id: Uuid) -> StoreResult<bool>;
    async fn find_contacts_matching(&self, environment_id: Uuid, expr: &FilterExpr) -> StoreResult<Vec<Contact>>;
}

#[async_trait]
pub trait SegmentStore: Send + Sync {
    async fn create_segment(&self, segment: &Segment) -> StoreResult<()>;
    async fn get_segment(&self, id: Uuid) -> StoreResult<Option<Segment>>;
    /// Private segments included
    async fn list_segments(&self, environment_id: Uuid) -> StoreResult<Vec<Segment>>;
    async fn update_segment(&self, segment: &Segment) -> StoreResult<()>;
    async fn delete_segment(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// Creates `private_segment` first when given, in the same transaction
    async fn create_survey(&self, survey: &Survey, private_segment: Option<&Segment>) -> StoreResult<()>;
    async fn get_survey(&self, id: Uuid) -> StoreResult<Option<Survey>>;
    async fn list_surveys(&self, environment_id: Uuid) -> StoreResult<Vec<Survey>>;
    async fn count_surveys_using_segment(&self, segment_id: Uuid) -> StoreResult<i64>;
}

#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// One row per (environment, type). An existing row gets the new credential and keeps its `data`.
    async fn upsert_integration(&self, integration: &Integration) -> StoreResult<Integration>;
    async fn set_integration_data(
        &self,
        environment_id: Uuid,
        kind: IntegrationType,
        data: &serde_json::Value,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Integration>>;
    async fn get_integration_by_type(&self, environment_id: Uuid, kind: IntegrationType) -> StoreResult<Option<Integration>>;
    async fn list_integrations(&self, environment_id: Uuid) -> StoreResult<Vec<Integration>>;
    async fn delete_integration(&self, environment_id: Uuid, kind: IntegrationType) -> StoreResult<bool>;
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn create_api_key(&self, api_key: &ApiKey) -> StoreResult<()>;
    async fn get_api_key(&self, id: Uuid) -> StoreResult<Option<ApiKey>>;
    async fn list_api_keys(&self, organization_id: Uuid) -> StoreResult<Vec<ApiKey>>;
    async fn find_api_key_by_hash(&self, hashed_key: &str) -> StoreResult<Option<ApiKey>>;
    async fn touch_api_key(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
    async fn delete_api_key(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Cheap round trip to the backend
    async fn health_check(&self) -> StoreResult<()>;
}

/// Everything a service may need. Implemented automatically for any type implementing every port.
pub trait Store:
    OrganizationStore
    + TeamStore
    + ContactStore
    + SegmentStore
    + SurveyStore
    + IntegrationStore
    + ApiKeyStore
    + StoreHealth
{
}

impl<T> Store for T where
    T: OrganizationStore
        + TeamStore
        + ContactStore
        + SegmentStore
        + SurveyStore
        + IntegrationStore
        + ApiKeyStore
        + StoreHealth
{
}
