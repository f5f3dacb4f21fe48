// In-memory backend with the same constraint behavior as the Postgres schema.
// Used by the test suites and by the server when no `DATABASE_URL` is configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::store::*;
use crate::authz::{ProjectPermission, TeamRole};
use crate::filter::{matcher, FilterExpr};
use crate::models::{
    ApiKey, Contact, ContactAttributeKey, ContactWrite, Environment, EnvironmentScope, Integration, IntegrationType,
    Membership, Organization, Project, ProjectTeam, Segment, Survey, Team, TeamUser,
};

#[derive(Default)]
struct MemoryData {
    organizations: HashMap<Uuid, Organization>,
    memberships: HashMap<(Uuid, Uuid), Membership>,
    projects: HashMap<Uuid, Project>,
    environments: HashMap<Uuid, Environment>,
    teams: HashMap<Uuid, Team>,
    team_users: HashMap<(Uuid, Uuid), TeamUser>,
    project_teams: HashMap<(Uuid, Uuid), ProjectTeam>,
    attribute_keys: HashMap<Uuid, ContactAttributeKey>,
    contacts: HashMap<Uuid, Contact>,
    segments: HashMap<Uuid, Segment>,
    surveys: HashMap<Uuid, Survey>,
    integrations: HashMap<Uuid, Integration>,
    api_keys: HashMap<Uuid, ApiKey>,
}

impl MemoryData {
    fn attribute_key_exists(&self, environment_id: Uuid, key: &str) -> bool {
        self.attribute_keys
            .values()
            .any(|k| k.environment_id == environment_id && k.key == key)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<MemoryData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_created<T, F>(mut items: Vec<T>, created: F) -> Vec<T>
where
    F: Fn(&T) -> (DateTime<Utc>, Uuid),
{
    items.sort_by_key(|item| created(item));
    items
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl OrganizationStore for MemoryStore {
    async fn create_organization(&self, organization: &Organization, owner: &Membership) -> StoreResult<()> {
        let mut data = self.data.write().await;
        if data.organizations.contains_key(&organization.id) {
            return Err(DatabaseError::UniqueViolation(format!("organization {}", organization.id)));
        }
        data.organizations.insert(organization.id, organization.clone());
        data.memberships
            .insert((owner.organization_id, owner.user_id), owner.clone());
        Ok(())
    }

    async fn get_organization(&self, id: Uuid) -> StoreResult<Option<Organization>> {
        Ok(self.data.read().await.organizations.get(&id).cloned())
    }

    async fn upsert_membership(&self, membership: &Membership) -> StoreResult<()> {
        let mut data = self.data.write().await;
        if !data.organizations.contains_key(&membership.organization_id) {
            return Err(DatabaseError::ForeignKeyViolation(format!(
                "organization {}",
                membership.organization_id
            )));
        }
        data.memberships
            .insert((membership.organization_id, membership.user_id), membership.clone());
        Ok(())
    }

    async fn get_membership(&self, organization_id: Uuid, user_id: Uuid) -> StoreResult<Option<Membership>> {
        Ok(self.data.read().await.memberships.get(&(organization_id, user_id)).cloned())
    }

    async fn create_project(&self, project: &Project, environments: &[Environment]) -> StoreResult<()> {
        let mut data = self.data.write().await;
        if !data.organizations.contains_key(&project.organization_id) {
            return Err(DatabaseError::ForeignKeyViolation(format!(
                "organization {}",
                project.organization_id
            )));
        }
        data.projects.insert(project.id, project.clone());
        for environment in environments {
            data.environments.insert(environment.id, environment.clone());
        }
        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        Ok(self.data.read().await.projects.get(&id).cloned())
    }

    async fn get_environment(&self, id: Uuid) -> StoreResult<Option<Environment>> {
        Ok(self.data.read().await.environments.get(&id).cloned())
    }

    async fn get_environment_scope(&self, environment_id: Uuid) -> StoreResult<Option<EnvironmentScope>> {
        let data = self.data.read().await;
        let Some(environment) = data.environments.get(&environment_id) else {
            return Ok(None);
        };
        Ok(data.projects.get(&environment.project_id).map(|project| EnvironmentScope {
            environment_id,
            project_id: project.id,
            organization_id: project.organization_id,
        }))
    }
}

#[async_trait]
impl TeamStore for MemoryStore {
    async fn create_team(&self, team: &Team) -> StoreResult<()> {
        let mut data = self.data.write().await;
        let duplicate = data
            .teams
            .values()
            .any(|t| t.organization_id == team.organization_id && t.name == team.name);
        if duplicate {
            return Err(DatabaseError::UniqueViolation(format!("team name {}", team.name)));
        }
        data.teams.insert(team.id, team.clone());
        Ok(())
    }

    async fn get_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        Ok(self.data.read().await.teams.get(&id).cloned())
    }

    async fn find_team_by_name(&self, organization_id: Uuid, name: &str) -> StoreResult<Option<Team>> {
        Ok(self
            .data
            .read()
            .await
            .teams
            .values()
            .find(|t| t.organization_id == organization_id && t.name == name)
            .cloned())
    }

    async fn list_teams(&self, organization_id: Uuid) -> StoreResult<Vec<Team>> {
        let data = self.data.read().await;
        let teams = data
            .teams
            .values()
            .filter(|t| t.organization_id == organization_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(teams, |t: &Team| (t.created_at, t.id)))
    }

    async fn rename_team(&self, id: Uuid, name: &str) -> StoreResult<()> {
        let mut data = self.data.write().await;
        let organization_id = data
            .teams
            .get(&id)
            .map(|t| t.organization_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("team {}", id)))?;
        let duplicate = data
            .teams
            .values()
            .any(|t| t.id != id && t.organization_id == organization_id && t.name == name);
        if duplicate {
            return Err(DatabaseError::UniqueViolation(format!("team name {}", name)));
        }
        if let Some(team) = data.teams.get_mut(&id) {
            team.name = name.to_string();
        }
        Ok(())
    }

    async fn delete_team(&self, id: Uuid) -> StoreResult<bool> {
        let mut data = self.data.write().await;
        let removed = data.teams.remove(&id).is_some();
        data.team_users.retain(|(team_id, _), _| *team_id != id);
        data.project_teams.retain(|(_, team_id), _| *team_id != id);
        Ok(removed)
    }

    async fn add_team_users(&self, team_users: &[TeamUser]) -> StoreResult<()> {
        let mut data = self.data.write().await;
        let mut keys = HashSet::with_capacity(team_users.len());
        for team_user in team_users {
            if !data.teams.contains_key(&team_user.team_id) {
                return Err(DatabaseError::ForeignKeyViolation(format!("team {}", team_user.team_id)));
            }
            let key = (team_user.team_id, team_user.user_id);
            if data.team_users.contains_key(&key) || !keys.insert(key) {
                return Err(DatabaseError::UniqueViolation(format!(
                    "user {} already on team {}",
                    team_user.user_id, team_user.team_id
                )));
            }
        }
        for team_user in team_users {
            data.team_users
                .insert((team_user.team_id, team_user.user_id), team_user.clone());
        }
        Ok(())
    }

    async fn remove_team_user(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.data.write().await.team_users.remove(&(team_id, user_id)).is_some())
    }

    async fn list_team_users(&self, team_id: Uuid) -> StoreResult<Vec<TeamUser>> {
        let data = self.data.read().await;
        let mut users: Vec<TeamUser> = data
            .team_users
            .values()
            .filter(|u| u.team_id == team_id)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.user_id);
        Ok(users)
    }

    async fn get_team_role(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<TeamRole>> {
        Ok(self
            .data
            .read()
            .await
            .team_users
            .get(&(team_id, user_id))
            .map(|u| u.role))
    }

    async fn set_team_projects(&self, team_id: Uuid, projects: &[ProjectTeam]) -> StoreResult<()> {
        let mut data = self.data.write().await;
        if let Some(missing) = projects.iter().find(|p| !data.projects.contains_key(&p.project_id)) {
            return Err(DatabaseError::ForeignKeyViolation(format!("project {}", missing.project_id)));
        }
        data.project_teams.retain(|(_, t), _| *t != team_id);
        for grant in projects {
            data.project_teams.insert((grant.project_id, team_id), grant.clone());
        }
        Ok(())
    }

    async fn list_team_projects(&self, team_id: Uuid) -> StoreResult<Vec<ProjectTeam>> {
        let data = self.data.read().await;
        let mut grants: Vec<ProjectTeam> = data
            .project_teams
            .values()
            .filter(|p| p.team_id == team_id)
            .cloned()
            .collect();
        grants.sort_by_key(|p| p.project_id);
        Ok(grants)
    }

    async fn get_project_permission(&self, user_id: Uuid, project_id: Uuid) -> StoreResult<Option<ProjectPermission>> {
        let data = self.data.read().await;
        Ok(data
            .project_teams
            .values()
            .filter(|grant| grant.project_id == project_id)
            .filter(|grant| data.team_users.contains_key(&(grant.team_id, user_id)))
            .map(|grant| grant.permission)
            .max())
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn list_attribute_keys(&self, environment_id: Uuid) -> StoreResult<Vec<ContactAttributeKey>> {
        let data = self.data.read().await;
        let keys = data
            .attribute_keys
            .values()
            .filter(|k| k.environment_id == environment_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(keys, |k: &ContactAttributeKey| (k.created_at, k.id)))
    }

    async fn create_attribute_keys(&self, keys: &[ContactAttributeKey]) -> StoreResult<()> {
        let mut data = self.data.write().await;
        for (index, key) in keys.iter().enumerate() {
            let repeated = keys[..index]
                .iter()
                .any(|k| k.environment_id == key.environment_id && k.key == key.key);
            if repeated || data.attribute_key_exists(key.environment_id, &key.key) {
                return Err(DatabaseError::UniqueViolation(format!("attribute key {}", key.key)));
            }
        }
        for key in keys {
            data.attribute_keys.insert(key.id, key.clone());
        }
        Ok(())
    }

    async fn find_contacts_by_attribute(
        &self,
        environment_id: Uuid,
        key: &str,
        values: &[String],
    ) -> StoreResult<Vec<Contact>> {
        let data = self.data.read().await;
        let contacts = data
            .contacts
            .values()
            .filter(|c| c.environment_id == environment_id)
            .filter(|c| c.attributes.get(key).map(|v| values.contains(v)).unwrap_or(false))
            .cloned()
            .collect();
        Ok(sorted_by_created(contacts, |c: &Contact| (c.created_at, c.id)))
    }

    async fn apply_contact_writes(&self, environment_id: Uuid, writes: &[ContactWrite]) -> StoreResult<Vec<Contact>> {
        let mut data = self.data.write().await;

        // Check every constraint before touching anything so a failure leaves no partial import
        for write in writes {
            let attributes = match write {
                ContactWrite::Create { attributes } => attributes,
                ContactWrite::Update { contact_id, upserts, .. } => {
                    match data.contacts.get(contact_id) {
                        Some(c) if c.environment_id == environment_id => {}
                        _ => return Err(DatabaseError::NotFound(format!("contact {}", contact_id))),
                    }
                    upserts
                }
            };
            if let Some(unknown) = attributes.keys().find(|k| !data.attribute_key_exists(environment_id, k)) {
                return Err(DatabaseError::ForeignKeyViolation(format!("attribute key {}", unknown)));
            }
        }

        let now = Utc::now();
        let mut touched = Vec::with_capacity(writes.len());
        for write in writes {
            match write {
                ContactWrite::Create { attributes } => {
                    let contact = Contact {
                        id: Uuid::new_v4(),
                        environment_id,
                        attributes: attributes.clone(),
                        created_at: now,
                        updated_at: now,
                    };
                    data.contacts.insert(contact.id, contact.clone());
                    touched.push(contact);
                }
                ContactWrite::Update { contact_id, deletes, upserts } => {
                    if let Some(contact) = data.contacts.get_mut(contact_id) {
                        if !write.is_noop() {
                            for key in deletes {
                                contact.attributes.remove(key);
                            }
                            for (key, value) in upserts {
                                contact.attributes.insert(key.clone(), value.clone());
                            }
                            contact.updated_at = now;
                        }
                        touched.push(contact.clone());
                    }
                }
            }
        }
        Ok(touched)
    }

    async fn get_contact(&self, id: Uuid) -> StoreResult<Option<Contact>> {
        Ok(self.data.read().await.contacts.get(&id).cloned())
    }

    async fn list_contacts(&self, environment_id: Uuid, offset: i64, limit: i64) -> StoreResult<Vec<Contact>> {
        let data = self.data.read().await;
        let contacts = data
            .contacts
            .values()
            .filter(|c| c.environment_id == environment_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(contacts, |c: &Contact| (c.created_at, c.id))
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn delete_contact(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.data.write().await.contacts.remove(&id).is_some())
    }

    async fn find_contacts_matching(&self, environment_id: Uuid, expr: &FilterExpr) -> StoreResult<Vec<Contact>> {
        let data = self.data.read().await;
        let contacts = data
            .contacts
            .values()
            .filter(|c| c.environment_id == environment_id)
            .filter(|c| matcher::matches(expr, &c.attributes))
            .cloned()
            .collect();
        Ok(sorted_by_created(contacts, |c: &Contact| (c.created_at, c.id)))
    }
}

#[async_trait]
impl SegmentStore for MemoryStore {
    async fn create_segment(&self, segment: &Segment) -> StoreResult<()> {
        let mut data = self.data.write().await;
        let duplicate = data
            .segments
            .values()
            .any(|s| s.environment_id == segment.environment_id && s.title == segment.title);
        if duplicate {
            return Err(DatabaseError::UniqueViolation(format!("segment title {}", segment.title)));
        }
        data.segments.insert(segment.id, segment.clone());
        Ok(())
    }

    async fn get_segment(&self, id: Uuid) -> StoreResult<Option<Segment>> {
        Ok(self.data.read().await.segments.get(&id).cloned())
    }

    async fn list_segments(&self, environment_id: Uuid) -> StoreResult<Vec<Segment>> {
        let data = self.data.read().await;
        let segments = data
            .segments
            .values()
            .filter(|s| s.environment_id == environment_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(segments, |s: &Segment| (s.created_at, s.id)))
    }

    async fn update_segment(&self, segment: &Segment) -> StoreResult<()> {
        let mut data = self.data.write().await;
        if !data.segments.contains_key(&segment.id) {
            return Err(DatabaseError::NotFound(format!("segment {}", segment.id)));
        }
        let duplicate = data.segments.values().any(|s| {
            s.id != segment.id && s.environment_id == segment.environment_id && s.title == segment.title
        });
        if duplicate {
            return Err(DatabaseError::UniqueViolation(format!("segment title {}", segment.title)));
        }
        data.segments.insert(segment.id, segment.clone());
        Ok(())
    }

    async fn delete_segment(&self, id: Uuid) -> StoreResult<bool> {
        let mut data = self.data.write().await;
        if data.surveys.values().any(|s| s.segment_id == Some(id)) {
            return Err(DatabaseError::ForeignKeyViolation(format!("segment {} is used by a survey", id)));
        }
        Ok(data.segments.remove(&id).is_some())
    }
}

#[async_trait]
impl SurveyStore for MemoryStore {
    async fn create_survey(&self, survey: &Survey, private_segment: Option<&Segment>) -> StoreResult<()> {
        let mut data = self.data.write().await;
        if !data.environments.contains_key(&survey.environment_id) {
            return Err(DatabaseError::ForeignKeyViolation(format!(
                "environment {}",
                survey.environment_id
            )));
        }
        if let Some(segment) = private_segment {
            data.segments.insert(segment.id, segment.clone());
        }
        if let Some(segment_id) = survey.segment_id {
            if !data.segments.contains_key(&segment_id) {
                return Err(DatabaseError::ForeignKeyViolation(format!("segment {}", segment_id)));
            }
        }
        data.surveys.insert(survey.id, survey.clone());
        Ok(())
    }

    async fn get_survey(&self, id: Uuid) -> StoreResult<Option<Survey>> {
        Ok(self.data.read().await.surveys.get(&id).cloned())
    }

    async fn list_surveys(&self, environment_id: Uuid) -> StoreResult<Vec<Survey>> {
        let data = self.data.read().await;
        let surveys = data
            .surveys
            .values()
            .filter(|s| s.environment_id == environment_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(surveys, |s: &Survey| (s.created_at, s.id)))
    }

    async fn count_surveys_using_segment(&self, segment_id: Uuid) -> StoreResult<i64> {
        let data = self.data.read().await;
        Ok(data.surveys.values().filter(|s| s.segment_id == Some(segment_id)).count() as i64)
    }
}

#[async_trait]
impl IntegrationStore for MemoryStore {
    async fn upsert_integration(&self, integration: &Integration) -> StoreResult<Integration> {
        let mut data = self.data.write().await;
        let existing = data
            .integrations
            .values()
            .find(|i| i.environment_id == integration.environment_id && i.kind == integration.kind)
            .map(|i| (i.id, i.created_at, i.config.data.clone()));

        let mut stored = integration.clone();
        if let Some((id, created_at, kept)) = existing {
            stored.id = id;
            stored.created_at = created_at;
            stored.config.data = kept;
        }
        data.integrations.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn set_integration_data(
        &self,
        environment_id: Uuid,
        kind: IntegrationType,
        payload: &serde_json::Value,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Integration>> {
        let mut data = self.data.write().await;
        let Some(integration) = data
            .integrations
            .values_mut()
            .find(|i| i.environment_id == environment_id && i.kind == kind)
        else {
            return Ok(None);
        };
        integration.config.data = payload.clone();
        integration.updated_at = updated_at;
        Ok(Some(integration.clone()))
    }

    async fn get_integration_by_type(&self, environment_id: Uuid, kind: IntegrationType) -> StoreResult<Option<Integration>> {
        Ok(self
            .data
            .read()
            .await
            .integrations
            .values()
            .find(|i| i.environment_id == environment_id && i.kind == kind)
            .cloned())
    }

    async fn list_integrations(&self, environment_id: Uuid) -> StoreResult<Vec<Integration>> {
        let data = self.data.read().await;
        let integrations = data
            .integrations
            .values()
            .filter(|i| i.environment_id == environment_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(integrations, |i: &Integration| (i.created_at, i.id)))
    }

    async fn delete_integration(&self, environment_id: Uuid, kind: IntegrationType) -> StoreResult<bool> {
        let mut data = self.data.write().await;
        let before = data.integrations.len();
        data.integrations
            .retain(|_, i| !(i.environment_id == environment_id && i.kind == kind));
        Ok(data.integrations.len() < before)
    }
}

#[async_trait]
impl ApiKeyStore for MemoryStore {
    async fn create_api_key(&self, api_key: &ApiKey) -> StoreResult<()> {
        let mut data = self.data.write().await;
        if data.api_keys.values().any(|k| k.hashed_key == api_key.hashed_key) {
            return Err(DatabaseError::UniqueViolation("api key hash".to_string()));
        }
        data.api_keys.insert(api_key.id, api_key.clone());
        Ok(())
    }

    async fn get_api_key(&self, id: Uuid) -> StoreResult<Option<ApiKey>> {
        Ok(self.data.read().await.api_keys.get(&id).cloned())
    }

    async fn list_api_keys(&self, organization_id: Uuid) -> StoreResult<Vec<ApiKey>> {
        let data = self.data.read().await;
        let keys = data
            .api_keys
            .values()
            .filter(|k| k.organization_id == organization_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(keys, |k: &ApiKey| (k.created_at, k.id)))
    }

    async fn find_api_key_by_hash(&self, hashed_key: &str) -> StoreResult<Option<ApiKey>> {
        Ok(self
            .data
            .read()
            .await
            .api_keys
            .values()
            .find(|k| k.hashed_key == hashed_key)
            .cloned())
    }

    async fn touch_api_key(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(key) = self.data.write().await.api_keys.get_mut(&id) {
            key.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn delete_api_key(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.data.write().await.api_keys.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttributeKeyType;

    fn attribute_key(environment_id: Uuid, key: &str) -> ContactAttributeKey {
        ContactAttributeKey {
            id: Uuid::new_v4(),
            environment_id,
            key: key.to_string(),
            is_unique: false,
            kind: AttributeKeyType::Custom,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_attribute_keys_are_rejected() {
        let store = MemoryStore::new();
        let env = Uuid::new_v4();
        store.create_attribute_keys(&[attribute_key(env, "plan")]).await.unwrap();

        let err = store.create_attribute_keys(&[attribute_key(env, "plan")]).await.unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation(_)));

        // Same key in another environment is fine
        store.create_attribute_keys(&[attribute_key(Uuid::new_v4(), "plan")]).await.unwrap();
    }

    #[tokio::test]
    async fn contact_writes_are_all_or_nothing() {
        let store = MemoryStore::new();
        let env = Uuid::new_v4();
        store.create_attribute_keys(&[attribute_key(env, "email")]).await.unwrap();

        let good = ContactWrite::Create {
            attributes: [("email".to_string(), "a@example.com".to_string())].into(),
        };
        let bad = ContactWrite::Create {
            attributes: [("unknown".to_string(), "x".to_string())].into(),
        };

        let err = store.apply_contact_writes(env, &[good.clone(), bad]).await.unwrap_err();
        assert!(matches!(err, DatabaseError::ForeignKeyViolation(_)));
        assert!(store.list_contacts(env, 0, 100).await.unwrap().is_empty());

        let created = store.apply_contact_writes(env, &[good]).await.unwrap();
        assert_eq!(created.len(), 1);
    }

    #[tokio::test]
    async fn integration_upsert_keeps_one_row_per_type_and_its_data() {
        let store = MemoryStore::new();
        let env = Uuid::new_v4();
        let make = |data: serde_json::Value| Integration {
            id: Uuid::new_v4(),
            environment_id: env,
            kind: IntegrationType::Plain,
            config: crate::models::IntegrationConfig {
                key: "k".to_string(),
                user_email: None,
                data,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let first = store.upsert_integration(&make(serde_json::json!([]))).await.unwrap();
        let mapping = serde_json::json!([{ "channelId": "C1" }]);
        store
            .set_integration_data(env, IntegrationType::Plain, &mapping, Utc::now())
            .await
            .unwrap();
        let second = store.upsert_integration(&make(serde_json::json!([1]))).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.config.data, mapping);
        assert_eq!(store.list_integrations(env).await.unwrap().len(), 1);
        assert!(store
            .set_integration_data(Uuid::new_v4(), IntegrationType::Plain, &mapping, Utc::now())
            .await
            .unwrap()
            .is_none());
    }
}
