use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::authz::OrganizationRole;
use crate::cache::{CacheScope, CacheService, CacheTag};
use crate::database::{OrganizationStore, Store};
use crate::models::{Environment, EnvironmentScope, EnvironmentType, Membership, Organization, Project};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectWithEnvironments {
    #[serde(flatten)]
    pub project: Project,
    pub environments: Vec<Environment>,
}

#[derive(Clone)]
pub struct OrganizationService {
    store: Arc<dyn Store>,
    cache: CacheService,
}

impl OrganizationService {
    pub fn new(store: Arc<dyn Store>, cache: CacheService) -> Self {
        Self { store, cache }
    }

    /// The creator becomes the owner
    pub async fn create_organization(&self, creator: Uuid, name: &str) -> ServiceResult<Organization> {
        let organization = Organization {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };
        let owner = Membership {
            user_id: creator,
            organization_id: organization.id,
            role: OrganizationRole::Owner,
        };
        self.store.create_organization(&organization, &owner).await?;
        tracing::info!("Created organization {} owned by {}", organization.id, creator);
        Ok(organization)
    }

    pub async fn get_organization(&self, id: Uuid) -> ServiceResult<Organization> {
        self.store
            .get_organization(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("organization", id))
    }

    pub async fn add_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        role: OrganizationRole,
    ) -> ServiceResult<Membership> {
        self.get_organization(organization_id).await?;
        let membership = Membership {
            user_id,
            organization_id,
            role,
        };
        self.store.upsert_membership(&membership).await?;
        Ok(membership)
    }

    /// New projects always get a production and a development environment
    pub async fn create_project(&self, organization_id: Uuid, name: &str) -> ServiceResult<ProjectWithEnvironments> {
        let project = Project {
            id: Uuid::new_v4(),
            organization_id,
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };
        let environments: Vec<Environment> = [EnvironmentType::Production, EnvironmentType::Development]
            .into_iter()
            .map(|kind| Environment {
                id: Uuid::new_v4(),
                project_id: project.id,
                kind,
            })
            .collect();

        self.store.create_project(&project, &environments).await?;
        tracing::info!("Created project {} in organization {}", project.id, organization_id);
        Ok(ProjectWithEnvironments { project, environments })
    }

    pub async fn get_project(&self, id: Uuid) -> ServiceResult<Project> {
        self.store
            .get_project(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("project", id))
    }

    /// Environment → project → organization, read through the cache
    pub async fn environment_scope(&self, environment_id: Uuid) -> ServiceResult<EnvironmentScope> {
        let key = format!("environment_scope:{}", environment_id);
        let tags = [CacheTag::new(CacheScope::Environment, environment_id)];
        let store = self.store.clone();

        self.cache
            .get_or_load(&key, &tags, || async move {
                store
                    .get_environment_scope(environment_id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("environment", environment_id))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn service() -> OrganizationService {
        OrganizationService::new(Arc::new(MemoryStore::new()), CacheService::default())
    }

    #[tokio::test]
    async fn creator_owns_the_organization() {
        let service = service();
        let user = Uuid::new_v4();
        let org = service.create_organization(user, " Acme ").await.unwrap();
        assert_eq!(org.name, "Acme");

        let membership = service.store.get_membership(org.id, user).await.unwrap().unwrap();
        assert_eq!(membership.role, OrganizationRole::Owner);
    }

    #[tokio::test]
    async fn projects_get_both_environments_and_resolve_scope() {
        let service = service();
        let org = service.create_organization(Uuid::new_v4(), "Acme").await.unwrap();
        let project = service.create_project(org.id, "Web").await.unwrap();
        assert_eq!(project.environments.len(), 2);

        let env = project.environments[0].id;
        let scope = service.environment_scope(env).await.unwrap();
        assert_eq!(scope.project_id, project.project.id);
        assert_eq!(scope.organization_id, org.id);
        assert!(service.cache.contains(&format!("environment_scope:{}", env)).await);
    }

    #[tokio::test]
    async fn unknown_environment_is_not_found() {
        let err = service().environment_scope(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { resource: "environment", .. }));
    }
}
