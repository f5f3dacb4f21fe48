use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::authz::ProjectPermission;
use crate::crypto::{random_token, sha256_hex};
use crate::database::{ApiKeyStore, OrganizationStore, Store};
use crate::models::{ApiKey, ApiKeyEnvironmentPermission, ApiKeyWithSecret};

pub const API_KEY_PREFIX: &str = "fbk_";
const API_KEY_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentPermissionInput {
    pub environment_id: Uuid,
    pub permission: ProjectPermission,
}

#[derive(Clone)]
pub struct ApiKeyService {
    store: Arc<dyn Store>,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The plaintext key is only ever part of this return value
    pub async fn create_api_key(
        &self,
        organization_id: Uuid,
        created_by: Uuid,
        label: &str,
        permissions: &[EnvironmentPermissionInput],
    ) -> ServiceResult<ApiKeyWithSecret> {
        let mut environment_permissions = Vec::with_capacity(permissions.len());
        for grant in permissions {
            let in_org = self
                .store
                .get_environment_scope(grant.environment_id)
                .await?
                .map(|scope| scope.organization_id == organization_id)
                .unwrap_or(false);
            if !in_org {
                return Err(ServiceError::field(
                    "environmentPermissions",
                    format!("Environment {} is not part of this organization", grant.environment_id),
                ));
            }
            if environment_permissions
                .iter()
                .any(|p: &ApiKeyEnvironmentPermission| p.environment_id == grant.environment_id)
            {
                return Err(ServiceError::field(
                    "environmentPermissions",
                    format!("Environment {} is listed twice", grant.environment_id),
                ));
            }
            environment_permissions.push(ApiKeyEnvironmentPermission {
                environment_id: grant.environment_id,
                permission: grant.permission,
            });
        }

        let actual_key = format!("{}{}", API_KEY_PREFIX, random_token(API_KEY_BYTES));
        let api_key = ApiKey {
            id: Uuid::new_v4(),
            organization_id,
            label: label.trim().to_string(),
            hashed_key: sha256_hex(&actual_key),
            created_by,
            environment_permissions,
            last_used_at: None,
            created_at: Utc::now(),
        };
        self.store.create_api_key(&api_key).await?;
        tracing::info!("Created API key {} for organization {}", api_key.id, organization_id);

        Ok(ApiKeyWithSecret { api_key, actual_key })
    }

    pub async fn list_api_keys(&self, organization_id: Uuid) -> ServiceResult<Vec<ApiKey>> {
        Ok(self.store.list_api_keys(organization_id).await?)
    }

    pub async fn delete_api_key(&self, organization_id: Uuid, api_key_id: Uuid) -> ServiceResult<ApiKey> {
        let api_key = self
            .store
            .get_api_key(api_key_id)
            .await?
            .filter(|k| k.organization_id == organization_id)
            .ok_or_else(|| ServiceError::not_found("api key", api_key_id))?;
        self.store.delete_api_key(api_key_id).await?;
        tracing::info!("Deleted API key {}", api_key_id);
        Ok(api_key)
    }

    /// Resolve a presented plaintext key and record its use
    pub async fn authenticate_api_key(&self, plaintext: &str) -> ServiceResult<ApiKey> {
        if !plaintext.starts_with(API_KEY_PREFIX) {
            return Err(ServiceError::authorization("Invalid API key"));
        }
        let mut api_key = self
            .store
            .find_api_key_by_hash(&sha256_hex(plaintext))
            .await?
            .ok_or_else(|| ServiceError::authorization("Invalid API key"))?;

        let now = Utc::now();
        self.store.touch_api_key(api_key.id, now).await?;
        api_key.last_used_at = Some(now);
        Ok(api_key)
    }
}
