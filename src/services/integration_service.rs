use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::crypto::SymmetricKey;
use crate::database::{IntegrationStore, Store};
use crate::models::{Integration, IntegrationConfig, IntegrationType};

#[derive(Clone)]
pub struct IntegrationService {
    store: Arc<dyn Store>,
    key: SymmetricKey,
}

impl IntegrationService {
    pub fn new(store: Arc<dyn Store>, key: SymmetricKey) -> Self {
        Self { store, key }
    }

    /// Store the provider credential encrypted. Reconnecting keeps the stored `data`, which the
    /// store resolves inside the upsert itself.
    pub async fn connect_integration(
        &self,
        environment_id: Uuid,
        kind: IntegrationType,
        credential: &str,
        user_email: Option<String>,
    ) -> ServiceResult<Integration> {
        let sealed = self.key.encrypt(credential)?;

        let now = Utc::now();
        let integration = Integration {
            id: Uuid::new_v4(),
            environment_id,
            kind,
            config: IntegrationConfig {
                key: sealed,
                user_email,
                data: json!([]),
            },
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.upsert_integration(&integration).await?;
        tracing::info!(
            "{} {} integration for environment {}",
            if stored.id == integration.id { "Connected" } else { "Reconnected" },
            kind.as_str(),
            environment_id
        );
        Ok(stored)
    }

    pub async fn disconnect_integration(&self, environment_id: Uuid, kind: IntegrationType) -> ServiceResult<()> {
        if !self.store.delete_integration(environment_id, kind).await? {
            return Err(ServiceError::not_found("integration", kind.as_str()));
        }
        tracing::info!("Disconnected {} integration for environment {}", kind.as_str(), environment_id);
        Ok(())
    }

    /// Credentials stay encrypted and are not serialized
    pub async fn get_integrations(&self, environment_id: Uuid) -> ServiceResult<Vec<Integration>> {
        Ok(self.store.list_integrations(environment_id).await?)
    }

    pub async fn get_integration(&self, environment_id: Uuid, kind: IntegrationType) -> ServiceResult<Integration> {
        self.store
            .get_integration_by_type(environment_id, kind)
            .await?
            .ok_or_else(|| ServiceError::not_found("integration", kind.as_str()))
    }

    /// Replace the provider payload, e.g. Slack channel to survey mappings
    pub async fn update_integration_data(
        &self,
        environment_id: Uuid,
        kind: IntegrationType,
        data: Value,
    ) -> ServiceResult<Integration> {
        self.store
            .set_integration_data(environment_id, kind, &data, Utc::now())
            .await?
            .ok_or_else(|| ServiceError::not_found("integration", kind.as_str()))
    }

    /// Plaintext credential for calling the provider
    pub async fn decrypt_credential(&self, environment_id: Uuid, kind: IntegrationType) -> ServiceResult<String> {
        let integration = self.get_integration(environment_id, kind).await?;
        Ok(self.key.decrypt(&integration.config.key)?)
    }
}
