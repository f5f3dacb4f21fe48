use std::sync::Arc;

use crate::actions::ActionRegistry;
use crate::cache::CacheService;
use crate::config::AppConfig;
use crate::crypto::{CryptoError, SymmetricKey};
use crate::database::Store;
use crate::services::{
    ApiKeyService, ContactService, IntegrationService, OrganizationService, PersonalLinkService, SegmentService,
    SurveyService, TeamService,
};

/// Shared handles every request works with. Cloned into each handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: CacheService,
    pub config: Arc<AppConfig>,
    pub key: SymmetricKey,
    pub actions: Arc<ActionRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Result<Self, CryptoError> {
        let key = SymmetricKey::from_hex(&config.security.encryption_key)?;
        let cache = CacheService::new(config.cache.max_capacity, config.cache.ttl_secs);
        Ok(Self {
            store,
            cache,
            config: Arc::new(config),
            key,
            actions: Arc::new(ActionRegistry::with_defaults()),
        })
    }

    pub fn organizations(&self) -> OrganizationService {
        OrganizationService::new(self.store.clone(), self.cache.clone())
    }

    pub fn teams(&self) -> TeamService {
        TeamService::new(self.store.clone(), self.cache.clone())
    }

    pub fn contacts(&self) -> ContactService {
        ContactService::new(self.store.clone(), self.config.import.max_rows)
    }

    pub fn segments(&self) -> SegmentService {
        SegmentService::new(self.store.clone(), self.cache.clone())
    }

    pub fn surveys(&self) -> SurveyService {
        SurveyService::new(self.store.clone(), self.cache.clone())
    }

    pub fn integrations(&self) -> IntegrationService {
        IntegrationService::new(self.store.clone(), self.key.clone())
    }

    pub fn api_keys(&self) -> ApiKeyService {
        ApiKeyService::new(self.store.clone())
    }

    /// Link tokens are signed with the server encryption key
    pub fn personal_links(&self) -> PersonalLinkService {
        PersonalLinkService::new(
            self.store.clone(),
            self.config.security.encryption_key.clone(),
            self.config.api.public_url.clone(),
        )
    }
}
