use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{api_keys, contacts, integrations, organizations, pipeline, segments, surveys, teams, ServerAction};
use crate::middleware::AuthUser;
use crate::services::{ServiceError, ServiceResult};
use crate::state::AppState;

/// Type-erased action so differently typed actions can share one lookup table
#[async_trait]
pub trait DynAction: Send + Sync {
    fn name(&self) -> &'static str;
    async fn call(&self, state: &AppState, user: &AuthUser, body: Value) -> ServiceResult<Value>;
}

#[async_trait]
impl<A: ServerAction> DynAction for A {
    fn name(&self) -> &'static str {
        A::NAME
    }

    async fn call(&self, state: &AppState, user: &AuthUser, body: Value) -> ServiceResult<Value> {
        let output = pipeline::run_action(self, state, user, body).await?;
        serde_json::to_value(output).map_err(|e| ServiceError::Unknown(e.into()))
    }
}

#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<&'static str, Arc<dyn DynAction>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<A: ServerAction>(&mut self, action: A) -> &mut Self {
        self.actions.insert(A::NAME, Arc::new(action));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DynAction>> {
        self.actions.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.actions.keys().copied().collect()
    }

    /// Every action the API serves
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(organizations::CreateOrganization)
            .register(organizations::AddMembership)
            .register(organizations::CreateProject)
            .register(teams::CreateTeam)
            .register(teams::UpdateTeam)
            .register(teams::DeleteTeam)
            .register(teams::AddTeamMembers)
            .register(teams::RemoveTeamMember)
            .register(teams::GetTeams)
            .register(teams::GetTeamDetails)
            .register(contacts::ImportContacts)
            .register(contacts::GetContacts)
            .register(contacts::DeleteContact)
            .register(segments::CreateSegment)
            .register(segments::UpdateSegment)
            .register(segments::ResetSegmentFilters)
            .register(segments::CloneSegment)
            .register(segments::DeleteSegment)
            .register(segments::GetSegments)
            .register(surveys::CreateSurvey)
            .register(surveys::GetSurveys)
            .register(surveys::CopySurveyToOtherEnvironments)
            .register(surveys::GeneratePersonalLinks)
            .register(integrations::ConnectIntegration)
            .register(integrations::DisconnectIntegration)
            .register(integrations::GetIntegrations)
            .register(integrations::UpdateIntegrationData)
            .register(api_keys::CreateApiKey)
            .register(api_keys::DeleteApiKey)
            .register(api_keys::GetApiKeys);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_actions_are_registered_by_name() {
        let registry = ActionRegistry::with_defaults();
        for name in ["importContacts", "connectIntegration", "generatePersonalLinks", "copySurveyToOtherEnvironments"] {
            assert!(registry.get(name).is_some(), "missing {}", name);
        }
        assert!(registry.get("dropDatabase").is_none());
    }
}
