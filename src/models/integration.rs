use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationType {
    Slack,
    Plain,
}

impl IntegrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationType::Slack => "slack",
            IntegrationType::Plain => "plain",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "slack" => Some(IntegrationType::Slack),
            "plain" => Some(IntegrationType::Plain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfig {
    /// Encrypted provider credential, never returned to clients
    #[serde(skip_serializing)]
    pub key: String,
    /// Account the credential was issued for, when the provider reports one
    pub user_email: Option<String>,
    /// Provider specific payload, e.g. Slack channel to survey mappings
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    pub id: Uuid,
    pub environment_id: Uuid,
    #[serde(rename = "type")]
    pub kind: IntegrationType,
    pub config: IntegrationConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
