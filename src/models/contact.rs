use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Attribute key carrying the identity used for CSV matching
pub const EMAIL_ATTRIBUTE: &str = "email";
pub const USER_ID_ATTRIBUTE: &str = "userId";

/// Keys every environment starts with
pub const DEFAULT_ATTRIBUTE_KEYS: [&str; 4] = [EMAIL_ATTRIBUTE, USER_ID_ATTRIBUTE, "firstName", "lastName"];

pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub environment_id: Uuid,
    pub attributes: Attributes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKeyType {
    Default,
    Custom,
}

impl AttributeKeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKeyType::Default => "default",
            AttributeKeyType::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "default" => Some(AttributeKeyType::Default),
            "custom" => Some(AttributeKeyType::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactAttributeKey {
    pub id: Uuid,
    pub environment_id: Uuid,
    pub key: String,
    pub is_unique: bool,
    #[serde(rename = "type")]
    pub kind: AttributeKeyType,
    pub created_at: DateTime<Utc>,
}

/// One storage write computed by the import merge. Applied atomically as a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactWrite {
    Create {
        attributes: Attributes,
    },
    Update {
        contact_id: Uuid,
        /// Keys whose stored value is removed before `upserts` are written
        deletes: Vec<String>,
        upserts: Attributes,
    },
}

impl ContactWrite {
    pub fn is_noop(&self) -> bool {
        matches!(self, ContactWrite::Update { deletes, upserts, .. } if deletes.is_empty() && upserts.is_empty())
    }
}
