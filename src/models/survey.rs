use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SurveyStatus {
    Draft,
    Scheduled,
    InProgress,
    Paused,
    Completed,
}

impl SurveyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyStatus::Draft => "draft",
            SurveyStatus::Scheduled => "scheduled",
            SurveyStatus::InProgress => "inProgress",
            SurveyStatus::Paused => "paused",
            SurveyStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(SurveyStatus::Draft),
            "scheduled" => Some(SurveyStatus::Scheduled),
            "inProgress" => Some(SurveyStatus::InProgress),
            "paused" => Some(SurveyStatus::Paused),
            "completed" => Some(SurveyStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub id: Uuid,
    pub environment_id: Uuid,
    pub name: String,
    pub status: SurveyStatus,
    pub segment_id: Option<Uuid>,
    /// Questions, endings and styling. Opaque to the backend.
    pub definition: serde_json::Value,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
