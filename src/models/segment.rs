use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filter::BaseFilters;

/// Named filter over the contacts of one environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: Uuid,
    pub environment_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Private segments belong to a single survey and are hidden from the segment list
    pub is_private: bool,
    pub filters: BaseFilters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
