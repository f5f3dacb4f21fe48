use serde::{Deserialize, Serialize};

/// Top level of a segment definition: filters joined left to right by connectors
pub type BaseFilters = Vec<BaseFilter>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseFilter {
    #[serde(default)]
    pub id: String,
    /// Always `None` on the first filter of a group
    pub connector: Option<Connector>,
    pub resource: FilterResource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterResource {
    Group(Vec<BaseFilter>),
    Filter(SegmentFilter),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentFilter {
    #[serde(default)]
    pub id: String,
    pub root: FilterRoot,
    #[serde(default)]
    pub value: FilterValue,
    pub qualifier: Qualifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FilterRoot {
    #[serde(rename_all = "camelCase")]
    Attribute { contact_attribute_key: String },
    #[serde(rename_all = "camelCase")]
    Person { person_identifier: String },
    #[serde(rename_all = "camelCase")]
    Segment { segment_id: uuid::Uuid },
    #[serde(rename_all = "camelCase")]
    Device { device_type: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qualifier {
    pub operator: FilterOperator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    IsSet,
    IsNotSet,
    Contains,
    DoesNotContain,
    StartsWith,
    EndsWith,
    UserIsIn,
    UserIsNotIn,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "notEquals",
            FilterOperator::LessThan => "lessThan",
            FilterOperator::LessEqual => "lessEqual",
            FilterOperator::GreaterThan => "greaterThan",
            FilterOperator::GreaterEqual => "greaterEqual",
            FilterOperator::IsSet => "isSet",
            FilterOperator::IsNotSet => "isNotSet",
            FilterOperator::Contains => "contains",
            FilterOperator::DoesNotContain => "doesNotContain",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::UserIsIn => "userIsIn",
            FilterOperator::UserIsNotIn => "userIsNotIn",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FilterOperator::LessThan | FilterOperator::LessEqual | FilterOperator::GreaterThan | FilterOperator::GreaterEqual
        )
    }

    pub fn is_segment_membership(&self) -> bool {
        matches!(self, FilterOperator::UserIsIn | FilterOperator::UserIsNotIn)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Text(String),
}

impl Default for FilterValue {
    fn default() -> Self {
        FilterValue::Text(String::new())
    }
}

impl FilterValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FilterValue::Number(n) => Some(*n),
            FilterValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            FilterValue::Number(n) => n.to_string(),
            FilterValue::Text(s) => s.clone(),
        }
    }
}
