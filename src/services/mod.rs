pub mod api_key_service;
pub mod contact_import;
pub mod contact_service;
pub mod integration_service;
pub mod organization_service;
pub mod personal_links;
pub mod segment_service;
pub mod survey_copy;
pub mod team_service;
pub mod validation;

use std::collections::HashMap;
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::database::DatabaseError;
use crate::filter::FilterError;

pub use api_key_service::ApiKeyService;
pub use contact_import::{merge_attributes, DuplicatePolicy, ImportRequest};
pub use contact_service::ContactService;
pub use integration_service::IntegrationService;
pub use organization_service::OrganizationService;
pub use personal_links::{PersonalLink, PersonalLinkService};
pub use segment_service::SegmentService;
pub use survey_copy::{CopyOutcome, CopySummary, CopyTarget, SurveyService};
pub use team_service::TeamService;
pub use validation::{FieldErrors, Validate};

/// Errors surfaced by domain services and the action pipeline
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    #[error("{0}")]
    Authorization(String),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut field_errors = HashMap::new();
        field_errors.insert(field.into(), message.clone());
        ServiceError::Validation {
            message,
            field_errors: Some(field_errors),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        ServiceError::Authorization(message.into())
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        ServiceError::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

impl From<CryptoError> for ServiceError {
    fn from(err: CryptoError) -> Self {
        ServiceError::Unknown(err.into())
    }
}

/// Segment definitions that do not compile are bad input
impl From<FilterError> for ServiceError {
    fn from(err: FilterError) -> Self {
        ServiceError::field("filters", err.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
