use std::collections::HashMap;

use super::ServiceError;

/// Input validation run before authorization and before any write
pub trait Validate {
    fn validate(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Collects per-field messages and turns them into one validation error
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: HashMap<String, String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        // First message per field wins
        self.errors.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn require(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn require_non_blank(&mut self, value: &str, field: &str) {
        self.require(!value.trim().is_empty(), field, "must not be empty");
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self, message: &str) -> Result<(), ServiceError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(ServiceError::Validation {
            message: message.to_string(),
            field_errors: Some(self.errors),
        })
    }
}
