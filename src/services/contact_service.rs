use std::sync::Arc;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::database::{ContactStore, Store};
use crate::models::Contact;

pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Contacts of an environment. CSV import lives in `contact_import`.
#[derive(Clone)]
pub struct ContactService {
    pub(super) store: Arc<dyn Store>,
    pub(super) max_import_rows: usize,
}

impl ContactService {
    pub fn new(store: Arc<dyn Store>, max_import_rows: usize) -> Self {
        Self { store, max_import_rows }
    }

    pub async fn list_contacts(&self, environment_id: Uuid, page: Option<i64>) -> ServiceResult<Vec<Contact>> {
        let page = page.unwrap_or(1).max(1);
        let offset = (page - 1) * DEFAULT_PAGE_SIZE;
        Ok(self.store.list_contacts(environment_id, offset, DEFAULT_PAGE_SIZE).await?)
    }

    /// Contact by id, scoped to the environment the caller was authorized for
    pub async fn get_contact(&self, environment_id: Uuid, contact_id: Uuid) -> ServiceResult<Contact> {
        self.store
            .get_contact(contact_id)
            .await?
            .filter(|c| c.environment_id == environment_id)
            .ok_or_else(|| ServiceError::not_found("contact", contact_id))
    }

    pub async fn delete_contact(&self, environment_id: Uuid, contact_id: Uuid) -> ServiceResult<Contact> {
        let contact = self.get_contact(environment_id, contact_id).await?;
        self.store.delete_contact(contact_id).await?;
        tracing::info!("Deleted contact {} from environment {}", contact_id, environment_id);
        Ok(contact)
    }
}
