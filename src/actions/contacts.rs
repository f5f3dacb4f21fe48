use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::{environment_access, Access, ActionContext, ServerAction};
use crate::authz::ProjectPermission;
use crate::cache::{CacheScope, CacheTag};
use crate::models::Contact;
use crate::services::{FieldErrors, ImportRequest, ServiceResult, Validate};

impl Validate for ImportRequest {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        errors.require(!self.rows.is_empty(), "rows", "The CSV file has no rows");
        for (column, key) in &self.attribute_map {
            if key.trim().is_empty() {
                errors.add(format!("attributeMap.{}", column), "must not be empty");
            }
        }
        errors.into_result("Invalid CSV data")
    }
}

pub struct ImportContacts;

#[async_trait]
impl ServerAction for ImportContacts {
    const NAME: &'static str = "importContacts";
    type Input = ImportRequest;
    type Output = Vec<Contact>;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::ReadWrite).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Vec<Contact>> {
        ctx.state.contacts().import_contacts(input).await
    }

    fn invalidations(&self, input: &Self::Input, output: &Vec<Contact>) -> Vec<CacheTag> {
        let mut tags = vec![CacheTag::new(CacheScope::Environment, input.environment_id)];
        tags.extend(output.iter().map(|c| CacheTag::new(CacheScope::Contact, c.id)));
        tags
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetContactsInput {
    pub environment_id: Uuid,
    pub page: Option<i64>,
}

impl Validate for GetContactsInput {
    fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        errors.require(self.page.map(|p| p >= 0).unwrap_or(true), "page", "must not be negative");
        errors.into_result("Invalid page")
    }
}

pub struct GetContacts;

#[async_trait]
impl ServerAction for GetContacts {
    const NAME: &'static str = "getContacts";
    type Input = GetContactsInput;
    type Output = Vec<Contact>;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::Read).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Vec<Contact>> {
        ctx.state.contacts().list_contacts(input.environment_id, input.page).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteContactInput {
    pub environment_id: Uuid,
    pub contact_id: Uuid,
}

impl Validate for DeleteContactInput {}

pub struct DeleteContact;

#[async_trait]
impl ServerAction for DeleteContact {
    const NAME: &'static str = "deleteContact";
    type Input = DeleteContactInput;
    type Output = Contact;

    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access> {
        environment_access(ctx, input.environment_id, ProjectPermission::ReadWrite).await
    }

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Contact> {
        ctx.state.contacts().delete_contact(input.environment_id, input.contact_id).await
    }

    fn invalidations(&self, input: &Self::Input, _output: &Contact) -> Vec<CacheTag> {
        vec![
            CacheTag::new(CacheScope::Contact, input.contact_id),
            CacheTag::new(CacheScope::Environment, input.environment_id),
        ]
    }
}
