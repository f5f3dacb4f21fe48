use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::database::{ContactStore, SegmentStore, Store, SurveyStore};
use crate::filter::FilterExpr;
use crate::models::{Contact, EMAIL_ATTRIBUTE, USER_ID_ATTRIBUTE};

/// Claims carried by a personal survey link. Links without `exp` never expire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkClaims {
    pub contact_id: Uuid,
    pub survey_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalLink {
    pub contact_id: Uuid,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub survey_url: String,
    pub expiration_days: Option<u32>,
}

/// Contact and survey a verified link points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkTarget {
    pub contact_id: Uuid,
    pub survey_id: Uuid,
    pub environment_id: Uuid,
}

#[derive(Clone)]
pub struct PersonalLinkService {
    store: Arc<dyn Store>,
    signing_secret: String,
    public_url: String,
}

impl PersonalLinkService {
    pub fn new(store: Arc<dyn Store>, signing_secret: impl Into<String>, public_url: impl Into<String>) -> Self {
        Self {
            store,
            signing_secret: signing_secret.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// One signed link per contact in the segment.
    /// `None` when the segment could not be resolved or queried, `Some(vec![])` when nobody matches.
    pub async fn generate_personal_links(
        &self,
        environment_id: Uuid,
        survey_id: Uuid,
        segment_id: Uuid,
        expiration_days: Option<u32>,
    ) -> Option<Vec<PersonalLink>> {
        match self.build_links(environment_id, survey_id, segment_id, expiration_days).await {
            Ok(links) => Some(links),
            Err(e) => {
                tracing::error!(
                    "Personal link generation failed: survey={} segment={}: {}",
                    survey_id,
                    segment_id,
                    e
                );
                None
            }
        }
    }

    async fn build_links(
        &self,
        environment_id: Uuid,
        survey_id: Uuid,
        segment_id: Uuid,
        expiration_days: Option<u32>,
    ) -> ServiceResult<Vec<PersonalLink>> {
        self.store
            .get_survey(survey_id)
            .await?
            .filter(|s| s.environment_id == environment_id)
            .ok_or_else(|| ServiceError::not_found("survey", survey_id))?;

        let segments: std::collections::HashMap<_, _> = self
            .store
            .list_segments(environment_id)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        let segment = segments
            .get(&segment_id)
            .ok_or_else(|| ServiceError::not_found("segment", segment_id))?;

        let expr = FilterExpr::for_segment(segment, &segments)?;
        let contacts = self.store.find_contacts_matching(environment_id, &expr).await?;

        contacts
            .iter()
            .map(|contact| self.link_for(contact, survey_id, expiration_days))
            .collect()
    }

    fn link_for(&self, contact: &Contact, survey_id: Uuid, expiration_days: Option<u32>) -> ServiceResult<PersonalLink> {
        let token = self.sign(contact.id, survey_id, expiration_days)?;
        let attribute = |key: &str| contact.attribute(key).map(str::to_string);

        Ok(PersonalLink {
            contact_id: contact.id,
            user_id: attribute(USER_ID_ATTRIBUTE),
            email: attribute(EMAIL_ATTRIBUTE),
            first_name: attribute("firstName"),
            last_name: attribute("lastName"),
            survey_url: format!("{}/c/{}", self.public_url, token),
            expiration_days,
        })
    }

    pub fn sign(&self, contact_id: Uuid, survey_id: Uuid, expiration_days: Option<u32>) -> ServiceResult<String> {
        let claims = LinkClaims {
            contact_id,
            survey_id,
            exp: expiration_days.map(|days| (Utc::now() + Duration::days(days as i64)).timestamp()),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.signing_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Unknown(anyhow::anyhow!("failed to sign link token: {}", e)))
    }

    pub fn decode_token(&self, token: &str) -> ServiceResult<LinkClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is optional; when present it is still checked
        validation.required_spec_claims.clear();

        decode::<LinkClaims>(
            token,
            &DecodingKey::from_secret(self.signing_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ServiceError::field("token", "This link has expired"),
            _ => ServiceError::field("token", "This link is invalid"),
        })
    }

    /// Check a link token and that its contact and survey still exist together
    pub async fn verify_personal_link(&self, token: &str) -> ServiceResult<LinkTarget> {
        let claims = self.decode_token(token)?;

        let survey = self
            .store
            .get_survey(claims.survey_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("survey", claims.survey_id))?;
        let contact = self
            .store
            .get_contact(claims.contact_id)
            .await?
            .filter(|c| c.environment_id == survey.environment_id)
            .ok_or_else(|| ServiceError::not_found("contact", claims.contact_id))?;

        Ok(LinkTarget {
            contact_id: contact.id,
            survey_id: survey.id,
            environment_id: survey.environment_id,
        })
    }
}
