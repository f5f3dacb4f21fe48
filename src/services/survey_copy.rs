use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::organization_service::OrganizationService;
use super::{ServiceError, ServiceResult};
use crate::authz::{check_authorization, AccessRule, ProjectPermission};
use crate::cache::CacheService;
use crate::database::{SegmentStore, Store, SurveyStore};
use crate::error::ApiError;
use crate::models::{Segment, Survey, SurveyStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyTarget {
    pub environment_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CopyOutcome {
    Success,
    PartialSuccess,
    Error,
}

impl CopyOutcome {
    /// `failed` out of `total` copies did not go through
    pub fn from_counts(failed: usize, total: usize) -> Self {
        if failed == 0 {
            CopyOutcome::Success
        } else if failed < total {
            CopyOutcome::PartialSuccess
        } else {
            CopyOutcome::Error
        }
    }

    /// Message key the client shows as a toast
    pub fn toast_key(&self) -> &'static str {
        match self {
            CopyOutcome::Success => "copy_survey_success",
            CopyOutcome::PartialSuccess => "copy_survey_partially_success",
            CopyOutcome::Error => "copy_survey_error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyFailure {
    pub environment_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopySummary {
    pub outcome: CopyOutcome,
    pub toast: &'static str,
    pub success_count: usize,
    pub error_count: usize,
    pub copies: Vec<Survey>,
    pub failures: Vec<CopyFailure>,
}

/// What the client sees for one failed target. Storage details stay in the logs.
fn failure_message(err: ServiceError) -> String {
    ApiError::from(err).message().to_string()
}

#[derive(Clone)]
pub struct SurveyService {
    store: Arc<dyn Store>,
    organizations: OrganizationService,
}

impl SurveyService {
    pub fn new(store: Arc<dyn Store>, cache: CacheService) -> Self {
        Self {
            organizations: OrganizationService::new(store.clone(), cache),
            store,
        }
    }

    pub async fn get_survey(&self, environment_id: Uuid, survey_id: Uuid) -> ServiceResult<Survey> {
        self.store
            .get_survey(survey_id)
            .await?
            .filter(|s| s.environment_id == environment_id)
            .ok_or_else(|| ServiceError::not_found("survey", survey_id))
    }

    pub async fn list_surveys(&self, environment_id: Uuid) -> ServiceResult<Vec<Survey>> {
        Ok(self.store.list_surveys(environment_id).await?)
    }

    pub async fn create_survey(
        &self,
        environment_id: Uuid,
        created_by: Uuid,
        name: &str,
        segment_id: Option<Uuid>,
        definition: Value,
    ) -> ServiceResult<Survey> {
        if let Some(segment_id) = segment_id {
            let usable = self
                .store
                .get_segment(segment_id)
                .await?
                .map(|s| s.environment_id == environment_id)
                .unwrap_or(false);
            if !usable {
                return Err(ServiceError::field("segmentId", "Segment does not exist in this environment"));
            }
        }

        let now = Utc::now();
        let survey = Survey {
            id: Uuid::new_v4(),
            environment_id,
            name: name.trim().to_string(),
            status: SurveyStatus::Draft,
            segment_id,
            definition,
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        };
        self.store.create_survey(&survey, None).await?;
        tracing::info!("Created survey {} in environment {}", survey.id, environment_id);
        Ok(survey)
    }

    /// Copy a survey into every target. Each target is authorized and copied on its own;
    /// one failing target never stops the others.
    pub async fn copy_survey_to_environments(
        &self,
        user_id: Uuid,
        source_environment_id: Uuid,
        survey_id: Uuid,
        targets: &[CopyTarget],
    ) -> ServiceResult<CopySummary> {
        if targets.is_empty() {
            return Err(ServiceError::field("targets", "Select at least one environment"));
        }
        let source = self.get_survey(source_environment_id, survey_id).await?;
        let source_scope = self.organizations.environment_scope(source_environment_id).await?;
        let segment = match source.segment_id {
            Some(id) => self.store.get_segment(id).await?,
            None => None,
        };

        let results = join_all(targets.iter().map(|target| {
            self.copy_to(user_id, source_scope.organization_id, &source, segment.as_ref(), target.environment_id)
        }))
        .await;

        let mut copies = Vec::new();
        let mut failures = Vec::new();
        for (target, result) in targets.iter().zip(results) {
            match result {
                Ok(copy) => copies.push(copy),
                Err(e) => {
                    tracing::warn!("Copying survey {} to {} failed: {}", survey_id, target.environment_id, e);
                    failures.push(CopyFailure {
                        environment_id: target.environment_id,
                        message: failure_message(e),
                    });
                }
            }
        }

        let outcome = CopyOutcome::from_counts(failures.len(), targets.len());
        Ok(CopySummary {
            outcome,
            toast: outcome.toast_key(),
            success_count: copies.len(),
            error_count: failures.len(),
            copies,
            failures,
        })
    }

    async fn copy_to(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        source: &Survey,
        segment: Option<&Segment>,
        target_environment_id: Uuid,
    ) -> ServiceResult<Survey> {
        let scope = self.organizations.environment_scope(target_environment_id).await?;
        if scope.organization_id != organization_id {
            return Err(ServiceError::validation("Target environment belongs to another organization"));
        }
        check_authorization(
            self.store.as_ref(),
            user_id,
            scope.organization_id,
            &[AccessRule::org_admins(), AccessRule::project(scope.project_id, ProjectPermission::ReadWrite)],
        )
        .await?;

        let now = Utc::now();
        let copy_id = Uuid::new_v4();
        let same_environment = target_environment_id == source.environment_id;

        let private_segment = segment.filter(|s| s.is_private).map(|s| Segment {
            id: Uuid::new_v4(),
            environment_id: target_environment_id,
            title: copy_id.to_string(),
            description: s.description.clone(),
            is_private: true,
            filters: s.filters.clone(),
            created_at: now,
            updated_at: now,
        });
        let segment_id = match (&private_segment, segment) {
            (Some(cloned), _) => Some(cloned.id),
            (None, Some(public)) if same_environment => Some(public.id),
            _ => None,
        };

        let copy = Survey {
            id: copy_id,
            environment_id: target_environment_id,
            name: format!("{} (copy)", source.name),
            status: SurveyStatus::Draft,
            segment_id,
            definition: source.definition.clone(),
            created_by: Some(user_id),
            created_at: now,
            updated_at: now,
        };
        self.store.create_survey(&copy, private_segment.as_ref()).await?;
        Ok(copy)
    }
}
