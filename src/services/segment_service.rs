use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::cache::{CacheScope, CacheService, CacheTag};
use crate::database::{SegmentStore, Store, SurveyStore};
use crate::filter::{BaseFilters, FilterExpr};
use crate::models::Segment;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<bool>,
    pub filters: Option<BaseFilters>,
}

#[derive(Clone)]
pub struct SegmentService {
    store: Arc<dyn Store>,
    cache: CacheService,
}

impl SegmentService {
    pub fn new(store: Arc<dyn Store>, cache: CacheService) -> Self {
        Self { store, cache }
    }

    /// Segment by id, scoped to the environment the caller was authorized for
    pub async fn get_segment(&self, environment_id: Uuid, segment_id: Uuid) -> ServiceResult<Segment> {
        self.store
            .get_segment(segment_id)
            .await?
            .filter(|s| s.environment_id == environment_id)
            .ok_or_else(|| ServiceError::not_found("segment", segment_id))
    }

    /// Every segment of the environment, private ones included, keyed by id
    pub async fn segment_map(&self, environment_id: Uuid) -> ServiceResult<HashMap<Uuid, Segment>> {
        Ok(self
            .store
            .list_segments(environment_id)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect())
    }

    /// Public segments only
    pub async fn list_segments(&self, environment_id: Uuid) -> ServiceResult<Vec<Segment>> {
        let key = format!("segments:{}", environment_id);
        let tags = [CacheTag::new(CacheScope::Environment, environment_id)];
        let store = self.store.clone();

        self.cache
            .get_or_load(&key, &tags, || async move {
                let segments = store.list_segments(environment_id).await?;
                Ok::<_, ServiceError>(segments.into_iter().filter(|s| !s.is_private).collect::<Vec<_>>())
            })
            .await
    }

    /// Compile a segment as it would be stored, so broken references and cycles are refused up front
    async fn check_filters(&self, segment: &Segment) -> ServiceResult<FilterExpr> {
        let mut segments = self.segment_map(segment.environment_id).await?;
        segments.insert(segment.id, segment.clone());
        Ok(FilterExpr::for_segment(segment, &segments)?)
    }

    pub async fn create_segment(
        &self,
        environment_id: Uuid,
        title: &str,
        description: Option<String>,
        is_private: bool,
        filters: BaseFilters,
    ) -> ServiceResult<Segment> {
        let now = Utc::now();
        let segment = Segment {
            id: Uuid::new_v4(),
            environment_id,
            title: title.trim().to_string(),
            description,
            is_private,
            filters,
            created_at: now,
            updated_at: now,
        };
        self.check_filters(&segment).await?;
        self.store.create_segment(&segment).await?;
        self.cache.invalidate(CacheScope::Environment, environment_id).await;
        tracing::info!("Created segment {} in environment {}", segment.id, environment_id);
        Ok(segment)
    }

    pub async fn update_segment(
        &self,
        environment_id: Uuid,
        segment_id: Uuid,
        update: SegmentUpdate,
    ) -> ServiceResult<Segment> {
        let mut segment = self.get_segment(environment_id, segment_id).await?;
        if let Some(title) = update.title {
            segment.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            segment.description = Some(description);
        }
        if let Some(is_private) = update.is_private {
            segment.is_private = is_private;
        }
        if let Some(filters) = update.filters {
            segment.filters = filters;
        }
        segment.updated_at = Utc::now();

        self.check_filters(&segment).await?;
        self.store.update_segment(&segment).await?;
        self.cache.invalidate(CacheScope::Environment, environment_id).await;
        Ok(segment)
    }

    pub async fn reset_segment_filters(&self, environment_id: Uuid, segment_id: Uuid) -> ServiceResult<Segment> {
        self.update_segment(
            environment_id,
            segment_id,
            SegmentUpdate {
                filters: Some(vec![]),
                ..Default::default()
            },
        )
        .await
    }

    /// New public segment with the same filters, titled "<title> (copy)" or "(copy N)" when taken
    pub async fn clone_segment(&self, environment_id: Uuid, segment_id: Uuid) -> ServiceResult<Segment> {
        let source = self.get_segment(environment_id, segment_id).await?;
        let taken: Vec<String> = self
            .store
            .list_segments(environment_id)
            .await?
            .into_iter()
            .map(|s| s.title)
            .collect();

        let mut title = format!("{} (copy)", source.title);
        let mut n = 2;
        while taken.contains(&title) {
            title = format!("{} (copy {})", source.title, n);
            n += 1;
        }

        self.create_segment(environment_id, &title, source.description.clone(), false, source.filters.clone())
            .await
    }

    /// Refused while any survey still targets the segment
    pub async fn delete_segment(&self, environment_id: Uuid, segment_id: Uuid) -> ServiceResult<Segment> {
        let segment = self.get_segment(environment_id, segment_id).await?;
        let in_use = self.store.count_surveys_using_segment(segment_id).await?;
        if in_use > 0 {
            return Err(ServiceError::validation(format!(
                "Segment is used by {} survey(s) and cannot be deleted",
                in_use
            )));
        }
        self.store.delete_segment(segment_id).await?;
        self.cache.invalidate(CacheScope::Environment, environment_id).await;
        Ok(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{BaseFilter, FilterOperator, FilterResource, FilterRoot, FilterValue, Qualifier, SegmentFilter};
    use crate::testing::Fixture;

    fn segment_ref(segment_id: Uuid) -> BaseFilter {
        BaseFilter {
            id: Uuid::new_v4().to_string(),
            connector: None,
            resource: FilterResource::Filter(SegmentFilter {
                id: Uuid::new_v4().to_string(),
                root: FilterRoot::Segment { segment_id },
                value: FilterValue::Text(segment_id.to_string()),
                qualifier: Qualifier {
                    operator: FilterOperator::UserIsIn,
                },
            }),
        }
    }

    #[tokio::test]
    async fn unknown_segment_references_are_rejected() {
        let fx = Fixture::new().await;
        let segments = fx.state.segments();
        let err = segments
            .create_segment(fx.environment_id, "Broken", None, false, vec![segment_ref(Uuid::new_v4())])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn cycles_are_rejected_on_update() {
        let fx = Fixture::new().await;
        let segments = fx.state.segments();
        let a = segments.create_segment(fx.environment_id, "A", None, false, vec![]).await.unwrap();
        let b = segments
            .create_segment(fx.environment_id, "B", None, false, vec![segment_ref(a.id)])
            .await
            .unwrap();

        let update = SegmentUpdate {
            filters: Some(vec![segment_ref(b.id)]),
            ..Default::default()
        };
        assert!(segments.update_segment(fx.environment_id, a.id, update).await.is_err());
    }

    #[tokio::test]
    async fn clones_get_a_free_title() {
        let fx = Fixture::new().await;
        let segments = fx.state.segments();
        let a = segments.create_segment(fx.environment_id, "Pros", None, false, vec![]).await.unwrap();

        let first = segments.clone_segment(fx.environment_id, a.id).await.unwrap();
        let second = segments.clone_segment(fx.environment_id, a.id).await.unwrap();
        assert_eq!(first.title, "Pros (copy)");
        assert_eq!(second.title, "Pros (copy 2)");
    }

    #[tokio::test]
    async fn private_segments_are_hidden_from_the_list() {
        let fx = Fixture::new().await;
        let segments = fx.state.segments();
        segments.create_segment(fx.environment_id, "Public", None, false, vec![]).await.unwrap();
        segments.create_segment(fx.environment_id, "Private", None, true, vec![]).await.unwrap();

        let listed = segments.list_segments(fx.environment_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Public");
    }
}
