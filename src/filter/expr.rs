use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::error::FilterError;
use super::types::{BaseFilter, Connector, FilterOperator, FilterResource, FilterRoot, FilterValue, SegmentFilter};
use crate::models::Segment;

const MAX_DEPTH: usize = 16;

/// Normalized predicate tree a segment definition compiles to.
/// Storage backends either translate it to SQL or evaluate it per contact.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// Matches every contact (empty segment, device filters)
    All,
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    Attribute {
        key: String,
        operator: FilterOperator,
        value: FilterValue,
    },
}

impl FilterExpr {
    /// Compile `filters`, inlining segment references from `segments`.
    /// `and` binds tighter than `or`; a missing connector after the first filter reads as `and`.
    pub fn build(filters: &[BaseFilter], segments: &HashMap<Uuid, Segment>) -> Result<FilterExpr, FilterError> {
        let mut visiting = HashSet::new();
        Self::build_group(filters, segments, &mut visiting, 0)
    }

    /// Compile the filters of a stored segment. The segment itself counts as visited.
    pub fn for_segment(segment: &Segment, segments: &HashMap<Uuid, Segment>) -> Result<FilterExpr, FilterError> {
        let mut visiting = HashSet::new();
        visiting.insert(segment.id);
        Self::build_group(&segment.filters, segments, &mut visiting, 0)
    }

    fn build_group(
        filters: &[BaseFilter],
        segments: &HashMap<Uuid, Segment>,
        visiting: &mut HashSet<Uuid>,
        depth: usize,
    ) -> Result<FilterExpr, FilterError> {
        if depth > MAX_DEPTH {
            return Err(FilterError::TooDeep(MAX_DEPTH));
        }
        if filters.is_empty() {
            return Ok(FilterExpr::All);
        }

        let mut or_groups: Vec<Vec<FilterExpr>> = vec![vec![]];
        for (index, filter) in filters.iter().enumerate() {
            let expr = match &filter.resource {
                FilterResource::Group(children) => Self::build_group(children, segments, visiting, depth + 1)?,
                FilterResource::Filter(leaf) => Self::build_leaf(leaf, segments, visiting, depth)?,
            };

            if index > 0 && filter.connector == Some(Connector::Or) {
                or_groups.push(vec![]);
            }
            if let Some(group) = or_groups.last_mut() {
                group.push(expr);
            }
        }

        let mut alternatives: Vec<FilterExpr> = or_groups.into_iter().map(FilterExpr::and).collect();
        Ok(if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            FilterExpr::Or(alternatives)
        })
    }

    fn build_leaf(
        leaf: &SegmentFilter,
        segments: &HashMap<Uuid, Segment>,
        visiting: &mut HashSet<Uuid>,
        depth: usize,
    ) -> Result<FilterExpr, FilterError> {
        let operator = leaf.qualifier.operator;
        match &leaf.root {
            FilterRoot::Attribute { contact_attribute_key } => {
                Self::attribute(contact_attribute_key, operator, &leaf.value, "attribute filter")
            }
            FilterRoot::Person { person_identifier } => {
                Self::attribute(person_identifier, operator, &leaf.value, "person filter")
            }
            FilterRoot::Segment { segment_id } => {
                if !operator.is_segment_membership() {
                    return Err(FilterError::InvalidOperator {
                        operator: operator.as_str().to_string(),
                        target: "segment filter".to_string(),
                    });
                }
                if !visiting.insert(*segment_id) {
                    return Err(FilterError::CircularReference(*segment_id));
                }
                let referenced = segments
                    .get(segment_id)
                    .ok_or(FilterError::SegmentNotFound(*segment_id))?;
                let inner = Self::build_group(&referenced.filters, segments, visiting, depth + 1)?;
                visiting.remove(segment_id);

                Ok(match operator {
                    FilterOperator::UserIsNotIn => FilterExpr::Not(Box::new(inner)),
                    _ => inner,
                })
            }
            FilterRoot::Device { device_type } => {
                tracing::debug!("Device filter '{}' has no stored counterpart, treating as satisfied", device_type);
                Ok(FilterExpr::All)
            }
        }
    }

    fn attribute(key: &str, operator: FilterOperator, value: &FilterValue, target: &str) -> Result<FilterExpr, FilterError> {
        if key.trim().is_empty() {
            return Err(FilterError::InvalidAttributeKey(key.to_string()));
        }
        if operator.is_segment_membership() {
            return Err(FilterError::InvalidOperator {
                operator: operator.as_str().to_string(),
                target: target.to_string(),
            });
        }

        let value = if operator.is_numeric() {
            let number = value
                .as_number()
                .ok_or_else(|| FilterError::InvalidValue(format!("{} requires a number", operator.as_str())))?;
            FilterValue::Number(number)
        } else {
            value.clone()
        };

        Ok(FilterExpr::Attribute {
            key: key.to_string(),
            operator,
            value,
        })
    }

    fn and(mut parts: Vec<FilterExpr>) -> FilterExpr {
        parts.retain(|p| *p != FilterExpr::All);
        match parts.len() {
            0 => FilterExpr::All,
            1 => parts.remove(0),
            _ => FilterExpr::And(parts),
        }
    }

    /// Segment ids referenced anywhere in `filters`, nested groups included
    pub fn referenced_segments(filters: &[BaseFilter]) -> Vec<Uuid> {
        let mut ids = vec![];
        for filter in filters {
            match &filter.resource {
                FilterResource::Group(children) => ids.extend(Self::referenced_segments(children)),
                FilterResource::Filter(SegmentFilter {
                    root: FilterRoot::Segment { segment_id },
                    ..
                }) => ids.push(*segment_id),
                FilterResource::Filter(_) => {}
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::Qualifier;
    use chrono::Utc;

    pub fn leaf(connector: Option<Connector>, key: &str, operator: FilterOperator, value: FilterValue) -> BaseFilter {
        BaseFilter {
            id: String::new(),
            connector,
            resource: FilterResource::Filter(SegmentFilter {
                id: String::new(),
                root: FilterRoot::Attribute {
                    contact_attribute_key: key.to_string(),
                },
                value,
                qualifier: Qualifier { operator },
            }),
        }
    }

    fn segment_ref(connector: Option<Connector>, segment_id: Uuid, operator: FilterOperator) -> BaseFilter {
        BaseFilter {
            id: String::new(),
            connector,
            resource: FilterResource::Filter(SegmentFilter {
                id: String::new(),
                root: FilterRoot::Segment { segment_id },
                value: FilterValue::default(),
                qualifier: Qualifier { operator },
            }),
        }
    }

    fn segment(id: Uuid, filters: Vec<BaseFilter>) -> Segment {
        Segment {
            id,
            environment_id: Uuid::nil(),
            title: "s".to_string(),
            description: None,
            is_private: false,
            filters,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn text(s: &str) -> FilterValue {
        FilterValue::Text(s.to_string())
    }

    #[test]
    fn empty_filters_match_everyone() {
        assert_eq!(FilterExpr::build(&[], &HashMap::new()).unwrap(), FilterExpr::All);
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let filters = vec![
            leaf(None, "a", FilterOperator::Equals, text("1")),
            leaf(Some(Connector::And), "b", FilterOperator::Equals, text("2")),
            leaf(Some(Connector::Or), "c", FilterOperator::Equals, text("3")),
        ];
        let expr = FilterExpr::build(&filters, &HashMap::new()).unwrap();
        match expr {
            FilterExpr::Or(groups) => {
                assert_eq!(groups.len(), 2);
                assert!(matches!(&groups[0], FilterExpr::And(parts) if parts.len() == 2));
                assert!(matches!(&groups[1], FilterExpr::Attribute { key, .. } if key == "c"));
            }
            other => panic!("unexpected expression: {:?}", other),
        }
    }

    #[test]
    fn numeric_operators_require_numbers() {
        let filters = vec![leaf(None, "age", FilterOperator::GreaterThan, text("abc"))];
        assert!(matches!(
            FilterExpr::build(&filters, &HashMap::new()),
            Err(FilterError::InvalidValue(_))
        ));

        let filters = vec![leaf(None, "age", FilterOperator::GreaterThan, text("30"))];
        let expr = FilterExpr::build(&filters, &HashMap::new()).unwrap();
        assert!(matches!(expr, FilterExpr::Attribute { value: FilterValue::Number(n), .. } if n == 30.0));
    }

    #[test]
    fn segment_references_are_inlined_and_negated() {
        let inner_id = Uuid::new_v4();
        let mut segments = HashMap::new();
        segments.insert(
            inner_id,
            segment(inner_id, vec![leaf(None, "plan", FilterOperator::Equals, text("pro"))]),
        );

        let filters = vec![segment_ref(None, inner_id, FilterOperator::UserIsNotIn)];
        let expr = FilterExpr::build(&filters, &segments).unwrap();
        assert!(matches!(expr, FilterExpr::Not(inner) if matches!(*inner, FilterExpr::Attribute { .. })));
    }

    #[test]
    fn missing_segment_reference_fails() {
        let filters = vec![segment_ref(None, Uuid::new_v4(), FilterOperator::UserIsIn)];
        assert!(matches!(
            FilterExpr::build(&filters, &HashMap::new()),
            Err(FilterError::SegmentNotFound(_))
        ));
    }

    #[test]
    fn circular_segment_reference_fails() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut segments = HashMap::new();
        segments.insert(a, segment(a, vec![segment_ref(None, b, FilterOperator::UserIsIn)]));
        segments.insert(b, segment(b, vec![segment_ref(None, a, FilterOperator::UserIsIn)]));

        let result = FilterExpr::for_segment(&segments[&a], &segments);
        assert!(matches!(result, Err(FilterError::CircularReference(_))));
    }

    #[test]
    fn membership_operator_on_attribute_is_rejected() {
        let filters = vec![leaf(None, "email", FilterOperator::UserIsIn, text("x"))];
        assert!(matches!(
            FilterExpr::build(&filters, &HashMap::new()),
            Err(FilterError::InvalidOperator { .. })
        ));
    }

    #[test]
    fn parses_wire_format() {
        let json = serde_json::json!([
            {
                "id": "f1",
                "connector": null,
                "resource": {
                    "id": "r1",
                    "root": { "type": "attribute", "contactAttributeKey": "plan" },
                    "value": "pro",
                    "qualifier": { "operator": "equals" }
                }
            },
            {
                "id": "g1",
                "connector": "or",
                "resource": [
                    {
                        "id": "f2",
                        "connector": null,
                        "resource": {
                            "id": "r2",
                            "root": { "type": "person", "personIdentifier": "userId" },
                            "value": "u-1",
                            "qualifier": { "operator": "equals" }
                        }
                    }
                ]
            }
        ]);
        let filters: Vec<BaseFilter> = serde_json::from_value(json).unwrap();
        assert!(matches!(filters[1].resource, FilterResource::Group(ref g) if g.len() == 1));
        let expr = FilterExpr::build(&filters, &HashMap::new()).unwrap();
        assert!(matches!(expr, FilterExpr::Or(ref parts) if parts.len() == 2));
    }
}
