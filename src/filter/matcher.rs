// In-process evaluation of a compiled segment, mirroring the SQL translation in filter_where.rs

use super::expr::FilterExpr;
use super::types::{FilterOperator, FilterValue};
use crate::models::Attributes;

pub fn matches(expr: &FilterExpr, attributes: &Attributes) -> bool {
    match expr {
        FilterExpr::All => true,
        FilterExpr::And(parts) => parts.iter().all(|p| matches(p, attributes)),
        FilterExpr::Or(parts) => parts.iter().any(|p| matches(p, attributes)),
        FilterExpr::Not(inner) => !matches(inner, attributes),
        FilterExpr::Attribute { key, operator, value } => {
            matches_attribute(attributes.get(key).map(String::as_str), *operator, value)
        }
    }
}

fn matches_attribute(actual: Option<&str>, operator: FilterOperator, expected: &FilterValue) -> bool {
    match operator {
        FilterOperator::IsSet => return actual.is_some(),
        FilterOperator::IsNotSet => return actual.is_none(),
        _ => {}
    }

    // Every other operator requires the attribute to exist
    let Some(actual) = actual else {
        return false;
    };

    match operator {
        FilterOperator::Equals => match expected {
            FilterValue::Number(n) => parse_number(actual) == Some(*n),
            FilterValue::Text(s) => actual == s,
        },
        FilterOperator::NotEquals => match expected {
            FilterValue::Number(n) => parse_number(actual) != Some(*n),
            FilterValue::Text(s) => actual != s,
        },
        FilterOperator::LessThan => compare(actual, expected, |a, b| a < b),
        FilterOperator::LessEqual => compare(actual, expected, |a, b| a <= b),
        FilterOperator::GreaterThan => compare(actual, expected, |a, b| a > b),
        FilterOperator::GreaterEqual => compare(actual, expected, |a, b| a >= b),
        FilterOperator::Contains => actual.contains(&expected.as_text()),
        FilterOperator::DoesNotContain => !actual.contains(&expected.as_text()),
        FilterOperator::StartsWith => actual.starts_with(&expected.as_text()),
        FilterOperator::EndsWith => actual.ends_with(&expected.as_text()),
        // Handled above or compiled away
        FilterOperator::IsSet | FilterOperator::IsNotSet | FilterOperator::UserIsIn | FilterOperator::UserIsNotIn => false,
    }
}

fn compare(actual: &str, expected: &FilterValue, op: impl Fn(f64, f64) -> bool) -> bool {
    match (parse_number(actual), expected.as_number()) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

/// Same shape the SQL side accepts: optional minus, digits, optional fraction
fn parse_number(value: &str) -> Option<f64> {
    let digits = value.strip_prefix('-').unwrap_or(value);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let fraction = parts.next();
    let is_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

    if !is_digits(whole) || fraction.map(|f| !is_digits(f)).unwrap_or(false) {
        return None;
    }
    value.parse().ok()
}
