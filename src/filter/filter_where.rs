use super::expr::FilterExpr;
use super::types::{FilterOperator, FilterValue};

/// Bound value for a generated placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Number(f64),
}

const NUMERIC_PATTERN: &str = "'^-?[0-9]+(\\.[0-9]+)?$'";

/// Translates a compiled segment into a WHERE fragment over `contacts c`.
/// Attribute predicates become correlated EXISTS subqueries on contact_attributes.
pub struct SegmentWhere {
    param_values: Vec<SqlParam>,
    param_index: usize,
}

impl SegmentWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Returns the fragment and its parameters, numbered after `starting_param_index`
    pub fn generate(expr: &FilterExpr, starting_param_index: usize) -> (String, Vec<SqlParam>) {
        let mut filter_where = Self::new(starting_param_index);
        let sql = filter_where.build(expr);
        (sql, filter_where.param_values)
    }

    fn build(&mut self, expr: &FilterExpr) -> String {
        match expr {
            FilterExpr::All => "TRUE".to_string(),
            FilterExpr::And(parts) => self.join(parts, " AND "),
            FilterExpr::Or(parts) => self.join(parts, " OR "),
            FilterExpr::Not(inner) => format!("NOT ({})", self.build(inner)),
            FilterExpr::Attribute { key, operator, value } => self.attribute_condition(key, *operator, value),
        }
    }

    fn join(&mut self, parts: &[FilterExpr], joiner: &str) -> String {
        if parts.is_empty() {
            return "TRUE".to_string();
        }
        let sql_parts: Vec<String> = parts.iter().map(|p| format!("({})", self.build(p))).collect();
        sql_parts.join(joiner)
    }

    fn attribute_condition(&mut self, key: &str, operator: FilterOperator, value: &FilterValue) -> String {
        let key_param = self.param(SqlParam::Text(key.to_string()));

        let value_condition = match operator {
            FilterOperator::IsSet | FilterOperator::IsNotSet => None,
            FilterOperator::Equals => Some(match value {
                FilterValue::Number(n) => self.numeric("=", *n),
                FilterValue::Text(s) => format!("ca.value = {}", self.param(SqlParam::Text(s.clone()))),
            }),
            FilterOperator::NotEquals => Some(match value {
                FilterValue::Number(n) => self.numeric_not_equal(*n),
                FilterValue::Text(s) => format!("ca.value <> {}", self.param(SqlParam::Text(s.clone()))),
            }),
            FilterOperator::LessThan => Some(self.numeric("<", value.as_number().unwrap_or_default())),
            FilterOperator::LessEqual => Some(self.numeric("<=", value.as_number().unwrap_or_default())),
            FilterOperator::GreaterThan => Some(self.numeric(">", value.as_number().unwrap_or_default())),
            FilterOperator::GreaterEqual => Some(self.numeric(">=", value.as_number().unwrap_or_default())),
            FilterOperator::Contains => Some(self.like("LIKE", &format!("%{}%", escape_like(&value.as_text())))),
            FilterOperator::DoesNotContain => {
                Some(self.like("NOT LIKE", &format!("%{}%", escape_like(&value.as_text()))))
            }
            FilterOperator::StartsWith => Some(self.like("LIKE", &format!("{}%", escape_like(&value.as_text())))),
            FilterOperator::EndsWith => Some(self.like("LIKE", &format!("%{}", escape_like(&value.as_text())))),
            // Compiled away by FilterExpr::build
            FilterOperator::UserIsIn | FilterOperator::UserIsNotIn => Some("FALSE".to_string()),
        };

        let exists = match value_condition {
            Some(condition) => format!(
                "EXISTS (SELECT 1 FROM contact_attributes ca JOIN contact_attribute_keys k ON k.id = ca.attribute_key_id \
                 WHERE ca.contact_id = c.id AND k.key = {} AND {})",
                key_param, condition
            ),
            None => format!(
                "EXISTS (SELECT 1 FROM contact_attributes ca JOIN contact_attribute_keys k ON k.id = ca.attribute_key_id \
                 WHERE ca.contact_id = c.id AND k.key = {})",
                key_param
            ),
        };

        if operator == FilterOperator::IsNotSet {
            format!("NOT {}", exists)
        } else {
            exists
        }
    }

    fn numeric(&mut self, op: &str, n: f64) -> String {
        // CASE keeps the cast from running on non-numeric values
        format!(
            "CASE WHEN ca.value ~ {} THEN ca.value::float8 {} {} ELSE FALSE END",
            NUMERIC_PATTERN,
            op,
            self.param(SqlParam::Number(n))
        )
    }

    fn numeric_not_equal(&mut self, n: f64) -> String {
        format!(
            "CASE WHEN ca.value ~ {} THEN ca.value::float8 <> {} ELSE TRUE END",
            NUMERIC_PATTERN,
            self.param(SqlParam::Number(n))
        )
    }

    fn like(&mut self, op: &str, pattern: &str) -> String {
        format!("ca.value {} {}", op, self.param(SqlParam::Text(pattern.to_string())))
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

fn escape_like(value: &str) -> String {
    value.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
