use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use super::contact_service::ContactService;
use super::{FieldErrors, ServiceError, ServiceResult};
use crate::database::ContactStore;
use crate::models::{
    AttributeKeyType, Attributes, Contact, ContactAttributeKey, ContactWrite, DEFAULT_ATTRIBUTE_KEYS,
    EMAIL_ATTRIBUTE, USER_ID_ATTRIBUTE,
};

pub const MAX_ATTRIBUTE_KEY_LEN: usize = 255;

/// One parsed CSV row, column name to cell
pub type CsvRow = BTreeMap<String, String>;

/// What to do with a row whose email already belongs to a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    Skip,
    Update,
    Overwrite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub environment_id: Uuid,
    pub rows: Vec<CsvRow>,
    pub duplicate_policy: DuplicatePolicy,
    /// Column name to attribute key. Unmapped columns keep their name.
    #[serde(default)]
    pub attribute_map: HashMap<String, String>,
}

/// Merge one incoming row into the matching contact, if any.
/// `None` means nothing is written for the row and it is left out of the result.
pub fn merge_attributes(policy: DuplicatePolicy, existing: Option<&Contact>, incoming: &Attributes) -> Option<ContactWrite> {
    let Some(existing) = existing else {
        return Some(ContactWrite::Create {
            attributes: incoming.clone(),
        });
    };

    match policy {
        DuplicatePolicy::Skip => None,
        DuplicatePolicy::Update => {
            let upserts = incoming
                .iter()
                .filter(|(key, _)| !existing.attributes.contains_key(*key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Some(ContactWrite::Update {
                contact_id: existing.id,
                deletes: vec![],
                upserts,
            })
        }
        DuplicatePolicy::Overwrite => {
            let deletes = incoming
                .keys()
                .filter(|key| existing.attributes.contains_key(*key))
                .cloned()
                .collect();
            Some(ContactWrite::Update {
                contact_id: existing.id,
                deletes,
                upserts: incoming.clone(),
            })
        }
    }
}

/// Rename columns, trim values and drop blanks. Keys are trimmed too.
fn normalize_row(row: &CsvRow, attribute_map: &HashMap<String, String>) -> Attributes {
    row.iter()
        .filter_map(|(column, value)| {
            let key = attribute_map.get(column).unwrap_or(column).trim().to_string();
            let value = value.trim();
            if value.is_empty() {
                None
            } else {
                Some((key, value.to_string()))
            }
        })
        .collect()
}

/// Reject the whole upload when any row is unusable. Nothing is written before this passes.
fn validate_rows(rows: &[Attributes], raw: &[CsvRow], attribute_map: &HashMap<String, String>, max_rows: usize) -> ServiceResult<()> {
    if rows.is_empty() {
        return Err(ServiceError::field("rows", "No rows to import"));
    }
    if rows.len() > max_rows {
        return Err(ServiceError::field(
            "rows",
            format!("At most {} rows can be imported at once, got {}", max_rows, rows.len()),
        ));
    }

    let mut errors = FieldErrors::new();
    let mut seen_emails = HashSet::new();

    for (index, (row, raw_row)) in rows.iter().zip(raw).enumerate() {
        // Key checks run on every column, including the ones whose value is blank
        let mut columns_by_key: HashMap<&str, &str> = HashMap::new();
        for column in raw_row.keys() {
            let key = attribute_map.get(column).unwrap_or(column).trim();
            if let Some(other) = columns_by_key.insert(key, column.as_str()) {
                errors.add(
                    format!("rows[{}].{}", index, key),
                    format!("Columns {} and {} both map to attribute {}", other, column, key),
                );
            }
            if key.is_empty() {
                errors.add(format!("rows[{}]", index), "Attribute keys must not be empty");
            } else if key.chars().count() > MAX_ATTRIBUTE_KEY_LEN {
                errors.add(
                    format!("rows[{}].{}", index, key),
                    format!("Attribute keys must be at most {} characters", MAX_ATTRIBUTE_KEY_LEN),
                );
            }
        }

        match row.get(EMAIL_ATTRIBUTE) {
            None => errors.add(format!("rows[{}].email", index), "Every row needs an email"),
            Some(email) => {
                if !seen_emails.insert(email.as_str()) {
                    errors.add(format!("rows[{}].email", index), format!("Duplicate email {} in upload", email));
                }
            }
        }
    }

    errors.into_result("Invalid CSV data")
}

impl ContactService {
    /// Import parsed CSV rows into an environment. All writes commit together or not at all.
    /// Returns created and updated contacts in input order.
    pub async fn import_contacts(&self, request: &ImportRequest) -> ServiceResult<Vec<Contact>> {
        let environment_id = request.environment_id;
        let rows: Vec<Attributes> = request
            .rows
            .iter()
            .map(|row| normalize_row(row, &request.attribute_map))
            .collect();

        validate_rows(&rows, &request.rows, &request.attribute_map, self.max_import_rows)?;

        self.ensure_attribute_keys(environment_id, &rows).await?;

        let emails: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get(EMAIL_ATTRIBUTE).cloned())
            .collect();
        let existing: HashMap<String, Contact> = self
            .store
            .find_contacts_by_attribute(environment_id, EMAIL_ATTRIBUTE, &emails)
            .await?
            .into_iter()
            .filter_map(|contact| {
                let email = contact.attribute(EMAIL_ATTRIBUTE)?.to_string();
                Some((email, contact))
            })
            .collect();

        let writes: Vec<ContactWrite> = rows
            .iter()
            .filter_map(|row| {
                let matched = row.get(EMAIL_ATTRIBUTE).and_then(|email| existing.get(email));
                merge_attributes(request.duplicate_policy, matched, row)
            })
            .collect();

        if writes.is_empty() {
            tracing::info!(
                "CSV import into {}: {} rows, nothing to write",
                environment_id,
                rows.len()
            );
            return Ok(vec![]);
        }

        let contacts = self.store.apply_contact_writes(environment_id, &writes).await?;
        tracing::info!(
            "CSV import into {}: {} rows, {} contacts written ({:?})",
            environment_id,
            rows.len(),
            contacts.len(),
            request.duplicate_policy
        );
        Ok(contacts)
    }

    /// Create the attribute keys the upload uses but the environment lacks
    async fn ensure_attribute_keys(&self, environment_id: Uuid, rows: &[Attributes]) -> ServiceResult<()> {
        let known: HashSet<String> = self
            .store
            .list_attribute_keys(environment_id)
            .await?
            .into_iter()
            .map(|k| k.key)
            .collect();

        let mut missing: Vec<&str> = Vec::new();
        for key in rows.iter().flat_map(|row| row.keys()) {
            if !known.contains(key) && !missing.contains(&key.as_str()) {
                missing.push(key);
            }
        }
        if missing.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let keys: Vec<ContactAttributeKey> = missing
            .iter()
            .map(|key| ContactAttributeKey {
                id: Uuid::new_v4(),
                environment_id,
                key: key.to_string(),
                is_unique: *key == EMAIL_ATTRIBUTE || *key == USER_ID_ATTRIBUTE,
                kind: if DEFAULT_ATTRIBUTE_KEYS.contains(key) {
                    AttributeKeyType::Default
                } else {
                    AttributeKeyType::Custom
                },
                created_at: now,
            })
            .collect();

        self.store.create_attribute_keys(&keys).await?;
        tracing::debug!("Created {} attribute keys in {}", keys.len(), environment_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn contact(pairs: &[(&str, &str)]) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            environment_id: Uuid::new_v4(),
            attributes: attrs(pairs),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unmatched_rows_create() {
        let incoming = attrs(&[("email", "a@x.io")]);
        for policy in [DuplicatePolicy::Skip, DuplicatePolicy::Update, DuplicatePolicy::Overwrite] {
            assert_eq!(
                merge_attributes(policy, None, &incoming),
                Some(ContactWrite::Create {
                    attributes: incoming.clone()
                })
            );
        }
    }

    #[test]
    fn skip_leaves_existing_alone() {
        let existing = contact(&[("email", "a@x.io")]);
        assert_eq!(merge_attributes(DuplicatePolicy::Skip, Some(&existing), &attrs(&[("email", "a@x.io")])), None);
    }

    #[test]
    fn update_only_fills_missing_keys() {
        let existing = contact(&[("email", "a@x.io"), ("plan", "free")]);
        let incoming = attrs(&[("email", "a@x.io"), ("plan", "pro"), ("firstName", "Ada")]);

        let write = merge_attributes(DuplicatePolicy::Update, Some(&existing), &incoming).unwrap();
        assert_eq!(
            write,
            ContactWrite::Update {
                contact_id: existing.id,
                deletes: vec![],
                upserts: attrs(&[("firstName", "Ada")]),
            }
        );
    }

    #[test]
    fn overwrite_deletes_then_writes_every_incoming_key() {
        let existing = contact(&[("email", "a@x.io"), ("plan", "free"), ("age", "30")]);
        let incoming = attrs(&[("email", "a@x.io"), ("plan", "pro"), ("firstName", "Ada")]);

        match merge_attributes(DuplicatePolicy::Overwrite, Some(&existing), &incoming).unwrap() {
            ContactWrite::Update { deletes, upserts, .. } => {
                assert_eq!(deletes, vec!["email".to_string(), "plan".to_string()]);
                assert_eq!(upserts, incoming);
            }
            other => panic!("unexpected write {:?}", other),
        }
    }

    #[test]
    fn normalization_trims_renames_and_drops_blanks() {
        let row: CsvRow = [
            ("E-Mail".to_string(), "  a@x.io ".to_string()),
            ("plan".to_string(), "   ".to_string()),
            ("city".to_string(), "Berlin".to_string()),
        ]
        .into();
        let map: HashMap<String, String> = [("E-Mail".to_string(), "email".to_string())].into();

        assert_eq!(normalize_row(&row, &map), attrs(&[("email", "a@x.io"), ("city", "Berlin")]));
    }

    #[test]
    fn missing_email_fails_validation() {
        let raw: Vec<CsvRow> = vec![[("name".to_string(), "x".to_string())].into()];
        let rows: Vec<Attributes> = raw.iter().map(|r| normalize_row(r, &HashMap::new())).collect();
        let err = validate_rows(&rows, &raw, &HashMap::new(), 100).unwrap_err();
        match err {
            ServiceError::Validation { field_errors, .. } => {
                assert!(field_errors.unwrap().contains_key("rows[0].email"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn overlong_keys_fail_validation_even_with_blank_values() {
        let long_key = "k".repeat(MAX_ATTRIBUTE_KEY_LEN + 1);
        let raw: Vec<CsvRow> = vec![[
            ("email".to_string(), "a@x.io".to_string()),
            (long_key, " ".to_string()),
        ]
        .into()];
        let rows: Vec<Attributes> = raw.iter().map(|r| normalize_row(r, &HashMap::new())).collect();
        assert!(matches!(
            validate_rows(&rows, &raw, &HashMap::new(), 100),
            Err(ServiceError::Validation { .. })
        ));
    }

    #[test]
    fn two_columns_mapping_to_one_key_fail_validation() {
        let raw: Vec<CsvRow> = vec![[
            ("E-Mail".to_string(), "a@x.io".to_string()),
            ("email".to_string(), "b@x.io".to_string()),
        ]
        .into()];
        let map: HashMap<String, String> = [("E-Mail".to_string(), "email".to_string())].into();
        let rows: Vec<Attributes> = raw.iter().map(|r| normalize_row(r, &map)).collect();

        match validate_rows(&rows, &raw, &map, 100).unwrap_err() {
            ServiceError::Validation { field_errors, .. } => {
                let field_errors = field_errors.unwrap();
                assert!(field_errors["rows[0].email"].contains("both map to attribute email"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_emails_and_row_limits_fail_validation() {
        let raw: Vec<CsvRow> = vec![
            [("email".to_string(), "a@x.io".to_string())].into(),
            [("email".to_string(), "a@x.io".to_string())].into(),
        ];
        let rows: Vec<Attributes> = raw.iter().map(|r| normalize_row(r, &HashMap::new())).collect();
        assert!(validate_rows(&rows, &raw, &HashMap::new(), 100).is_err());
        assert!(validate_rows(&rows[..1], &raw[..1], &HashMap::new(), 100).is_ok());
        assert!(validate_rows(&rows[..1], &raw[..1], &HashMap::new(), 0).is_err());
    }
}
