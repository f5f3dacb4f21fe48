use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::manager::{DatabaseError, DatabaseManager};
use super::store::*;
use crate::authz::{OrganizationRole, ProjectPermission, TeamRole};
use crate::filter::{FilterExpr, SegmentWhere, SqlParam};
use crate::models::{
    ApiKey, ApiKeyEnvironmentPermission, AttributeKeyType, Attributes, Contact, ContactAttributeKey, ContactWrite,
    Environment, EnvironmentScope, EnvironmentType, Integration, IntegrationConfig, IntegrationType, Membership,
    Organization, Project, ProjectTeam, Segment, Survey, SurveyStatus, Team, TeamUser,
};

/// Contacts with their attributes folded into one JSON object per row
const CONTACT_SELECT: &str = "SELECT c.id, c.environment_id, c.created_at, c.updated_at, \
     COALESCE(jsonb_object_agg(k.key, ca.value) FILTER (WHERE k.key IS NOT NULL), '{}'::jsonb) AS attributes \
     FROM contacts c \
     LEFT JOIN contact_attributes ca ON ca.contact_id = c.id \
     LEFT JOIN contact_attribute_keys k ON k.id = ca.attribute_key_id";

const CONTACT_GROUP: &str = "GROUP BY c.id ORDER BY c.created_at, c.id";

/// Store backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_contacts(&self, where_clause: &str, ids: &[Uuid]) -> StoreResult<Vec<Contact>> {
        let sql = format!("{} WHERE {} {}", CONTACT_SELECT, where_clause, CONTACT_GROUP);
        let rows = sqlx::query(&sql).bind(ids).fetch_all(&self.pool).await?;
        rows.iter().map(contact_from_row).collect()
    }
}

fn parse_column<T>(row: &PgRow, column: &str, parse: fn(&str) -> Option<T>) -> StoreResult<T> {
    let raw: String = row.try_get(column)?;
    parse(&raw).ok_or_else(|| DatabaseError::QueryError(format!("unexpected value '{}' in column {}", raw, column)))
}

fn contact_from_row(row: &PgRow) -> StoreResult<Contact> {
    let attributes: Json<Attributes> = row.try_get("attributes")?;
    Ok(Contact {
        id: row.try_get("id")?,
        environment_id: row.try_get("environment_id")?,
        attributes: attributes.0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn team_from_row(row: &PgRow) -> StoreResult<Team> {
    Ok(Team {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn attribute_key_from_row(row: &PgRow) -> StoreResult<ContactAttributeKey> {
    Ok(ContactAttributeKey {
        id: row.try_get("id")?,
        environment_id: row.try_get("environment_id")?,
        key: row.try_get("key")?,
        is_unique: row.try_get("is_unique")?,
        kind: parse_column(row, "type", AttributeKeyType::parse)?,
        created_at: row.try_get("created_at")?,
    })
}

fn segment_from_row(row: &PgRow) -> StoreResult<Segment> {
    let filters: serde_json::Value = row.try_get("filters")?;
    Ok(Segment {
        id: row.try_get("id")?,
        environment_id: row.try_get("environment_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        is_private: row.try_get("is_private")?,
        filters: serde_json::from_value(filters)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn survey_from_row(row: &PgRow) -> StoreResult<Survey> {
    Ok(Survey {
        id: row.try_get("id")?,
        environment_id: row.try_get("environment_id")?,
        name: row.try_get("name")?,
        status: parse_column(row, "status", SurveyStatus::parse)?,
        segment_id: row.try_get("segment_id")?,
        definition: row.try_get("definition")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn integration_from_row(row: &PgRow) -> StoreResult<Integration> {
    Ok(Integration {
        id: row.try_get("id")?,
        environment_id: row.try_get("environment_id")?,
        kind: parse_column(row, "type", IntegrationType::parse)?,
        config: IntegrationConfig {
            key: row.try_get("key_ciphertext")?,
            user_email: row.try_get("user_email")?,
            data: row.try_get("data")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn api_key_from_row(row: &PgRow) -> StoreResult<ApiKey> {
    let permissions: Json<Vec<ApiKeyEnvironmentPermission>> = row.try_get("environment_permissions")?;
    Ok(ApiKey {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        label: row.try_get("label")?,
        hashed_key: row.try_get("hashed_key")?,
        created_by: row.try_get("created_by")?,
        environment_permissions: permissions.0,
        last_used_at: row.try_get("last_used_at")?,
        created_at: row.try_get("created_at")?,
    })
}

const API_KEY_SELECT: &str = "SELECT a.id, a.organization_id, a.label, a.hashed_key, a.created_by, a.last_used_at, a.created_at, \
     COALESCE(jsonb_agg(jsonb_build_object('environmentId', e.environment_id, 'permission', e.permission)) \
     FILTER (WHERE e.environment_id IS NOT NULL), '[]'::jsonb) AS environment_permissions \
     FROM api_keys a LEFT JOIN api_key_environments e ON e.api_key_id = a.id";

fn bind_sql_param<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q SqlParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        SqlParam::Text(s) => q.bind(s),
        SqlParam::Number(n) => q.bind(*n),
    }
}

async fn insert_attribute(
    tx: &mut Transaction<'_, Postgres>,
    environment_id: Uuid,
    contact_id: Uuid,
    key: &str,
    value: &str,
) -> StoreResult<()> {
    let result = sqlx::query(
        "INSERT INTO contact_attributes (contact_id, attribute_key_id, value) \
         SELECT $1, k.id, $3 FROM contact_attribute_keys k WHERE k.environment_id = $2 AND k.key = $4 \
         ON CONFLICT (contact_id, attribute_key_id) DO UPDATE SET value = EXCLUDED.value",
    )
    .bind(contact_id)
    .bind(environment_id)
    .bind(value)
    .bind(key)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::ForeignKeyViolation(format!("attribute key {}", key)));
    }
    Ok(())
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        DatabaseManager::health_check(&self.pool).await
    }
}

#[async_trait]
impl OrganizationStore for PgStore {
    async fn create_organization(&self, organization: &Organization, owner: &Membership) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(organization.id)
            .bind(&organization.name)
            .bind(organization.created_at)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO memberships (organization_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(owner.organization_id)
            .bind(owner.user_id)
            .bind(owner.role.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_organization(&self, id: Uuid) -> StoreResult<Option<Organization>> {
        let row = sqlx::query("SELECT id, name, created_at FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(Organization {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn upsert_membership(&self, membership: &Membership) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO memberships (organization_id, user_id, role) VALUES ($1, $2, $3) \
             ON CONFLICT (organization_id, user_id) DO UPDATE SET role = EXCLUDED.role",
        )
        .bind(membership.organization_id)
        .bind(membership.user_id)
        .bind(membership.role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_membership(&self, organization_id: Uuid, user_id: Uuid) -> StoreResult<Option<Membership>> {
        let row = sqlx::query("SELECT role FROM memberships WHERE organization_id = $1 AND user_id = $2")
            .bind(organization_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(Membership {
                user_id,
                organization_id,
                role: parse_column(&row, "role", OrganizationRole::parse)?,
            })
        })
        .transpose()
    }

    async fn create_project(&self, project: &Project, environments: &[Environment]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO projects (id, organization_id, name, created_at) VALUES ($1, $2, $3, $4)")
            .bind(project.id)
            .bind(project.organization_id)
            .bind(&project.name)
            .bind(project.created_at)
            .execute(&mut *tx)
            .await?;
        for environment in environments {
            sqlx::query("INSERT INTO environments (id, project_id, type) VALUES ($1, $2, $3)")
                .bind(environment.id)
                .bind(environment.project_id)
                .bind(environment.kind.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        let row = sqlx::query("SELECT id, organization_id, name, created_at FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(Project {
                id: row.try_get("id")?,
                organization_id: row.try_get("organization_id")?,
                name: row.try_get("name")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn get_environment(&self, id: Uuid) -> StoreResult<Option<Environment>> {
        let row = sqlx::query("SELECT id, project_id, type FROM environments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(Environment {
                id: row.try_get("id")?,
                project_id: row.try_get("project_id")?,
                kind: parse_column(&row, "type", EnvironmentType::parse)?,
            })
        })
        .transpose()
    }

    async fn get_environment_scope(&self, environment_id: Uuid) -> StoreResult<Option<EnvironmentScope>> {
        let row = sqlx::query(
            "SELECT e.id AS environment_id, p.id AS project_id, p.organization_id \
             FROM environments e JOIN projects p ON p.id = e.project_id WHERE e.id = $1",
        )
        .bind(environment_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| {
            Ok(EnvironmentScope {
                environment_id: row.try_get("environment_id")?,
                project_id: row.try_get("project_id")?,
                organization_id: row.try_get("organization_id")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl TeamStore for PgStore {
    async fn create_team(&self, team: &Team) -> StoreResult<()> {
        sqlx::query("INSERT INTO teams (id, organization_id, name, created_at) VALUES ($1, $2, $3, $4)")
            .bind(team.id)
            .bind(team.organization_id)
            .bind(&team.name)
            .bind(team.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        let row = sqlx::query("SELECT id, organization_id, name, created_at FROM teams WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(team_from_row).transpose()
    }

    async fn find_team_by_name(&self, organization_id: Uuid, name: &str) -> StoreResult<Option<Team>> {
        let row = sqlx::query(
            "SELECT id, organization_id, name, created_at FROM teams WHERE organization_id = $1 AND name = $2",
        )
        .bind(organization_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(team_from_row).transpose()
    }

    async fn list_teams(&self, organization_id: Uuid) -> StoreResult<Vec<Team>> {
        let rows = sqlx::query(
            "SELECT id, organization_id, name, created_at FROM teams WHERE organization_id = $1 ORDER BY created_at, id",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(team_from_row).collect()
    }

    async fn rename_team(&self, id: Uuid, name: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE teams SET name = $2 WHERE id = $1")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("team {}", id)));
        }
        Ok(())
    }

    async fn delete_team(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM teams WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_team_users(&self, team_users: &[TeamUser]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for team_user in team_users {
            sqlx::query("INSERT INTO team_users (team_id, user_id, role) VALUES ($1, $2, $3)")
                .bind(team_user.team_id)
                .bind(team_user.user_id)
                .bind(team_user.role.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove_team_user(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM team_users WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_team_users(&self, team_id: Uuid) -> StoreResult<Vec<TeamUser>> {
        let rows = sqlx::query("SELECT team_id, user_id, role FROM team_users WHERE team_id = $1 ORDER BY user_id")
            .bind(team_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(TeamUser {
                    team_id: row.try_get("team_id")?,
                    user_id: row.try_get("user_id")?,
                    role: parse_column(row, "role", TeamRole::parse)?,
                })
            })
            .collect()
    }

    async fn get_team_role(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<TeamRole>> {
        let row = sqlx::query("SELECT role FROM team_users WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| parse_column(&row, "role", TeamRole::parse)).transpose()
    }

    async fn set_team_projects(&self, team_id: Uuid, projects: &[ProjectTeam]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM project_teams WHERE team_id = $1")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;
        for grant in projects {
            sqlx::query("INSERT INTO project_teams (project_id, team_id, permission) VALUES ($1, $2, $3)")
                .bind(grant.project_id)
                .bind(team_id)
                .bind(grant.permission.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_team_projects(&self, team_id: Uuid) -> StoreResult<Vec<ProjectTeam>> {
        let rows = sqlx::query(
            "SELECT project_id, team_id, permission FROM project_teams WHERE team_id = $1 ORDER BY project_id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(ProjectTeam {
                    project_id: row.try_get("project_id")?,
                    team_id: row.try_get("team_id")?,
                    permission: parse_column(row, "permission", ProjectPermission::parse)?,
                })
            })
            .collect()
    }

    async fn get_project_permission(&self, user_id: Uuid, project_id: Uuid) -> StoreResult<Option<ProjectPermission>> {
        let rows = sqlx::query(
            "SELECT pt.permission FROM project_teams pt \
             JOIN team_users tu ON tu.team_id = pt.team_id \
             WHERE pt.project_id = $1 AND tu.user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        // Permission strings do not sort in privilege order, so reduce in Rust
        let mut highest = None;
        for row in &rows {
            let permission = parse_column(row, "permission", ProjectPermission::parse)?;
            highest = highest.max(Some(permission));
        }
        Ok(highest)
    }
}

#[async_trait]
impl ContactStore for PgStore {
    async fn list_attribute_keys(&self, environment_id: Uuid) -> StoreResult<Vec<ContactAttributeKey>> {
        let rows = sqlx::query(
            "SELECT id, environment_id, key, is_unique, type, created_at FROM contact_attribute_keys \
             WHERE environment_id = $1 ORDER BY created_at, id",
        )
        .bind(environment_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(attribute_key_from_row).collect()
    }

    async fn create_attribute_keys(&self, keys: &[ContactAttributeKey]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for key in keys {
            sqlx::query(
                "INSERT INTO contact_attribute_keys (id, environment_id, key, is_unique, type, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(key.id)
            .bind(key.environment_id)
            .bind(&key.key)
            .bind(key.is_unique)
            .bind(key.kind.as_str())
            .bind(key.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_contacts_by_attribute(
        &self,
        environment_id: Uuid,
        key: &str,
        values: &[String],
    ) -> StoreResult<Vec<Contact>> {
        if values.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT ca.contact_id FROM contact_attributes ca \
             JOIN contact_attribute_keys k ON k.id = ca.attribute_key_id \
             WHERE k.environment_id = $1 AND k.key = $2 AND ca.value = ANY($3)",
        )
        .bind(environment_id)
        .bind(key)
        .bind(values)
        .fetch_all(&self.pool)
        .await?;
        self.load_contacts("c.id = ANY($1)", &ids).await
    }

    async fn apply_contact_writes(&self, environment_id: Uuid, writes: &[ContactWrite]) -> StoreResult<Vec<Contact>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut touched_ids = Vec::with_capacity(writes.len());

        for write in writes {
            match write {
                ContactWrite::Create { attributes } => {
                    let contact_id = Uuid::new_v4();
                    sqlx::query(
                        "INSERT INTO contacts (id, environment_id, created_at, updated_at) VALUES ($1, $2, $3, $3)",
                    )
                    .bind(contact_id)
                    .bind(environment_id)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                    for (key, value) in attributes {
                        insert_attribute(&mut tx, environment_id, contact_id, key, value).await?;
                    }
                    touched_ids.push(contact_id);
                }
                ContactWrite::Update { contact_id, deletes, upserts } => {
                    let updated_at = if write.is_noop() { None } else { Some(now) };
                    let result = sqlx::query(
                        "UPDATE contacts SET updated_at = COALESCE($3, updated_at) WHERE id = $1 AND environment_id = $2",
                    )
                    .bind(contact_id)
                    .bind(environment_id)
                    .bind(updated_at)
                    .execute(&mut *tx)
                    .await?;
                    if result.rows_affected() == 0 {
                        return Err(DatabaseError::NotFound(format!("contact {}", contact_id)));
                    }

                    if !deletes.is_empty() {
                        sqlx::query(
                            "DELETE FROM contact_attributes ca USING contact_attribute_keys k \
                             WHERE ca.attribute_key_id = k.id AND ca.contact_id = $1 AND k.key = ANY($2)",
                        )
                        .bind(contact_id)
                        .bind(deletes)
                        .execute(&mut *tx)
                        .await?;
                    }
                    for (key, value) in upserts {
                        insert_attribute(&mut tx, environment_id, *contact_id, key, value).await?;
                    }
                    touched_ids.push(*contact_id);
                }
            }
        }

        tx.commit().await?;

        let loaded = self.load_contacts("c.id = ANY($1)", &touched_ids).await?;
        let mut by_id: std::collections::HashMap<Uuid, Contact> = loaded.into_iter().map(|c| (c.id, c)).collect();
        Ok(touched_ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn get_contact(&self, id: Uuid) -> StoreResult<Option<Contact>> {
        Ok(self.load_contacts("c.id = ANY($1)", &[id]).await?.into_iter().next())
    }

    async fn list_contacts(&self, environment_id: Uuid, offset: i64, limit: i64) -> StoreResult<Vec<Contact>> {
        let sql = format!(
            "{} WHERE c.environment_id = $1 {} OFFSET $2 LIMIT $3",
            CONTACT_SELECT, CONTACT_GROUP
        );
        let rows = sqlx::query(&sql)
            .bind(environment_id)
            .bind(offset.max(0))
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(contact_from_row).collect()
    }

    async fn delete_contact(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_contacts_matching(&self, environment_id: Uuid, expr: &FilterExpr) -> StoreResult<Vec<Contact>> {
        let (condition, params) = SegmentWhere::generate(expr, 1);
        let sql = format!(
            "WITH matched AS (SELECT c.id FROM contacts c WHERE c.environment_id = $1 AND ({})) \
             {} WHERE c.id IN (SELECT id FROM matched) {}",
            condition, CONTACT_SELECT, CONTACT_GROUP
        );
        tracing::debug!("Segment query: {}", sql);

        let mut q = sqlx::query(&sql).bind(environment_id);
        for param in &params {
            q = bind_sql_param(q, param);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(contact_from_row).collect()
    }
}

#[async_trait]
impl SegmentStore for PgStore {
    async fn create_segment(&self, segment: &Segment) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO segments (id, environment_id, title, description, is_private, filters, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(segment.id)
        .bind(segment.environment_id)
        .bind(&segment.title)
        .bind(&segment.description)
        .bind(segment.is_private)
        .bind(Json(&segment.filters))
        .bind(segment.created_at)
        .bind(segment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_segment(&self, id: Uuid) -> StoreResult<Option<Segment>> {
        let row = sqlx::query("SELECT * FROM segments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(segment_from_row).transpose()
    }

    async fn list_segments(&self, environment_id: Uuid) -> StoreResult<Vec<Segment>> {
        let rows = sqlx::query("SELECT * FROM segments WHERE environment_id = $1 ORDER BY created_at, id")
            .bind(environment_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(segment_from_row).collect()
    }

    async fn update_segment(&self, segment: &Segment) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE segments SET title = $2, description = $3, is_private = $4, filters = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(segment.id)
        .bind(&segment.title)
        .bind(&segment.description)
        .bind(segment.is_private)
        .bind(Json(&segment.filters))
        .bind(segment.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("segment {}", segment.id)));
        }
        Ok(())
    }

    async fn delete_segment(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM segments WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SurveyStore for PgStore {
    async fn create_survey(&self, survey: &Survey, private_segment: Option<&Segment>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        if let Some(segment) = private_segment {
            sqlx::query(
                "INSERT INTO segments (id, environment_id, title, description, is_private, filters, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(segment.id)
            .bind(segment.environment_id)
            .bind(&segment.title)
            .bind(&segment.description)
            .bind(segment.is_private)
            .bind(Json(&segment.filters))
            .bind(segment.created_at)
            .bind(segment.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query(
            "INSERT INTO surveys (id, environment_id, name, status, segment_id, definition, created_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(survey.id)
        .bind(survey.environment_id)
        .bind(&survey.name)
        .bind(survey.status.as_str())
        .bind(survey.segment_id)
        .bind(&survey.definition)
        .bind(survey.created_by)
        .bind(survey.created_at)
        .bind(survey.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_survey(&self, id: Uuid) -> StoreResult<Option<Survey>> {
        let row = sqlx::query("SELECT * FROM surveys WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(survey_from_row).transpose()
    }

    async fn list_surveys(&self, environment_id: Uuid) -> StoreResult<Vec<Survey>> {
        let rows = sqlx::query("SELECT * FROM surveys WHERE environment_id = $1 ORDER BY created_at, id")
            .bind(environment_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(survey_from_row).collect()
    }

    async fn count_surveys_using_segment(&self, segment_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM surveys WHERE segment_id = $1")
            .bind(segment_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl IntegrationStore for PgStore {
    async fn upsert_integration(&self, integration: &Integration) -> StoreResult<Integration> {
        let row = sqlx::query(
            "INSERT INTO integrations (id, environment_id, type, key_ciphertext, user_email, data, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (environment_id, type) DO UPDATE SET \
                key_ciphertext = EXCLUDED.key_ciphertext, \
                user_email = EXCLUDED.user_email, \
                updated_at = EXCLUDED.updated_at \
             RETURNING *",
        )
        .bind(integration.id)
        .bind(integration.environment_id)
        .bind(integration.kind.as_str())
        .bind(&integration.config.key)
        .bind(&integration.config.user_email)
        .bind(&integration.config.data)
        .bind(integration.created_at)
        .bind(integration.updated_at)
        .fetch_one(&self.pool)
        .await?;
        integration_from_row(&row)
    }

    async fn set_integration_data(
        &self,
        environment_id: Uuid,
        kind: IntegrationType,
        data: &serde_json::Value,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Integration>> {
        let row = sqlx::query(
            "UPDATE integrations SET data = $3, updated_at = $4 WHERE environment_id = $1 AND type = $2 RETURNING *",
        )
        .bind(environment_id)
        .bind(kind.as_str())
        .bind(data)
        .bind(updated_at)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(integration_from_row).transpose()
    }

    async fn get_integration_by_type(&self, environment_id: Uuid, kind: IntegrationType) -> StoreResult<Option<Integration>> {
        let row = sqlx::query("SELECT * FROM integrations WHERE environment_id = $1 AND type = $2")
            .bind(environment_id)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(integration_from_row).transpose()
    }

    async fn list_integrations(&self, environment_id: Uuid) -> StoreResult<Vec<Integration>> {
        let rows = sqlx::query("SELECT * FROM integrations WHERE environment_id = $1 ORDER BY created_at, id")
            .bind(environment_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(integration_from_row).collect()
    }

    async fn delete_integration(&self, environment_id: Uuid, kind: IntegrationType) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM integrations WHERE environment_id = $1 AND type = $2")
            .bind(environment_id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ApiKeyStore for PgStore {
    async fn create_api_key(&self, api_key: &ApiKey) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO api_keys (id, organization_id, label, hashed_key, created_by, last_used_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(api_key.id)
        .bind(api_key.organization_id)
        .bind(&api_key.label)
        .bind(&api_key.hashed_key)
        .bind(api_key.created_by)
        .bind(api_key.last_used_at)
        .bind(api_key.created_at)
        .execute(&mut *tx)
        .await?;
        for grant in &api_key.environment_permissions {
            sqlx::query("INSERT INTO api_key_environments (api_key_id, environment_id, permission) VALUES ($1, $2, $3)")
                .bind(api_key.id)
                .bind(grant.environment_id)
                .bind(grant.permission.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_api_key(&self, id: Uuid) -> StoreResult<Option<ApiKey>> {
        let sql = format!("{} WHERE a.id = $1 GROUP BY a.id", API_KEY_SELECT);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(api_key_from_row).transpose()
    }

    async fn list_api_keys(&self, organization_id: Uuid) -> StoreResult<Vec<ApiKey>> {
        let sql = format!(
            "{} WHERE a.organization_id = $1 GROUP BY a.id ORDER BY a.created_at, a.id",
            API_KEY_SELECT
        );
        let rows = sqlx::query(&sql).bind(organization_id).fetch_all(&self.pool).await?;
        rows.iter().map(api_key_from_row).collect()
    }

    async fn find_api_key_by_hash(&self, hashed_key: &str) -> StoreResult<Option<ApiKey>> {
        let sql = format!("{} WHERE a.hashed_key = $1 GROUP BY a.id", API_KEY_SELECT);
        let row = sqlx::query(&sql).bind(hashed_key).fetch_optional(&self.pool).await?;
        row.as_ref().map(api_key_from_row).transpose()
    }

    async fn touch_api_key(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_api_key(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
