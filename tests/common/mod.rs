#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use formbricks_api_rust::auth::generate_jwt;
use formbricks_api_rust::config::AppConfig;
use formbricks_api_rust::database::MemoryStore;
use formbricks_api_rust::state::AppState;

/// Server bound to an ephemeral port over an in-memory store
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    client: reqwest::Client,
}

pub async fn spawn_server() -> Result<TestServer> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let state = AppState::new(Arc::new(MemoryStore::new()), AppConfig::development())?;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let base_url = format!("http://{}", listener.local_addr()?);

    let app = formbricks_api_rust::app(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(TestServer {
        base_url,
        state,
        client: reqwest::Client::new(),
    })
}

impl TestServer {
    pub fn token_for(&self, user_id: Uuid) -> String {
        generate_jwt(&self.state.config.security, user_id, None).expect("development secret signs tokens")
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// POST /api/actions/:name as `user_id`, returning status and parsed body
    pub async fn action(&self, user_id: Uuid, name: &str, input: Value) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .post(format!("{}/api/actions/{}", self.base_url, name))
            .bearer_auth(self.token_for(user_id))
            .json(&input)
            .send()
            .await?;
        let status = res.status();
        let body = res.json::<Value>().await?;
        Ok((status, body))
    }

    /// Run an action that must succeed and return its `data`
    pub async fn ok(&self, user_id: Uuid, name: &str, input: Value) -> Result<Value> {
        let (status, body) = self.action(user_id, name, input).await?;
        if status != StatusCode::OK {
            anyhow::bail!("{} failed with {}: {}", name, status, body);
        }
        Ok(body["data"].clone())
    }
}

/// Organization with one project, created through the API by `owner`
pub struct Workspace {
    pub owner: Uuid,
    pub organization_id: Uuid,
    pub project_id: Uuid,
    pub production: Uuid,
    pub development: Uuid,
}

fn uuid_at(value: &Value, pointer: &str) -> Result<Uuid> {
    let raw = value
        .pointer(pointer)
        .and_then(Value::as_str)
        .with_context(|| format!("missing {} in {}", pointer, value))?;
    Ok(raw.parse()?)
}

pub async fn workspace(server: &TestServer) -> Result<Workspace> {
    let owner = Uuid::new_v4();
    let organization = server.ok(owner, "createOrganization", json!({ "name": "Acme" })).await?;
    let organization_id = uuid_at(&organization, "/id")?;

    let project = server
        .ok(
            owner,
            "createProject",
            json!({ "organizationId": organization_id, "name": "Website" }),
        )
        .await?;

    Ok(Workspace {
        owner,
        organization_id,
        project_id: uuid_at(&project, "/id")?,
        production: uuid_at(&project, "/environments/0/id")?,
        development: uuid_at(&project, "/environments/1/id")?,
    })
}

impl Workspace {
    /// New user with an organization role
    pub async fn member(&self, server: &TestServer, role: &str) -> Result<Uuid> {
        let user = Uuid::new_v4();
        server
            .ok(
                self.owner,
                "addMembership",
                json!({ "organizationId": self.organization_id, "userId": user, "role": role }),
            )
            .await?;
        Ok(user)
    }

    /// New member reaching the project through a team grant
    pub async fn project_member(&self, server: &TestServer, permission: &str) -> Result<Uuid> {
        let user = self.member(server, "member").await?;
        let team = server
            .ok(
                self.owner,
                "createTeam",
                json!({ "organizationId": self.organization_id, "name": format!("team-{}", user.simple()) }),
            )
            .await?;
        let team_id = uuid_at(&team, "/id")?;
        server
            .ok(
                self.owner,
                "addTeamMembers",
                json!({ "teamId": team_id, "members": [{ "userId": user, "role": "contributor" }] }),
            )
            .await?;
        server
            .ok(
                self.owner,
                "updateTeam",
                json!({ "teamId": team_id, "projects": [{ "projectId": self.project_id, "permission": permission }] }),
            )
            .await?;
        Ok(user)
    }
}

pub fn id_of(value: &Value) -> Result<Uuid> {
    uuid_at(value, "/id")
}
