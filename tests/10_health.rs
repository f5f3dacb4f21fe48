mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = server.client().get(format!("{}/health", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn actions_require_a_session_token() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = server
        .client()
        .post(format!("{}/api/actions/createOrganization", server.base_url))
        .json(&json!({ "name": "Acme" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server
        .client()
        .post(format!("{}/api/actions/createOrganization", server.base_url))
        .bearer_auth("not-a-token")
        .json(&json!({ "name": "Acme" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn unknown_actions_and_bad_input_are_rejected() -> Result<()> {
    let server = common::spawn_server().await?;
    let user = uuid::Uuid::new_v4();

    let (status, body) = server.action(user, "dropEverything", json!({})).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = server.action(user, "createOrganization", json!({ "name": "  " })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field_errors"]["name"], "must not be empty");

    let (status, _) = server.action(user, "createOrganization", json!({ "title": "Acme" })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}
