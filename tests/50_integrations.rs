mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn reconnecting_keeps_channel_mappings() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;

    let connected = server
        .ok(
            ws.owner,
            "connectIntegration",
            json!({ "environmentId": ws.production, "type": "slack", "key": "xoxb-1", "userEmail": "ops@example.com" }),
        )
        .await?;
    assert_eq!(connected["config"]["data"], json!([]));
    assert!(connected["config"].get("key").is_none());

    let mapping = json!([{ "channelId": "C1", "surveyIds": ["s1"] }]);
    server
        .ok(
            ws.owner,
            "updateIntegrationData",
            json!({ "environmentId": ws.production, "type": "slack", "data": mapping }),
        )
        .await?;

    let reconnected = server
        .ok(
            ws.owner,
            "connectIntegration",
            json!({ "environmentId": ws.production, "type": "slack", "key": "xoxb-2" }),
        )
        .await?;
    assert_eq!(reconnected["config"]["data"], mapping);
    assert_eq!(reconnected["id"], connected["id"]);

    let listed = server
        .ok(ws.owner, "getIntegrations", json!({ "environmentId": ws.production }))
        .await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn credentials_are_only_readable_by_the_server() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;

    server
        .ok(
            ws.owner,
            "connectIntegration",
            json!({ "environmentId": ws.production, "type": "plain", "key": "plain-secret" }),
        )
        .await?;

    let plaintext = server
        .state
        .integrations()
        .decrypt_credential(ws.production, formbricks_api_rust::models::IntegrationType::Plain)
        .await?;
    assert_eq!(plaintext, "plain-secret");
    Ok(())
}

#[tokio::test]
async fn disconnecting_requires_write_access_and_an_existing_integration() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;
    let reader = ws.project_member(&server, "read").await?;

    server
        .ok(
            ws.owner,
            "connectIntegration",
            json!({ "environmentId": ws.production, "type": "slack", "key": "xoxb" }),
        )
        .await?;

    let input = json!({ "environmentId": ws.production, "type": "slack" });
    let (status, _) = server.action(reader, "disconnectIntegration", input.clone()).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    server.ok(ws.owner, "disconnectIntegration", input.clone()).await?;
    let (status, _) = server.action(ws.owner, "disconnectIntegration", input).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
