mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn outsiders_are_refused_before_anything_is_written() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;
    let outsider = Uuid::new_v4();

    let (status, body) = server
        .action(
            outsider,
            "createSegment",
            json!({ "environmentId": ws.production, "title": "Pros" }),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Not authorized");

    let segments = server
        .ok(ws.owner, "getSegments", json!({ "environmentId": ws.production }))
        .await?;
    assert_eq!(segments, json!([]));
    Ok(())
}

#[tokio::test]
async fn any_matching_rule_grants_access() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;

    // Manager passes through the organization rule
    let manager = ws.member(&server, "manager").await?;
    server
        .ok(manager, "createSegment", json!({ "environmentId": ws.production, "title": "A" }))
        .await?;

    // Plain member passes through a project team rule
    let writer = ws.project_member(&server, "readWrite").await?;
    server
        .ok(writer, "createSegment", json!({ "environmentId": ws.production, "title": "B" }))
        .await?;

    // Read grant satisfies read actions only
    let reader = ws.project_member(&server, "read").await?;
    server
        .ok(reader, "getSegments", json!({ "environmentId": ws.production }))
        .await?;
    let (status, _) = server
        .action(reader, "createSegment", json!({ "environmentId": ws.production, "title": "C" }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Member without any grant
    let member = ws.member(&server, "member").await?;
    let (status, _) = server
        .action(member, "getSegments", json!({ "environmentId": ws.production }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn unknown_environments_are_not_found() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;

    let (status, _) = server
        .action(ws.owner, "getContacts", json!({ "environmentId": Uuid::new_v4() }))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
