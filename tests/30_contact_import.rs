mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

fn attributes_of(contacts: &Value, email: &str) -> Value {
    contacts
        .as_array()
        .into_iter()
        .flatten()
        .find(|c| c["attributes"]["email"] == email)
        .map(|c| c["attributes"].clone())
        .unwrap_or(Value::Null)
}

#[tokio::test]
async fn duplicate_policies_control_existing_contacts() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;

    let first = server
        .ok(
            ws.owner,
            "importContacts",
            json!({
                "environmentId": ws.production,
                "duplicatePolicy": "skip",
                "rows": [
                    { "email": "ada@example.com", "plan": "free", "firstName": "Ada" },
                    { "email": "bob@example.com", "plan": "pro" }
                ]
            }),
        )
        .await?;
    assert_eq!(first.as_array().map(Vec::len), Some(2));

    // Skip leaves ada alone and leaves her out of the result
    let skipped = server
        .ok(
            ws.owner,
            "importContacts",
            json!({
                "environmentId": ws.production,
                "duplicatePolicy": "skip",
                "rows": [{ "email": "ada@example.com", "plan": "pro" }]
            }),
        )
        .await?;
    assert_eq!(skipped, json!([]));

    // Update only fills keys the contact does not have yet
    let updated = server
        .ok(
            ws.owner,
            "importContacts",
            json!({
                "environmentId": ws.production,
                "duplicatePolicy": "update",
                "rows": [{ "email": "ada@example.com", "plan": "pro", "company": "Acme" }]
            }),
        )
        .await?;
    let ada = attributes_of(&updated, "ada@example.com");
    assert_eq!(ada["plan"], "free");
    assert_eq!(ada["company"], "Acme");
    assert_eq!(ada["firstName"], "Ada");

    // Overwrite replaces incoming keys and keeps the rest
    let overwritten = server
        .ok(
            ws.owner,
            "importContacts",
            json!({
                "environmentId": ws.production,
                "duplicatePolicy": "overwrite",
                "rows": [{ "email": "ada@example.com", "plan": "enterprise" }]
            }),
        )
        .await?;
    let ada = attributes_of(&overwritten, "ada@example.com");
    assert_eq!(ada["plan"], "enterprise");
    assert_eq!(ada["company"], "Acme");

    let all = server
        .ok(ws.owner, "getContacts", json!({ "environmentId": ws.production }))
        .await?;
    assert_eq!(all.as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn invalid_rows_reject_the_whole_upload() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;

    let (status, body) = server
        .action(
            ws.owner,
            "importContacts",
            json!({
                "environmentId": ws.production,
                "duplicatePolicy": "update",
                "rows": [
                    { "email": "ok@example.com" },
                    { "plan": "pro" }
                ]
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["rows[1].email"].is_string());

    let all = server
        .ok(ws.owner, "getContacts", json!({ "environmentId": ws.production }))
        .await?;
    assert_eq!(all, json!([]));
    Ok(())
}

#[tokio::test]
async fn columns_can_be_mapped_to_attribute_keys() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;

    let imported = server
        .ok(
            ws.owner,
            "importContacts",
            json!({
                "environmentId": ws.production,
                "duplicatePolicy": "skip",
                "attributeMap": { "E-Mail": "email", "Vorname": "firstName" },
                "rows": [{ "E-Mail": " grace@example.com ", "Vorname": "Grace", "Notes": "" }]
            }),
        )
        .await?;
    let grace = attributes_of(&imported, "grace@example.com");
    assert_eq!(grace["firstName"], "Grace");
    assert!(grace.get("Notes").is_none());
    Ok(())
}
