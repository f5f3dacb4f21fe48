mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

fn plan_filter(plan: &str) -> Value {
    json!([{
        "connector": null,
        "resource": {
            "root": { "type": "attribute", "contactAttributeKey": "plan" },
            "value": plan,
            "qualifier": { "operator": "equals" }
        }
    }])
}

async fn seed(server: &common::TestServer, ws: &common::Workspace) -> Result<(Uuid, Uuid, Uuid)> {
    server
        .ok(
            ws.owner,
            "importContacts",
            json!({
                "environmentId": ws.production,
                "duplicatePolicy": "skip",
                "rows": [
                    { "email": "ada@example.com", "plan": "pro", "firstName": "Ada" },
                    { "email": "bob@example.com", "plan": "free" }
                ]
            }),
        )
        .await?;
    let pros = server
        .ok(
            ws.owner,
            "createSegment",
            json!({ "environmentId": ws.production, "title": "Pros", "filters": plan_filter("pro") }),
        )
        .await?;
    let nobody = server
        .ok(
            ws.owner,
            "createSegment",
            json!({ "environmentId": ws.production, "title": "Nobody", "filters": plan_filter("gold") }),
        )
        .await?;
    let survey = server
        .ok(ws.owner, "createSurvey", json!({ "environmentId": ws.production, "name": "NPS" }))
        .await?;
    Ok((common::id_of(&survey)?, common::id_of(&pros)?, common::id_of(&nobody)?))
}

#[tokio::test]
async fn links_are_generated_for_matching_contacts_and_resolve() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;
    let (survey, pros, _) = seed(&server, &ws).await?;

    let links = server
        .ok(
            ws.owner,
            "generatePersonalLinks",
            json!({ "environmentId": ws.production, "surveyId": survey, "segmentId": pros, "expirationDays": 7 }),
        )
        .await?;
    let links = links.as_array().cloned().unwrap_or_default();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0]["email"], "ada@example.com");
    assert_eq!(links[0]["firstName"], "Ada");
    assert_eq!(links[0]["expirationDays"], 7);

    let url = links[0]["surveyUrl"].as_str().unwrap_or_default();
    let token = url.rsplit("/c/").next().unwrap_or_default();
    let res = server.client().get(format!("{}/c/{}", server.base_url, token)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["surveyId"], json!(survey));
    assert_eq!(body["data"]["contactId"], links[0]["contactId"]);
    Ok(())
}

#[tokio::test]
async fn no_match_is_an_empty_list_and_failure_is_null() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;
    let (survey, _, nobody) = seed(&server, &ws).await?;

    let (status, body) = server
        .action(
            ws.owner,
            "generatePersonalLinks",
            json!({ "environmentId": ws.production, "surveyId": survey, "segmentId": nobody }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    let (status, body) = server
        .action(
            ws.owner,
            "generatePersonalLinks",
            json!({ "environmentId": ws.production, "surveyId": survey, "segmentId": Uuid::new_v4() }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());
    Ok(())
}

#[tokio::test]
async fn tampered_links_are_rejected() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = server
        .client()
        .get(format!("{}/c/not.a.token", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(body["field_errors"]["token"], "This link is invalid");
    Ok(())
}
