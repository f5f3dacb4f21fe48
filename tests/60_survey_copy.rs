mod common;

use anyhow::Result;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn copies_report_an_overall_toast() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;
    let survey = server
        .ok(ws.owner, "createSurvey", json!({ "environmentId": ws.production, "name": "NPS" }))
        .await?;
    let survey_id = common::id_of(&survey)?;

    let summary = server
        .ok(
            ws.owner,
            "copySurveyToOtherEnvironments",
            json!({
                "environmentId": ws.production,
                "surveyId": survey_id,
                "targets": [{ "environmentId": ws.production }, { "environmentId": ws.development }]
            }),
        )
        .await?;
    assert_eq!(summary["toast"], "copy_survey_success");
    assert_eq!(summary["successCount"], 2);

    let dev_surveys = server
        .ok(ws.owner, "getSurveys", json!({ "environmentId": ws.development }))
        .await?;
    assert_eq!(dev_surveys[0]["name"], "NPS (copy)");
    assert_eq!(dev_surveys[0]["status"], "draft");

    let summary = server
        .ok(
            ws.owner,
            "copySurveyToOtherEnvironments",
            json!({
                "environmentId": ws.production,
                "surveyId": survey_id,
                "targets": [{ "environmentId": ws.development }, { "environmentId": Uuid::new_v4() }]
            }),
        )
        .await?;
    assert_eq!(summary["toast"], "copy_survey_partially_success");
    assert_eq!(summary["errorCount"], 1);
    Ok(())
}

#[tokio::test]
async fn targets_in_another_organization_fail_individually() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;
    let other = common::workspace(&server).await?;
    let survey = server
        .ok(ws.owner, "createSurvey", json!({ "environmentId": ws.production, "name": "CSAT" }))
        .await?;

    let summary = server
        .ok(
            ws.owner,
            "copySurveyToOtherEnvironments",
            json!({
                "environmentId": ws.production,
                "surveyId": common::id_of(&survey)?,
                "targets": [{ "environmentId": other.production }]
            }),
        )
        .await?;
    assert_eq!(summary["outcome"], "error");
    assert_eq!(summary["toast"], "copy_survey_error");

    let untouched = server
        .ok(other.owner, "getSurveys", json!({ "environmentId": other.production }))
        .await?;
    assert_eq!(untouched, json!([]));
    Ok(())
}
