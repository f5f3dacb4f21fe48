mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn team_admins_manage_members_but_not_the_team() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;
    let lead = ws.member(&server, "member").await?;
    let newcomer = ws.member(&server, "member").await?;

    let team = server
        .ok(ws.owner, "createTeam", json!({ "organizationId": ws.organization_id, "name": "Growth" }))
        .await?;
    let team_id = common::id_of(&team)?;
    server
        .ok(
            ws.owner,
            "addTeamMembers",
            json!({ "teamId": team_id, "members": [{ "userId": lead, "role": "admin" }] }),
        )
        .await?;

    server
        .ok(
            lead,
            "addTeamMembers",
            json!({ "teamId": team_id, "members": [{ "userId": newcomer, "role": "contributor" }] }),
        )
        .await?;
    let details = server.ok(lead, "getTeamDetails", json!({ "teamId": team_id })).await?;
    assert_eq!(details["members"].as_array().map(Vec::len), Some(2));

    let (status, _) = server
        .action(lead, "updateTeam", json!({ "teamId": team_id, "name": "Renamed" }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server
        .action(newcomer, "removeTeamMember", json!({ "teamId": team_id, "userId": lead }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    server
        .ok(lead, "removeTeamMember", json!({ "teamId": team_id, "userId": newcomer }))
        .await?;
    let details = server.ok(ws.owner, "getTeamDetails", json!({ "teamId": team_id })).await?;
    assert_eq!(details["members"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn team_names_are_unique_per_organization() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;
    let input = json!({ "organizationId": ws.organization_id, "name": "Growth" });

    server.ok(ws.owner, "createTeam", input.clone()).await?;
    let (status, body) = server.action(ws.owner, "createTeam", input).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field_errors"]["name"], "Team name already exists");
    Ok(())
}

#[tokio::test]
async fn only_organization_members_can_join_teams() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;
    let team = server
        .ok(ws.owner, "createTeam", json!({ "organizationId": ws.organization_id, "name": "Ops" }))
        .await?;

    let (status, _) = server
        .action(
            ws.owner,
            "addTeamMembers",
            json!({ "teamId": common::id_of(&team)?, "members": [{ "userId": Uuid::new_v4(), "role": "contributor" }] }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn listing_a_member_twice_is_rejected_before_any_write() -> Result<()> {
    let server = common::spawn_server().await?;
    let ws = common::workspace(&server).await?;
    let member = ws.member(&server, "member").await?;
    let team = server
        .ok(ws.owner, "createTeam", json!({ "organizationId": ws.organization_id, "name": "Ops" }))
        .await?;
    let team_id = common::id_of(&team)?;
    server.ok(ws.owner, "getTeamDetails", json!({ "teamId": team_id })).await?;

    let (status, body) = server
        .action(
            ws.owner,
            "addTeamMembers",
            json!({
                "teamId": team_id,
                "members": [
                    { "userId": member, "role": "contributor" },
                    { "userId": member, "role": "admin" }
                ]
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field_errors"]["members[1].userId"], "User is listed twice");

    let details = server.ok(ws.owner, "getTeamDetails", json!({ "teamId": team_id })).await?;
    assert_eq!(details["members"].as_array().map(Vec::len), Some(0));
    Ok(())
}
