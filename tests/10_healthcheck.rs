mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

use common::TestServer;

#[tokio::test]
async fn healthcheck_reports_available() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.client.get(server.url("/v1/healthcheck")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "available");
    assert_eq!(body["data"]["system_info"]["environment"], "development");
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_json_404() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.client.get(server.url("/v1/nothing-here")).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body: Value = res.json().await?;
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn wrong_method_is_json_405_with_allow() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.client.delete(server.url("/v1/healthcheck")).send().await?;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(res.headers().contains_key("allow"));

    let body: Value = res.json().await?;
    assert_eq!(body["code"], "METHOD_NOT_ALLOWED");
    Ok(())
}

#[tokio::test]
async fn debug_vars_needs_metrics_view() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.client.get(server.url("/debug/vars")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let token = server.user_with("ops@example.com", &["metrics:view"]).await?;
    let res = server
        .client
        .get(server.url("/debug/vars"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    let data = &body["data"];
    assert!(data["total_requests_received"].as_u64().unwrap_or(0) >= 2);
    assert!(data["total_responses_sent_by_status"]["401"].as_u64().unwrap_or(0) >= 1);
    assert!(data.get("total_processing_time_μs").is_some());
    assert!(data["version"].is_string());
    Ok(())
}
