mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};

use common::TestServer;

async fn trusting(origin: &str) -> Result<TestServer> {
    let origin = origin.to_string();
    TestServer::start_with(move |config| config.cors.trusted_origins = vec![origin]).await
}

#[tokio::test]
async fn preflight_from_trusted_origin_is_answered() -> Result<()> {
    let server = trusting("https://reel.example.com").await?;

    let res = server
        .client
        .request(Method::OPTIONS, server.url("/v1/movies/1"))
        .header("Origin", "https://reel.example.com")
        .header("Access-Control-Request-Method", "PATCH")
        .header("Access-Control-Request-Headers", "authorization, content-type")
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()["access-control-allow-origin"],
        "https://reel.example.com"
    );
    let methods = res.headers()["access-control-allow-methods"].to_str()?;
    assert!(methods.contains("PATCH"));
    Ok(())
}

#[tokio::test]
async fn untrusted_origin_gets_no_cors_headers() -> Result<()> {
    let server = trusting("https://reel.example.com").await?;

    let res = server
        .client
        .get(server.url("/v1/healthcheck"))
        .header("Origin", "https://evil.example.com")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!res.headers().contains_key("access-control-allow-origin"));
    Ok(())
}

#[tokio::test]
async fn empty_origin_list_disables_cors() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .client
        .get(server.url("/v1/healthcheck"))
        .header("Origin", "https://reel.example.com")
        .send()
        .await?;
    assert!(!res.headers().contains_key("access-control-allow-origin"));
    Ok(())
}
