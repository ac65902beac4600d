use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, error};

use crate::error::ApiError;
use crate::services::Decision;
use crate::AppState;

/// Per-client token bucket admission.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.limiter.enabled() {
        return next.run(request).await;
    }

    let Some(client) = client_ip(&request, state.config.limiter.trust_proxy_headers) else {
        error!("unable to determine client address for rate limiting");
        return ApiError::server_error().into_response();
    };

    match state.limiter.check(client) {
        Decision::Allowed => next.run(request).await,
        Decision::Denied { retry_after } => {
            debug!(client = %client, ?retry_after, "rate limit exceeded");
            ApiError::too_many_requests("rate limit exceeded", retry_after).into_response()
        }
    }
}

/// The peer address of the connection, or the first forwarded address when
/// proxy headers are trusted and present.
pub fn client_ip(request: &Request, trust_proxy_headers: bool) -> Option<IpAddr> {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(request.headers()) {
            return Some(ip);
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let first_forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());

    first_forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    })
}
