use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::AuthError;
use crate::database::models::User;
use crate::error::ApiError;
use crate::services::TokenService;
use crate::AppState;

/// Who is making the current request. Always present in request extensions
/// once the authenticator has run.
#[derive(Clone, Debug)]
pub enum Identity {
    Anonymous,
    User(User),
}

impl Identity {
    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::User(user) => Some(user),
        }
    }
}

/// Bearer token authentication middleware.
///
/// No `Authorization` header means [`Identity::Anonymous`]; whether that is
/// acceptable is decided per route by the permission guard. A header that is
/// present but malformed, unknown or expired ends the request with 401.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match resolve_identity(&state.tokens, request.headers()).await {
        Ok(identity) => identity,
        Err(e) => return vary_on_authorization(ApiError::from(e).into_response()),
    };

    if let Identity::User(user) = &identity {
        tracing::Span::current().record("user_id", user.id);
    }
    request.extensions_mut().insert(identity);

    vary_on_authorization(next.run(request).await)
}

async fn resolve_identity(tokens: &TokenService, headers: &HeaderMap) -> Result<Identity, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(Identity::Anonymous);
    };
    let token = parse_bearer(value)?;
    let user = tokens.authenticate(token).await?;
    Ok(Identity::User(user))
}

/// Accepts exactly `Bearer <token>`: the scheme, one space, then a non-empty
/// token with no whitespace in it.
pub fn parse_bearer(value: &HeaderValue) -> Result<&str, AuthError> {
    let value = value.to_str().map_err(|_| AuthError::MalformedAuthHeader)?;
    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthError::MalformedAuthHeader)?;

    if scheme != "Bearer" || token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::MalformedAuthHeader);
    }
    Ok(token)
}

fn vary_on_authorization(mut response: Response) -> Response {
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}
