// handlers/public/tokens.rs - POST /v1/tokens/authentication handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::password::{verify_against_placeholder, verify_password};
use crate::auth::AuthError;
use crate::database::models::user::{validate_email, validate_password_plaintext};
use crate::database::models::TokenScope;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::validator::Validator;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthenticationToken {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

/**
 * POST /v1/tokens/authentication - Exchange credentials for a bearer token
 *
 * Unknown email and wrong password produce the same 401 so callers cannot
 * probe which accounts exist. Inactive accounts still receive a token; the
 * permission guard turns them away on protected routes.
 *
 * Expected Input:
 * ```json
 * {
 *   "email": "string",
 *   "password": "string"
 * }
 * ```
 *
 * @returns 201 with `{token, expiry}`
 */
pub async fn authentication_token_post(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsInput>, JsonRejection>,
) -> ApiResult<AuthenticationToken> {
    let Json(input) = payload?;

    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, &input.password);
    if !v.valid() {
        return Err(ApiError::failed_validation(v.into_errors()));
    }

    // Unknown emails still cost one bcrypt verify.
    let Some(user) = state.store.get_user_by_email(&input.email).await? else {
        verify_against_placeholder(input.password).await?;
        return Err(AuthError::InvalidCredentials.into());
    };

    if !verify_password(input.password, user.password_hash.clone()).await? {
        debug!(user_id = user.id, "password mismatch");
        return Err(AuthError::InvalidCredentials.into());
    }

    let issued = state
        .tokens
        .issue(
            user.id,
            TokenScope::Authentication,
            state.config.tokens.authentication_ttl(),
        )
        .await?;

    Ok(ApiResponse::created(AuthenticationToken {
        token: issued.plaintext,
        expiry: issued.record.expiry,
    }))
}
