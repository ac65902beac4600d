// handlers/public/users.rs - POST /v1/users and PUT /v1/users/activated handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use tracing::{error, info};

use crate::auth::password::hash_password;
use crate::auth::{AuthError, TOKEN_LEN};
use crate::database::models::permission::MOVIES_READ;
use crate::database::models::user::{validate_email, validate_name, validate_password_plaintext};
use crate::database::models::{NewUser, TokenScope, User};
use crate::error::ApiError;
use crate::mailer::{send_with_retry, Template};
use crate::middleware::{ApiResponse, ApiResult};
use crate::validator::Validator;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/**
 * POST /v1/users - Register a new user account
 *
 * The account starts inactive and holds `movies:read`. An activation token is
 * issued and mailed from a background task, so the response does not wait on
 * delivery.
 *
 * Expected Input:
 * ```json
 * {
 *   "name": "string",      // Required: at most 500 bytes
 *   "email": "string",     // Required: unique, case-insensitive
 *   "password": "string"   // Required: 8 to 72 bytes
 * }
 * ```
 *
 * @returns 202 with the new user's public fields, 422 on validation failure
 *          or duplicate email
 */
pub async fn register_post(
    State(state): State<AppState>,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> ApiResult<User> {
    let Json(input) = payload?;

    let mut v = Validator::new();
    validate_name(&mut v, &input.name);
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, &input.password);
    if !v.valid() {
        return Err(ApiError::failed_validation(v.into_errors()));
    }

    let password_hash = hash_password(input.password).await?;
    let user = state
        .store
        .insert_user(NewUser {
            name: input.name,
            email: input.email,
            password_hash,
        })
        .await?;

    state.store.add_permissions(user.id, &[MOVIES_READ]).await?;

    let issued = state
        .tokens
        .issue(
            user.id,
            TokenScope::Activation,
            state.config.tokens.activation_ttl(),
        )
        .await?;

    let email = Template::UserWelcome {
        user_id: user.id,
        name: user.name.clone(),
        activation_token: issued.plaintext,
    }
    .render(&state.config.mailer.sender, &user.email);

    let mailer = state.mailer.clone();
    state.spawn_background("welcome_email", async move {
        if let Err(e) = send_with_retry(mailer.as_ref(), &email).await {
            error!(to = %email.to, "failed to send welcome email: {}", e);
        }
    });

    info!(user_id = user.id, "user registered");
    Ok(ApiResponse::accepted(user))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivateInput {
    pub token: String,
}

/**
 * PUT /v1/users/activated - Activate an account with its one-time token
 *
 * Expected Input:
 * ```json
 * { "token": "string" }   // Required: the 22-character activation token
 * ```
 *
 * @returns 200 with the activated user, 422 when the token is malformed,
 *          unknown, expired or already used
 */
pub async fn activate_put(
    State(state): State<AppState>,
    payload: Result<Json<ActivateInput>, JsonRejection>,
) -> ApiResult<User> {
    let Json(input) = payload?;

    let mut v = Validator::new();
    v.check(!input.token.is_empty(), "token", "must be provided");
    v.check(input.token.len() == TOKEN_LEN, "token", "must be 22 bytes long");
    if !v.valid() {
        return Err(ApiError::failed_validation(v.into_errors()));
    }

    match state.tokens.consume_activation(&input.token).await {
        Ok(user) => {
            info!(user_id = user.id, "user activated");
            Ok(ApiResponse::success(user))
        }
        Err(AuthError::InvalidToken | AuthError::ExpiredToken) => Err(ApiError::field_error(
            "token",
            "invalid or expired activation token",
        )),
        Err(e) => Err(e.into()),
    }
}
