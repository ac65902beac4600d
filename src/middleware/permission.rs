use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use super::auth::Identity;
use crate::auth::AuthError;
use crate::database::Store;
use crate::error::ApiError;
use crate::AppState;

#[derive(Clone)]
struct PermissionGuard {
    state: AppState,
    code: &'static str,
}

/// Wrap `route` so that it only runs for an activated user holding `code`.
pub fn require_permission(
    state: &AppState,
    code: &'static str,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    let guard = PermissionGuard {
        state: state.clone(),
        code,
    };
    route.route_layer(middleware::from_fn_with_state(guard, enforce))
}

async fn enforce(
    State(guard): State<PermissionGuard>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    check_permission(
        guard.state.store.as_ref(),
        request.extensions().get::<Identity>(),
        guard.code,
    )
    .await?;
    Ok(next.run(request).await)
}

/// Anonymous → `AuthenticationRequired`; inactive → `AccountNotActivated`;
/// lacking `code` → `PermissionDenied`.
pub async fn check_permission(
    store: &dyn Store,
    identity: Option<&Identity>,
    code: &str,
) -> Result<(), AuthError> {
    let user = identity
        .and_then(Identity::user)
        .ok_or(AuthError::AuthenticationRequired)?;

    if !user.activated {
        return Err(AuthError::AccountNotActivated);
    }

    let permissions = store.get_permissions(user.id).await?;
    if !permissions.includes(code) {
        return Err(AuthError::PermissionDenied);
    }
    Ok(())
}
