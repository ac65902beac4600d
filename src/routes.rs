use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::config::CorsConfig;
use crate::database::models::permission::{METRICS_VIEW, MOVIES_READ, MOVIES_WRITE};
use crate::handlers::{self, protected, public};
use crate::middleware::{authenticate, handle_panic, rate_limit, require_permission, track_metrics};
use crate::AppState;

/// Largest request body accepted by any handler.
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Build the full application: route table wrapped in the request pipeline.
///
/// Outermost first: trace span, metrics, panic recovery, CORS, rate limiting,
/// authentication, then route dispatch with per-route permission guards.
pub fn app(state: AppState) -> Router {
    let router = routes(&state)
        .fallback(handlers::not_found)
        .layer(middleware::map_response(handlers::method_not_allowed))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    let router = match cors_layer(&state.config.cors) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_metrics,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                user_id = tracing::field::Empty,
            )
        }))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Public
        .route("/v1/healthcheck", get(public::healthcheck_get))
        .route("/v1/users", post(public::register_post))
        .route("/v1/users/activated", put(public::activate_put))
        .route(
            "/v1/tokens/authentication",
            post(public::authentication_token_post),
        )
        // Protected
        .route(
            "/v1/movies",
            require_permission(state, MOVIES_READ, get(protected::movies_get))
                .merge(require_permission(state, MOVIES_WRITE, post(protected::movies_post))),
        )
        .route(
            "/v1/movies/:id",
            require_permission(state, MOVIES_READ, get(protected::movie_get))
                .merge(require_permission(state, MOVIES_WRITE, patch(protected::movie_patch)))
                .merge(require_permission(
                    state,
                    MOVIES_WRITE,
                    axum::routing::delete(protected::movie_delete),
                )),
        )
        .route(
            "/debug/vars",
            require_permission(state, METRICS_VIEW, get(protected::debug_vars_get)),
        )
}

/// CORS for the configured trusted origins only; `None` when the list is
/// empty, which leaves responses without any CORS headers.
fn cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = config
        .trusted_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid trusted origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::OPTIONS, Method::PUT, Method::PATCH, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}
