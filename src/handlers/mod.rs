// handlers/mod.rs - Two-tier handler layout
//
// Public (no permission required) → Protected (guarded per route by
// `require_permission`). Both tiers sit behind the rate limiter and the
// authenticator; only the protected tier looks at the resulting identity.
pub mod protected;
pub mod public;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Fallback for unknown paths.
pub async fn not_found() -> ApiError {
    ApiError::not_found("the requested resource could not be found")
}

/// Give axum's bare 405 the JSON error envelope, keeping its `Allow` header.
pub async fn method_not_allowed(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED
        || response.headers().contains_key(header::CONTENT_TYPE)
    {
        return response;
    }

    let allow = response.headers().get(header::ALLOW).cloned();
    let mut replaced =
        ApiError::method_not_allowed("the method is not supported for this resource")
            .into_response();
    if let Some(allow) = allow {
        replaced.headers_mut().insert(header::ALLOW, allow);
    }
    replaced
}

/// Positive integer id from a path segment; anything else is a 404.
pub fn read_id_param(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::not_found(
            "the requested resource could not be found",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_param_must_be_a_positive_integer() {
        assert_eq!(read_id_param("42").unwrap(), 42);
        for bad in ["0", "-1", "abc", "1.5", ""] {
            assert_eq!(read_id_param(bad).unwrap_err().status_code(), 404);
        }
    }
}
