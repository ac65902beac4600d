// handlers/public/mod.rs - Public handlers (no permission required)
//
// Health check, registration, activation and token acquisition. Callers may
// be anonymous; a bad bearer token is still rejected upstream by the
// authenticator.

pub mod healthcheck; // GET /v1/healthcheck
pub mod tokens; // POST /v1/tokens/authentication
pub mod users; // POST /v1/users, PUT /v1/users/activated

pub use healthcheck::healthcheck_get;
pub use tokens::authentication_token_post;
pub use users::{activate_put, register_post};
