// handlers/protected/mod.rs - Protected handlers
//
// Every route here is registered through `require_permission`, so a handler
// only runs for an activated user holding the route's permission code.

pub mod metrics; // GET /debug/vars (metrics:view)
pub mod movies; // /v1/movies[/:id] (movies:read, movies:write)

pub use metrics::debug_vars_get;
pub use movies::{movie_delete, movie_get, movie_patch, movies_get, movies_post};
