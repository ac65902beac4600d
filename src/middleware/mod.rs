pub mod auth;
pub mod metrics;
pub mod permission;
pub mod rate_limit;
pub mod recover;
pub mod response;

pub use auth::{authenticate, parse_bearer, Identity};
pub use metrics::{track_metrics, Metrics, MetricsSnapshot};
pub use permission::{check_permission, require_permission};
pub use rate_limit::{client_ip, rate_limit};
pub use recover::handle_panic;
pub use response::{ApiResponse, ApiResult};
