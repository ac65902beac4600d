pub mod bucket_store;
pub mod token_service;

pub use bucket_store::{BucketStore, Decision, SweeperHandle};
pub use token_service::{IssuedToken, TokenService};
