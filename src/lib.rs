pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod validator;

#[cfg(test)]
pub mod testing;

pub use routes::app;
pub use state::AppState;
