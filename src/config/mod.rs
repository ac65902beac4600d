pub mod args;

pub use args::ServerArgs;

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub port: u16,
    pub database: DatabaseConfig,
    pub limiter: LimiterConfig,
    pub cors: CorsConfig,
    pub tokens: TokenConfig,
    pub mailer: MailerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "production" | "prod" => Some(Environment::Production),
            "staging" | "stage" => Some(Environment::Staging),
            "development" | "dev" => Some(Environment::Development),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL DSN. When absent the server falls back to the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Upper bound on every individual store call.
    pub query_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    pub enabled: bool,
    /// Tokens added to each bucket per second.
    pub rps: f64,
    /// Bucket capacity.
    pub burst: u32,
    pub cleanup_interval_secs: u64,
    /// Use X-Forwarded-For / X-Real-IP instead of the socket peer address.
    pub trust_proxy_headers: bool,
}

impl LimiterConfig {
    /// Never shorter than one second.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    /// Buckets idle for longer than this are dropped by the sweeper.
    pub fn stale_after(&self) -> Duration {
        self.cleanup_interval() * 3
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub trusted_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub authentication_ttl_hours: i64,
    pub activation_ttl_hours: i64,
}

impl TokenConfig {
    pub fn authentication_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.authentication_ttl_hours)
    }

    pub fn activation_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.activation_ttl_hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailerConfig {
    pub sender: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = env::var("APP_ENV")
            .ok()
            .and_then(|v| Environment::parse(&v))
            .unwrap_or(Environment::Development);

        // Set defaults based on environment, then override with specific env vars
        Self::for_environment(environment).with_env_overrides()
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("PORT") {
            self.port = v.parse().unwrap_or(self.port);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout_secs =
                v.parse().unwrap_or(self.database.connection_timeout_secs);
        }
        if let Ok(v) = env::var("DATABASE_IDLE_TIMEOUT") {
            self.database.idle_timeout_secs = v.parse().unwrap_or(self.database.idle_timeout_secs);
        }
        if let Ok(v) = env::var("DATABASE_QUERY_TIMEOUT_SECS") {
            self.database.query_timeout_secs = v.parse().unwrap_or(self.database.query_timeout_secs);
        }

        // Limiter overrides
        if let Ok(v) = env::var("LIMITER_ENABLED") {
            self.limiter.enabled = v.parse().unwrap_or(self.limiter.enabled);
        }
        if let Ok(v) = env::var("LIMITER_RPS") {
            self.limiter.rps = v.parse().unwrap_or(self.limiter.rps);
        }
        if let Ok(v) = env::var("LIMITER_BURST") {
            self.limiter.burst = v.parse().unwrap_or(self.limiter.burst);
        }
        if let Ok(v) = env::var("LIMITER_CLEANUP_INTERVAL_SECS") {
            self.limiter.cleanup_interval_secs =
                v.parse().unwrap_or(self.limiter.cleanup_interval_secs);
        }
        if let Ok(v) = env::var("LIMITER_TRUST_PROXY_HEADERS") {
            self.limiter.trust_proxy_headers = v.parse().unwrap_or(self.limiter.trust_proxy_headers);
        }

        // CORS overrides
        if let Ok(v) = env::var("CORS_TRUSTED_ORIGINS") {
            self.cors.trusted_origins = split_origins(&v);
        }

        // Token overrides
        if let Ok(v) = env::var("TOKEN_AUTHENTICATION_TTL_HOURS") {
            self.tokens.authentication_ttl_hours =
                v.parse().unwrap_or(self.tokens.authentication_ttl_hours);
        }
        if let Ok(v) = env::var("TOKEN_ACTIVATION_TTL_HOURS") {
            self.tokens.activation_ttl_hours = v.parse().unwrap_or(self.tokens.activation_ttl_hours);
        }

        if let Ok(v) = env::var("MAILER_SENDER") {
            self.mailer.sender = v;
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            port: 4000,
            database: DatabaseConfig {
                url: None,
                max_connections: 25,
                connection_timeout_secs: 5,
                idle_timeout_secs: 15 * 60,
                query_timeout_secs: 3,
            },
            limiter: LimiterConfig {
                enabled: true,
                rps: 2.0,
                burst: 4,
                cleanup_interval_secs: 60,
                trust_proxy_headers: false,
            },
            cors: CorsConfig {
                trusted_origins: vec![
                    "http://localhost:9000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
            tokens: TokenConfig {
                authentication_ttl_hours: 24,
                activation_ttl_hours: 3 * 24,
            },
            mailer: MailerConfig {
                sender: "Reel <no-reply@reel.localhost>".to_string(),
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            port: 4000,
            database: DatabaseConfig {
                url: None,
                max_connections: 25,
                connection_timeout_secs: 5,
                idle_timeout_secs: 15 * 60,
                query_timeout_secs: 3,
            },
            limiter: LimiterConfig {
                enabled: true,
                rps: 2.0,
                burst: 4,
                cleanup_interval_secs: 60,
                trust_proxy_headers: false,
            },
            cors: CorsConfig {
                trusted_origins: vec!["https://staging.reel.example.com".to_string()],
            },
            tokens: TokenConfig {
                authentication_ttl_hours: 24,
                activation_ttl_hours: 3 * 24,
            },
            mailer: MailerConfig {
                sender: "Reel <no-reply@staging.reel.example.com>".to_string(),
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            port: 4000,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout_secs: 5,
                idle_timeout_secs: 15 * 60,
                query_timeout_secs: 3,
            },
            limiter: LimiterConfig {
                enabled: true,
                rps: 2.0,
                burst: 4,
                cleanup_interval_secs: 60,
                trust_proxy_headers: false,
            },
            cors: CorsConfig {
                trusted_origins: vec!["https://reel.example.com".to_string()],
            },
            tokens: TokenConfig {
                authentication_ttl_hours: 12,
                activation_ttl_hours: 3 * 24,
            },
            mailer: MailerConfig {
                sender: "Reel <no-reply@reel.example.com>".to_string(),
            },
        }
    }
}

/// Trusted origins are space separated, matching the command-line flag.
pub fn split_origins(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}
