use clap::Parser;

use super::{split_origins, AppConfig, Environment};

/// Command-line flags. Each one, when given, wins over the environment preset
/// and the environment variables.
#[derive(Parser, Debug, Default)]
#[command(name = "reel-api")]
#[command(about = "Movie catalog API server")]
#[command(version)]
pub struct ServerArgs {
    #[arg(long, help = "API server port")]
    pub port: Option<u16>,

    #[arg(long, value_parser = parse_environment, help = "Environment (development|staging|production)")]
    pub env: Option<Environment>,

    #[arg(long = "db-dsn", help = "PostgreSQL DSN")]
    pub db_dsn: Option<String>,

    #[arg(long, help = "Rate limiter maximum requests per second")]
    pub limiter_rps: Option<f64>,

    #[arg(long, help = "Rate limiter maximum burst")]
    pub limiter_burst: Option<u32>,

    #[arg(long, help = "Enable rate limiter (true|false)")]
    pub limiter_enabled: Option<bool>,

    #[arg(long, help = "Trusted CORS origins (space separated)")]
    pub cors_trusted_origins: Option<String>,

    #[arg(long, help = "Keep all data in process memory instead of PostgreSQL")]
    pub memory_store: bool,
}

fn parse_environment(value: &str) -> Result<Environment, String> {
    Environment::parse(value).ok_or_else(|| format!("unknown environment '{}'", value))
}

impl ServerArgs {
    /// Resolve the final configuration: preset, then env vars, then flags.
    pub fn into_config(self) -> AppConfig {
        let base = match self.env {
            Some(environment) => AppConfig::for_environment(environment).with_env_overrides(),
            None => AppConfig::from_env(),
        };
        self.apply(base)
    }

    fn apply(self, mut config: AppConfig) -> AppConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dsn) = self.db_dsn {
            config.database.url = Some(dsn);
        }
        if let Some(rps) = self.limiter_rps {
            config.limiter.rps = rps;
        }
        if let Some(burst) = self.limiter_burst {
            config.limiter.burst = burst;
        }
        if let Some(enabled) = self.limiter_enabled {
            config.limiter.enabled = enabled;
        }
        if let Some(origins) = self.cors_trusted_origins {
            let origins = split_origins(&origins);
            if !origins.is_empty() {
                config.cors.trusted_origins = origins;
            }
        }
        config
    }
}
