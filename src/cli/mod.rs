use clap::Parser;

use crate::config::{split_origins, AppConfig, Environment, LogFormat};

/// Server command line. Every flag is optional and overrides the
/// environment-derived configuration when present.
#[derive(Debug, Parser)]
#[command(name = "coltech-api")]
#[command(about = "Coltech API server - work items, accounts and access tokens")]
#[command(version)]
pub struct Cli {
    #[arg(long, help = "API server port")]
    pub port: Option<u16>,

    #[arg(long, value_enum, help = "Environment (development|staging|production)")]
    pub env: Option<Environment>,

    #[arg(long = "db-dsn", help = "PostgreSQL DSN")]
    pub db_dsn: Option<String>,

    #[arg(long = "db-max-open-conns", help = "PostgreSQL max open connections")]
    pub db_max_open_conns: Option<u32>,

    #[arg(long = "db-max-idle-time", help = "PostgreSQL max connection idle time in seconds")]
    pub db_max_idle_time: Option<u64>,

    #[arg(long = "db-timeout-ms", help = "Deadline for each storage operation in milliseconds")]
    pub db_timeout_ms: Option<u64>,

    #[arg(long = "limiter-rps", help = "Rate limiter maximum requests per second")]
    pub limiter_rps: Option<f64>,

    #[arg(long = "limiter-burst", help = "Rate limiter maximum burst")]
    pub limiter_burst: Option<u32>,

    #[arg(long = "limiter-enabled", help = "Enable rate limiter")]
    pub limiter_enabled: Option<bool>,

    #[arg(long = "cors-trusted-origins", help = "Trusted CORS origins (space or comma separated)")]
    pub cors_trusted_origins: Option<String>,

    #[arg(long = "shutdown-grace", help = "Seconds allowed for in-flight requests to finish on shutdown")]
    pub shutdown_grace: Option<u64>,

    #[arg(long = "log-format", value_enum, help = "Log output format")]
    pub log_format: Option<LogFormat>,

    #[arg(long = "in-memory", help = "Use the in-memory store instead of PostgreSQL")]
    pub in_memory: bool,
}

impl Cli {
    /// Layer the flags over `base`. Selecting `--env` resets to that environment's presets first.
    pub fn apply(&self, base: AppConfig) -> AppConfig {
        let mut config = match self.env {
            Some(env) if env != base.environment => {
                let mut preset = AppConfig::for_environment(env);
                preset.database.dsn = base.database.dsn.clone();
                preset
            }
            _ => base,
        };

        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dsn) = &self.db_dsn {
            config.database.dsn = Some(dsn.clone());
        }
        if let Some(n) = self.db_max_open_conns {
            config.database.max_open_conns = n;
        }
        if let Some(secs) = self.db_max_idle_time {
            config.database.max_idle_time_secs = secs;
        }
        if let Some(ms) = self.db_timeout_ms {
            config.database.operation_timeout_ms = ms;
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
        if let Some(origins) = &self.cors_trusted_origins {
            config.cors.trusted_origins = split_origins(origins);
        }
        if let Some(secs) = self.shutdown_grace {
            config.shutdown.grace_period_secs = secs;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }

        config
    }
}
