use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("limiter rps must be a finite number greater than zero, got {0}")]
    LimiterRps(f64),

    #[error("limiter burst must be at least 1")]
    LimiterBurst,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub limiter: LimiterConfig,
    pub cors: CorsConfig,
    pub shutdown: ShutdownConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub dsn: Option<String>,
    pub max_open_conns: u32,
    pub max_idle_time_secs: u64,
    pub connect_timeout_secs: u64,
    /// Deadline applied to every individual storage operation
    pub operation_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    pub enabled: bool,
    pub rps: f64,
    pub burst: u32,
    pub sweep_interval_secs: u64,
}

impl LimiterConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    pub trusted_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    pub grace_period_secs: u64,
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub authentication_ttl_hours: i64,
    pub activation_ttl_hours: i64,
}

impl AuthConfig {
    pub fn authentication_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.authentication_ttl_hours)
    }

    pub fn activation_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.activation_ttl_hours)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = env::var("APP_ENV")
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Development);

        Self::for_environment(environment).with_env_overrides()
    }

    /// Preset defaults for the given environment, without env overrides
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rps = self.limiter.rps;
        if !rps.is_finite() || rps <= 0.0 {
            return Err(ConfigError::LimiterRps(rps));
        }
        if self.limiter.burst == 0 {
            return Err(ConfigError::LimiterBurst);
        }
        Ok(())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        if let Ok(v) = env::var("COLTECH_DB_DSN") {
            if !v.trim().is_empty() {
                self.database.dsn = Some(v);
            }
        }
        if let Ok(v) = env::var("DB_MAX_OPEN_CONNS") {
            self.database.max_open_conns = v.parse().unwrap_or(self.database.max_open_conns);
        }
        if let Ok(v) = env::var("DB_MAX_IDLE_TIME_SECS") {
            self.database.max_idle_time_secs = v.parse().unwrap_or(self.database.max_idle_time_secs);
        }
        if let Ok(v) = env::var("DB_OPERATION_TIMEOUT_MS") {
            self.database.operation_timeout_ms = v.parse().unwrap_or(self.database.operation_timeout_ms);
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

        if let Ok(v) = env::var("CORS_TRUSTED_ORIGINS") {
            self.cors.trusted_origins = split_origins(&v);
        }

        if let Ok(v) = env::var("SHUTDOWN_GRACE_PERIOD_SECS") {
            self.shutdown.grace_period_secs = v.parse().unwrap_or(self.shutdown.grace_period_secs);
        }

        if let Ok(v) = env::var("LOG_FORMAT") {
            match v.as_str() {
                "json" => self.logging.format = LogFormat::Json,
                "text" => self.logging.format = LogFormat::Text,
                _ => {}
            }
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 4000 },
            database: DatabaseConfig {
                dsn: None,
                max_open_conns: 25,
                max_idle_time_secs: 15 * 60,
                connect_timeout_secs: 5,
                operation_timeout_ms: 3_000,
            },
            limiter: LimiterConfig {
                enabled: true,
                rps: 2.0,
                burst: 4,
                sweep_interval_secs: 60,
            },
            cors: CorsConfig::default(),
            shutdown: ShutdownConfig { grace_period_secs: 20 },
            auth: AuthConfig {
                authentication_ttl_hours: 24,
                activation_ttl_hours: 3 * 24,
            },
            logging: LoggingConfig { format: LogFormat::Text },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.logging.format = LogFormat::Json;
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.max_open_conns = 50;
        config.logging.format = LogFormat::Json;
        config
    }
}

/// Accepts comma and/or whitespace separated origin lists
pub fn split_origins(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::for_environment(Environment::Development);
        assert_eq!(config.server.port, 4000);
        assert!(config.limiter.enabled);
        assert_eq!(config.limiter.rps, 2.0);
        assert_eq!(config.limiter.burst, 4);
        assert_eq!(config.shutdown.grace_period(), Duration::from_secs(20));
        assert_eq!(config.database.operation_timeout(), Duration::from_secs(3));
        assert!(config.cors.trusted_origins.is_empty());
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::for_environment(Environment::Production);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.limiter.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_validate_limiter() {
        let mut config = AppConfig::for_environment(Environment::Development);
        assert_eq!(config.validate(), Ok(()));

        for rps in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            config.limiter.rps = rps;
            assert!(matches!(config.validate(), Err(ConfigError::LimiterRps(_))), "accepted rps {}", rps);
        }

        config.limiter.rps = 2.0;
        config.limiter.burst = 0;
        assert_eq!(config.validate(), Err(ConfigError::LimiterBurst));
    }

    #[test]
    fn test_split_origins() {
        assert_eq!(
            split_origins("https://a.example, https://b.example  https://c.example"),
            vec!["https://a.example", "https://b.example", "https://c.example"]
        );
        assert!(split_origins("  ").is_empty());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("prod"), Environment::Production);
        assert_eq!(Environment::parse("stage"), Environment::Staging);
        assert_eq!(Environment::parse("anything"), Environment::Development);
    }
}
