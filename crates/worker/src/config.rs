//! Process configuration (spec §6, SPEC_FULL §6.1). Rust rendition of
//! `original_source/apps/jobs/config.py`'s `JobRunnerConfig`: every
//! recognized environment variable, its default, and its validation range,
//! loaded once at startup and fatal on any violation.

use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required but was not set")]
    Missing(&'static str),

    #[error("{name} must be {constraint}, got {value:?}")]
    OutOfRange {
        name: &'static str,
        constraint: &'static str,
        value: String,
    },

    #[error("NODE_ENV must be one of development|test|production, got {0:?}")]
    InvalidNodeEnv(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEnv {
    Development,
    Test,
    Production,
}

impl NodeEnv {
    pub fn is_production(&self) -> bool {
        matches!(self, NodeEnv::Production)
    }
}

/// Tigris (S3-compatible) object store credentials (spec §6
/// `TIGRIS_ENDPOINT`/`_REGION`/`_BUCKET`/`_ACCESS_KEY_ID`/`_SECRET_ACCESS_KEY`).
#[derive(Debug, Clone)]
pub struct TigrisConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node_env: NodeEnv,
    pub port: u16,
    pub database_url: String,
    pub job_concurrency: u32,
    pub poll_interval_ms: u64,
    pub ffmpeg_binary: Option<String>,
    pub tigris: TigrisConfig,
    pub openrouter_api_key: Option<String>,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load and validate configuration from the process environment. Any
    /// missing required variable or out-of-range value is fatal at startup
    /// (spec §7, "Configuration error").
    pub fn from_env() -> Result<Self, ConfigError> {
        let node_env = match optional("NODE_ENV").as_deref() {
            None | Some("development") => NodeEnv::Development,
            Some("test") => NodeEnv::Test,
            Some("production") => NodeEnv::Production,
            Some(other) => return Err(ConfigError::InvalidNodeEnv(other.to_string())),
        };

        let port: u16 = match optional("PORT") {
            None => 8081,
            Some(raw) => raw.parse().map_err(|_| ConfigError::OutOfRange {
                name: "PORT",
                constraint: "an integer in 1..=65535",
                value: raw,
            })?,
        };
        if port == 0 {
            return Err(ConfigError::OutOfRange {
                name: "PORT",
                constraint: "an integer in 1..=65535",
                value: "0".to_string(),
            });
        }

        let database_url = required("DATABASE_URL")?;

        let job_concurrency: u32 = match optional("JOB_CONCURRENCY") {
            None => 1,
            Some(raw) => {
                let n: u32 = raw.parse().map_err(|_| ConfigError::OutOfRange {
                    name: "JOB_CONCURRENCY",
                    constraint: "an integer in 1..=20",
                    value: raw.clone(),
                })?;
                if !(1..=20).contains(&n) {
                    return Err(ConfigError::OutOfRange {
                        name: "JOB_CONCURRENCY",
                        constraint: "an integer in 1..=20",
                        value: raw,
                    });
                }
                n
            }
        };

        let poll_interval_ms: u64 = match optional("POLL_INTERVAL_MS") {
            None => 1000,
            Some(raw) => {
                let n: u64 = raw.parse().map_err(|_| ConfigError::OutOfRange {
                    name: "POLL_INTERVAL_MS",
                    constraint: "an integer >= 100",
                    value: raw.clone(),
                })?;
                if n < 100 {
                    return Err(ConfigError::OutOfRange {
                        name: "POLL_INTERVAL_MS",
                        constraint: "an integer >= 100",
                        value: raw,
                    });
                }
                n
            }
        };

        let ffmpeg_binary = optional("FFMPEG_BINARY");
        let openrouter_api_key = optional("OPENROUTER_API_KEY");

        let tigris = TigrisConfig {
            endpoint: required("TIGRIS_ENDPOINT")?,
            region: required("TIGRIS_REGION")?,
            bucket: required("TIGRIS_BUCKET")?,
            access_key_id: required("TIGRIS_ACCESS_KEY_ID")?,
            secret_access_key: required("TIGRIS_SECRET_ACCESS_KEY")?,
        };

        Ok(Config {
            node_env,
            port,
            database_url,
            job_concurrency,
            poll_interval_ms,
            ffmpeg_binary,
            tigris,
            openrouter_api_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for var in [
            "NODE_ENV",
            "PORT",
            "DATABASE_URL",
            "JOB_CONCURRENCY",
            "POLL_INTERVAL_MS",
            "FFMPEG_BINARY",
            "TIGRIS_ENDPOINT",
            "TIGRIS_REGION",
            "TIGRIS_BUCKET",
            "TIGRIS_ACCESS_KEY_ID",
            "TIGRIS_SECRET_ACCESS_KEY",
            "OPENROUTER_API_KEY",
        ] {
            env::remove_var(var);
        }
    }

    fn set_required_tigris_and_db() {
        env::set_var("DATABASE_URL", "postgres://localhost/test");
        env::set_var("TIGRIS_ENDPOINT", "https://fly.storage.tigris.dev");
        env::set_var("TIGRIS_REGION", "auto");
        env::set_var("TIGRIS_BUCKET", "clips");
        env::set_var("TIGRIS_ACCESS_KEY_ID", "ak");
        env::set_var("TIGRIS_SECRET_ACCESS_KEY", "sk");
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        set_required_tigris_and_db();

        let config = Config::from_env().unwrap();
        assert_eq!(config.node_env, NodeEnv::Development);
        assert_eq!(config.port, 8081);
        assert_eq!(config.job_concurrency, 1);
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn missing_database_url_is_a_config_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var("TIGRIS_ENDPOINT", "https://fly.storage.tigris.dev");
        env::set_var("TIGRIS_REGION", "auto");
        env::set_var("TIGRIS_BUCKET", "clips");
        env::set_var("TIGRIS_ACCESS_KEY_ID", "ak");
        env::set_var("TIGRIS_SECRET_ACCESS_KEY", "sk");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn job_concurrency_out_of_range_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        set_required_tigris_and_db();
        env::set_var("JOB_CONCURRENCY", "21");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "JOB_CONCURRENCY", .. }));
    }

    #[test]
    fn poll_interval_below_minimum_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        set_required_tigris_and_db();
        env::set_var("POLL_INTERVAL_MS", "50");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "POLL_INTERVAL_MS", .. }));
    }
}
