//! Runtime configuration for the tutoring CLI, loaded from environment
//! variables so the same binary can point at local or remote backends.

use std::env;
use tracing::Level;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub auth_base_url: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `MENTOR_ENDPOINT`: (Optional) WebSocket address of the tutoring backend. Defaults to "ws://localhost:3000/ws".
    // *   `MENTOR_AUTH_URL`: (Optional) Base URL of the auth endpoints. Defaults to "http://localhost:3000".
    // *   `MENTOR_EMAIL` / `MENTOR_PASSWORD`: (Optional) Credentials to log in with before connecting. Both or neither.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env for local development; absent files are fine.
        dotenvy::dotenv().ok();

        let endpoint = env::var("MENTOR_ENDPOINT")
            .unwrap_or_else(|_| mentor_realtime::DEFAULT_ENDPOINT.to_string());
        let auth_base_url =
            env::var("MENTOR_AUTH_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let email = env::var("MENTOR_EMAIL").ok();
        let password = env::var("MENTOR_PASSWORD").ok();
        match (&email, &password) {
            (Some(_), None) => {
                return Err(ConfigError::MissingVar(
                    "MENTOR_PASSWORD must be set when MENTOR_EMAIL is".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingVar(
                    "MENTOR_EMAIL must be set when MENTOR_PASSWORD is".to_string(),
                ));
            }
            _ => {}
        }

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            endpoint,
            auth_base_url,
            email,
            password,
            log_level,
        })
    }
}
