use std::time::Duration;

use secrecy::SecretString;

use crate::client::consts::{DEFAULT_ENDPOINT, MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY_MS};
use crate::reveal::DEFAULT_REVEAL_CADENCE;
use mentor_realtime_utils::audio::DEFAULT_MAX_AUDIO_BYTES;

/// Session client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    endpoint: String,
    token: Option<SecretString>,
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
    max_audio_bytes: usize,
    reveal_cadence: Duration,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.config.endpoint = endpoint.to_string();
        self
    }

    /// Bearer token obtained from the auth endpoint, attached to the
    /// connection handshake.
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.config.token = Some(token);
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    pub fn with_max_audio_bytes(mut self, max: usize) -> Self {
        self.config.max_audio_bytes = max;
        self
    }

    pub fn with_reveal_cadence(mut self, cadence: Duration) -> Self {
        self.config.reveal_cadence = cadence;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES,
            reveal_cadence: DEFAULT_REVEAL_CADENCE,
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    pub fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub fn max_audio_bytes(&self) -> usize {
        self.max_audio_bytes
    }

    pub fn reveal_cadence(&self) -> Duration {
        self.reveal_cadence
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_protocol_constants() {
        let config = Config::new();
        assert_eq!(config.endpoint(), "ws://localhost:3000/ws");
        assert_eq!(config.max_reconnect_attempts(), 5);
        assert_eq!(config.reconnect_delay(), Duration::from_millis(3000));
        assert_eq!(config.max_audio_bytes(), 10 * 1024 * 1024);
        assert_eq!(config.reveal_cadence(), Duration::from_millis(10));
        assert!(config.token().is_none());
    }

    #[test]
    fn builder_overrides_stick() {
        let config = Config::builder()
            .with_endpoint("ws://tutor.example/ws")
            .with_max_reconnect_attempts(2)
            .with_reconnect_delay(Duration::from_millis(50))
            .build();
        assert_eq!(config.endpoint(), "ws://tutor.example/ws");
        assert_eq!(config.max_reconnect_attempts(), 2);
        assert_eq!(config.reconnect_delay(), Duration::from_millis(50));
    }
}
