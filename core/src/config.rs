//! Client configuration supplied by the caller.
//!
//! The library never reads the environment or files; callers either build a
//! `ClientConfig` in code or deserialize one from their own settings.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://api.truevault.com";
pub const API_VERSION: &str = "v1";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_key: String,
    pub account_id: String,
    pub endpoint: String,
    #[serde(with = "seconds")]
    pub connect_timeout: Duration,
    #[serde(with = "seconds")]
    pub timeout: Duration,
    pub user_agent: String,
    /// Log every request and response at `info` level, headers included.
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            account_id: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
            user_agent: concat!("vault-rs/", env!("CARGO_PKG_VERSION")).to_string(),
            debug: false,
        }
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            account_id: account_id.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, overall: Duration) -> Self {
        self.connect_timeout = connect;
        self.timeout = overall;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_expectations() {
        let config = ClientConfig::new("key", "account");
        assert_eq!(config.endpoint, "https://api.truevault.com");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.user_agent.starts_with("vault-rs/"));
        assert!(!config.debug);
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"api_key":"k","account_id":"a","timeout":5,"endpoint":"http://localhost:3000"}"#,
        )
        .unwrap();
        assert_eq!(config.api_key, "k");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.endpoint, "http://localhost:3000");
    }

    #[test]
    fn builder_methods_override_defaults() {
        let config = ClientConfig::new("k", "a")
            .with_endpoint("http://127.0.0.1:9")
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(2))
            .with_user_agent("tests")
            .with_debug(true);
        assert_eq!(config.endpoint, "http://127.0.0.1:9");
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.user_agent, "tests");
        assert!(config.debug);
    }
}
