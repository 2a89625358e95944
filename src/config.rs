use std::{env, net::SocketAddr, path::PathBuf};

use thiserror::Error;

pub const DEFAULT_ASSISTANT: &str = "conversation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_token: String,
    pub bind_addr: String,
    pub bind_port: u16,
    /// Exposure scope used for every request.
    pub assistant: String,
    pub language: Option<String>,
    /// Host user the API token acts as.
    pub user_id: Option<String>,
    pub host_fixture: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MCP_API_TOKEN is required and must not be empty")]
    MissingApiToken,
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Parse from any key lookup, so callers are not tied to the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_token = non_empty("MCP_API_TOKEN").ok_or(ConfigError::MissingApiToken)?;
        let bind_addr = non_empty("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());
        let bind_port = non_empty("BIND_PORT")
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);

        let config = Self {
            api_token,
            bind_addr,
            bind_port,
            assistant: non_empty("MCP_ASSISTANT").unwrap_or_else(|| DEFAULT_ASSISTANT.to_string()),
            language: non_empty("MCP_LANGUAGE"),
            user_id: non_empty("MCP_USER_ID"),
            host_fixture: non_empty("MCP_HOST_FIXTURE").map(PathBuf::from),
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn parse_defaults() {
        let config = parse(&[("MCP_API_TOKEN", "abc")]).expect("config should parse");

        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.bind_port, 8080);
        assert_eq!(config.assistant, DEFAULT_ASSISTANT);
        assert_eq!(config.language, None);
        assert_eq!(config.user_id, None);
        assert_eq!(config.host_fixture, None);
    }

    #[test]
    fn missing_token_fails() {
        let err = parse(&[]).expect_err("expected missing token error");
        assert!(matches!(err, ConfigError::MissingApiToken));

        let err = parse(&[("MCP_API_TOKEN", "   ")]).expect_err("blank token");
        assert!(matches!(err, ConfigError::MissingApiToken));
    }

    #[test]
    fn caller_settings_are_read() {
        let config = parse(&[
            ("MCP_API_TOKEN", "abc"),
            ("MCP_ASSISTANT", "voice"),
            ("MCP_LANGUAGE", "de"),
            ("MCP_USER_ID", "user-1"),
            ("MCP_HOST_FIXTURE", "/etc/bridge/host.json"),
        ])
        .expect("config should parse");

        assert_eq!(config.assistant, "voice");
        assert_eq!(config.language.as_deref(), Some("de"));
        assert_eq!(config.user_id.as_deref(), Some("user-1"));
        assert_eq!(
            config.host_fixture,
            Some(PathBuf::from("/etc/bridge/host.json"))
        );
    }

    #[test]
    fn invalid_port_fails() {
        let err = parse(&[("MCP_API_TOKEN", "abc"), ("BIND_PORT", "99999")])
            .expect_err("port out of range");
        assert!(matches!(err, ConfigError::InvalidPort));
    }

    #[test]
    fn invalid_bind_address_fails() {
        let err = parse(&[("MCP_API_TOKEN", "abc"), ("BIND_ADDR", "not an address")])
            .expect_err("bad address");
        assert!(matches!(err, ConfigError::InvalidSocket));
    }
}
