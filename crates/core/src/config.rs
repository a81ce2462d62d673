use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default port of the DevTools automation endpoint.
pub const DEFAULT_AUTOMATION_PORT: u16 = 9420;

/// Environment variable overriding the default automation port.
pub const PORT_ENV: &str = "WEAPP_AUTOMATION_PORT";

/// Environment variable pointing at the WeChat DevTools CLI binary.
pub const CLI_ENV: &str = "WEAPP_DEVTOOLS_CLI";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Default automation endpoint port, overridable per launch/connect call.
    pub automation_port: u16,
    /// DevTools CLI override; consulted after explicit args and the
    /// connection context, before platform defaults.
    #[serde(default)]
    pub cli_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            automation_port: DEFAULT_AUTOMATION_PORT,
            cli_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            automation_port: parse_port(std::env::var(PORT_ENV).ok()),
            cli_path: std::env::var(CLI_ENV).ok().map(PathBuf::from),
        }
    }

    /// WebSocket endpoint for the given port, falling back to the configured default.
    pub fn ws_endpoint(&self, port: Option<u16>) -> String {
        format!("ws://127.0.0.1:{}", port.unwrap_or(self.automation_port))
    }
}

fn parse_port(raw: Option<String>) -> u16 {
    raw.and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_AUTOMATION_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port() {
        let config = Config::default();
        assert_eq!(config.automation_port, 9420);
        assert!(config.cli_path.is_none());
    }

    #[test]
    fn test_parse_port_accepts_valid_values() {
        assert_eq!(parse_port(Some("9421".to_string())), 9421);
        assert_eq!(parse_port(Some(" 8080 ".to_string())), 8080);
    }

    #[test]
    fn test_parse_port_falls_back_on_garbage() {
        assert_eq!(parse_port(None), DEFAULT_AUTOMATION_PORT);
        assert_eq!(parse_port(Some("not-a-port".to_string())), DEFAULT_AUTOMATION_PORT);
        assert_eq!(parse_port(Some("99999".to_string())), DEFAULT_AUTOMATION_PORT);
    }

    #[test]
    fn test_ws_endpoint_override() {
        let config = Config::default();
        assert_eq!(config.ws_endpoint(None), "ws://127.0.0.1:9420");
        assert_eq!(config.ws_endpoint(Some(9421)), "ws://127.0.0.1:9421");
    }
}
