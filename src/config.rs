//! Configuration loader and validator for the kennel console.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub whatsapp: Whatsapp,
    pub gateway: Gateway,
    pub suggest: Suggest,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub poll_interval_ms: u64,
}

/// WhatsApp deep-link settings for the public lead-capture flows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Whatsapp {
    /// Outreach number used when no override is stored in the settings
    /// collection.
    pub default_number: String,
}

/// Messaging gateway defaults. `url` and `token` may be overridden from the
/// admin settings collection; empty values mean "not configured".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Gateway {
    pub url: String,
    pub token: String,
    pub timeout_seconds: u64,
    /// Refuse dispatching to a plain-http gateway URL.
    pub require_tls: bool,
}

/// Generative-text suggestion settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Suggest {
    pub api_key: String,
    pub model: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid("app.poll_interval_ms must be > 0"));
    }

    if cfg.whatsapp.default_number.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "whatsapp.default_number must be non-empty",
        ));
    }

    // gateway.url may be empty: dispatch reports the missing configuration
    // the first time the operator tries to send through the gateway.
    if cfg.gateway.timeout_seconds == 0 || cfg.gateway.timeout_seconds > 300 {
        return Err(ConfigError::Invalid(
            "gateway.timeout_seconds must be between 1 and 300",
        ));
    }

    if cfg.suggest.model.trim().is_empty() {
        return Err(ConfigError::Invalid("suggest.model must be non-empty"));
    }

    Ok(())
}

/// Example configuration, also used as a fixture by the test suites.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  poll_interval_ms: 60000

whatsapp:
  default_number: "5511912345678"

gateway:
  url: "http://gateway.example.net:8081/chat/send/text"
  token: "YOUR_GATEWAY_TOKEN"
  timeout_seconds: 20
  require_tls: false

suggest:
  api_key: "YOUR_GEMINI_API_KEY"
  model: "gemini-2.5-flash"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
    }

    #[test]
    fn invalid_data_dir() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("data_dir")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_poll_interval() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.poll_interval_ms = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_default_number() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.whatsapp.default_number = "  ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("default_number")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn empty_gateway_url_is_allowed() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.gateway.url = "".into();
        validate(&cfg).unwrap();
    }

    #[test]
    fn invalid_gateway_timeout() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.gateway.timeout_seconds = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.gateway.timeout_seconds = 301;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_suggest_model() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.suggest.model = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("suggest.model")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.gateway.timeout_seconds, 20);
        assert_eq!(cfg.whatsapp.default_number, "5511912345678");
    }
}
