//! Configuration management
//!
//! Settings are resolved in this order:
//! 1. Environment variables
//! 2. `cosmos-chat.toml` (or the path given with `--config`)
//! 3. Defaults
//!
//! `${VAR_NAME}` inside the config file is replaced with the variable's value.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Error;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "cosmos-chat.toml";

/// Chat-completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key sent as a bearer token; usually supplied via `COSMOS_API_KEY`
    #[serde(default)]
    pub api_key: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL; requests go to `{base_url}/chat/completions`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds (0 disables the timeout)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Request timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Session storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding `<id>_chat_history.json` / `<id>_identity.txt`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding the customization override files
    #[serde(default = "default_customization_dir")]
    pub customization_dir: PathBuf,

    /// Number of most recent messages sent with each request
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            customization_dir: default_customization_dir(),
            max_history: default_max_history(),
        }
    }
}

/// Chat loop configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Print the outgoing JSON payload before each request
    #[serde(default)]
    pub show_payload: bool,
}

/// Main configuration for cosmos-chat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

fn default_model() -> String {
    "cosmosrp".to_string()
}

fn default_base_url() -> String {
    "https://api.pawan.krd/cosmosrp-it/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_customization_dir() -> PathBuf {
    PathBuf::from("customization")
}

fn default_max_history() -> usize {
    20
}

impl Config {
    /// Replace `${VAR_NAME}` with the value of the environment variable.
    ///
    /// Unset variables expand to an empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Parse TOML content after expanding environment references
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let expanded = Self::expand_env_vars(content);
        toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env_overrides();

        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(cfg)
    }

    /// Load configuration from an explicit path or the default locations.
    ///
    /// Without an explicit path, `./cosmos-chat.toml` is used when present,
    /// otherwise environment variables only.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        if let Some(path) = path {
            return Self::from_toml_file(path);
        }

        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }

        Ok(Self::from_env())
    }

    /// Load configuration from environment variables over defaults
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg
    }

    /// Override settings with environment variables
    fn apply_env_overrides(&mut self) {
        if let Ok(api_key) = std::env::var("COSMOS_API_KEY") {
            self.llm.api_key = api_key;
        }

        // Empty values are ignored so an exported-but-blank variable
        // does not wipe the file setting.
        if let Ok(model) = std::env::var("COSMOS_MODEL") {
            if !model.is_empty() {
                self.llm.model = model;
            }
        }
        if let Ok(base_url) = std::env::var("COSMOS_BASE_URL") {
            if !base_url.is_empty() {
                self.llm.base_url = base_url;
            }
        }
        if let Ok(timeout) = std::env::var("COSMOS_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                self.llm.timeout_secs = t;
            }
        }

        if let Ok(dir) = std::env::var("COSMOS_DATA_DIR") {
            if !dir.is_empty() {
                self.session.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("COSMOS_CUSTOMIZATION_DIR") {
            if !dir.is_empty() {
                self.session.customization_dir = PathBuf::from(dir);
            }
        }
        if let Ok(max) = std::env::var("COSMOS_MAX_HISTORY") {
            if let Ok(n) = max.parse() {
                self.session.max_history = n;
            }
        }

        if let Ok(show) = std::env::var("COSMOS_SHOW_PAYLOAD") {
            self.chat.show_payload = matches!(show.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Reject settings the chat loop cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.llm.api_key.trim().is_empty() {
            return Err(Error::Config(format!(
                "COSMOS_API_KEY is not set and {} has no llm.api_key",
                DEFAULT_CONFIG_FILE
            )));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(Error::Config("llm.base_url must not be empty".to_string()));
        }
        if self.session.max_history == 0 {
            return Err(Error::Config(
                "session.max_history must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_config_default() {
        let config = LlmConfig::default();
        assert_eq!(config.model, "cosmosrp");
        assert_eq!(config.base_url, "https://api.pawan.krd/cosmosrp-it/v1");
        assert!(config.api_key.is_empty());
        assert_eq!(config.timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_zero_timeout_disables_timeout() {
        let config = LlmConfig {
            timeout_secs: 0,
            ..LlmConfig::default()
        };
        assert!(config.timeout().is_none());
    }

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.customization_dir, PathBuf::from("customization"));
        assert_eq!(config.max_history, 20);
    }

    #[test]
    fn test_expand_env_vars() {
        unsafe {
            std::env::set_var("COSMOS_CHAT_TEST_VAR", "test_value");
        }

        let result = Config::expand_env_vars("prefix_${COSMOS_CHAT_TEST_VAR}_suffix");
        assert_eq!(result, "prefix_test_value_suffix");

        let result = Config::expand_env_vars("prefix_${COSMOS_CHAT_NONEXISTENT}_suffix");
        assert_eq!(result, "prefix__suffix");

        unsafe {
            std::env::remove_var("COSMOS_CHAT_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_passthrough() {
        assert_eq!(Config::expand_env_vars("no_vars_here"), "no_vars_here");
        assert_eq!(Config::expand_env_vars("cost: $5"), "cost: $5");
        assert_eq!(Config::expand_env_vars("${}_content"), "_content");
    }

    #[test]
    fn test_toml_config_parsing() {
        let toml_content = r#"
[llm]
model = "cosmosrp-2"
api_key = "test_key"
base_url = "https://api.example.com/v1"
timeout_secs = 30

[session]
data_dir = "/tmp/chat-data"
customization_dir = "/tmp/chat-custom"
max_history = 8

[chat]
show_payload = true
"#;

        let config = Config::from_toml_str(toml_content).unwrap();

        assert_eq!(config.llm.model, "cosmosrp-2");
        assert_eq!(config.llm.api_key, "test_key");
        assert_eq!(config.llm.base_url, "https://api.example.com/v1");
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.session.data_dir, PathBuf::from("/tmp/chat-data"));
        assert_eq!(config.session.customization_dir, PathBuf::from("/tmp/chat-custom"));
        assert_eq!(config.session.max_history, 8);
        assert!(config.chat.show_payload);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str("[llm]\napi_key = \"k\"\n").unwrap();
        assert_eq!(config.llm.api_key, "k");
        assert_eq!(config.llm.model, "cosmosrp");
        assert_eq!(config.session.max_history, 20);
        assert!(!config.chat.show_payload);
    }

    #[test]
    fn test_toml_env_expansion() {
        unsafe {
            std::env::set_var("COSMOS_CHAT_TEST_KEY", "secret");
        }

        let config = Config::from_toml_str("[llm]\napi_key = \"${COSMOS_CHAT_TEST_KEY}\"\n").unwrap();
        assert_eq!(config.llm.api_key, "secret");

        unsafe {
            std::env::remove_var("COSMOS_CHAT_TEST_KEY");
        }
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml_str("[llm\napi_key =").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_override_max_history() {
        unsafe {
            std::env::set_var("COSMOS_MAX_HISTORY", "5");
        }

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.session.max_history, 5);

        unsafe {
            std::env::remove_var("COSMOS_MAX_HISTORY");
        }
    }

    #[test]
    fn test_validate_requires_api_key() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.llm.api_key = "key".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_max_history() {
        let mut config = Config::default();
        config.llm.api_key = "key".to_string();
        config.session.max_history = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_api_key_from_env_with_partial_llm_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cosmos-chat.toml");
        std::fs::write(&path, "[llm]\nmodel = \"cosmosrp-2\"\n").unwrap();

        unsafe {
            std::env::set_var("COSMOS_API_KEY", "from-env");
        }
        let config = Config::from_toml_file(&path);
        unsafe {
            std::env::remove_var("COSMOS_API_KEY");
        }

        let config = config.unwrap();
        assert_eq!(config.llm.api_key, "from-env");
        assert_eq!(config.llm.model, "cosmosrp-2");
        assert!(config.validate().is_ok());
    }
}
