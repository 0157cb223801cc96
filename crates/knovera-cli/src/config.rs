//! Configuration file support

use knovera_ai::{GenerateOptions, UserIdentity, UserRole, client::DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for knovera
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend root, e.g. http://localhost:3001/api/ai
    pub base_url: Option<String>,
    /// User id to chat as when no session is stored
    pub user_id: Option<String>,
    /// Account kind of `user_id`
    pub role: Option<UserRole>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub use_rag: Option<bool>,
    pub web_search: Option<bool>,
    /// How many conversations to list
    pub conversation_limit: Option<u32>,
    pub connect_timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("knovera")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("KNOVERA_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    fn parse(content: &str) -> Self {
        match toml::from_str(content) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let defaults = GenerateOptions::default();
        let default_config = Config {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            user_id: None,
            role: Some(UserRole::Teacher),
            temperature: Some(defaults.temperature),
            max_tokens: Some(defaults.max_tokens),
            use_rag: Some(defaults.use_rag),
            web_search: Some(defaults.web_search),
            conversation_limit: Some(knovera_ai::client::DEFAULT_CONVERSATION_LIMIT),
            connect_timeout_secs: None,
        };

        default_config.save()?;
        Ok(path)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    /// Generation options with config values laid over the defaults
    pub fn generate_options(&self) -> GenerateOptions {
        let defaults = GenerateOptions::default();
        GenerateOptions {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            use_rag: self.use_rag.unwrap_or(defaults.use_rag),
            web_search: self.web_search.unwrap_or(defaults.web_search),
        }
    }

    /// Identity from the config file, if a user id is set
    pub fn identity(&self) -> Option<UserIdentity> {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| UserIdentity::new(id, self.role.unwrap_or(UserRole::Teacher)))
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# knovera configuration file
# Place at ~/.config/knovera/config.toml (Linux) or set KNOVERA_CONFIG_PATH

# Backend root
base_url = "http://localhost:3001/api/ai"

# Who to chat as when no session is stored (see --login)
# user_id = "..."
role = "teacher"   # teacher or student

# Generation parameters
temperature = 0.7
max_tokens = 300
use_rag = true
web_search = false

# How many conversations --list and /list show
conversation_limit = 50

# Optional connect timeout for the backend
# connect_timeout_secs = 10
"#
}
