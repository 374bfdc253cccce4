use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::github::client::DEFAULT_API_URL;
use crate::github::RepositoryTarget;

/// Config file looked up in the current directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = ".lgtm-bot.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .lgtm-bot.toml.
///
/// Every field has a default, so an empty file is a valid (if idle) config.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bot login. Its own pull requests are skipped and its existing
    /// approvals are detected.
    #[serde(default)]
    pub user: String,

    /// Peer approvals a pull request needs before the bot adds its own.
    #[serde(default)]
    pub approval_count: u32,

    /// Only the most recently updated N open pull requests per repository
    /// are considered.
    #[serde(default = "default_max_retrieval")]
    pub max_retrieval: usize,

    /// GitHub connection settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Repositories to poll, in order
    #[serde(default)]
    pub repositories: Vec<RepositoryTarget>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,

    /// API root, for GitHub Enterprise installs
    pub api_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_retrieval() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: String::new(),
            approval_count: 0,
            max_retrieval: default_max_retrieval(),
            github: GitHubConfig::default(),
            repositories: Vec::new(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// With an explicit path the file must exist. Otherwise .lgtm-bot.toml in
    /// the current directory is used when present, and the default config
    /// when not.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load_from(path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
    }

    pub fn api_url(&self) -> &str {
        self.github.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }
}
