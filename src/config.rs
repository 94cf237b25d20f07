use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const CONFIG_FILE: &str = ".repo-tools.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .repo-tools.toml.
/// All fields are optional; the tools work with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    /// Where the shared repos manifest lives
    #[serde(default)]
    pub manifest: ManifestConfig,

    #[serde(default)]
    pub implode: ImplodeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,

    /// REST API root, overridable for GitHub Enterprise
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_api_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestConfig {
    /// Repository holding the manifest, as "owner/name"
    #[serde(default = "default_manifest_repository")]
    pub repository: String,

    /// Path of the manifest inside that repository
    #[serde(default = "default_manifest_path")]
    pub path: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            repository: default_manifest_repository(),
            path: default_manifest_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImplodeConfig {
    /// Organizations scanned when `implode` gets no --org
    #[serde(default = "default_orgs")]
    pub orgs: Vec<String>,
}

impl Default for ImplodeConfig {
    fn default() -> Self {
        Self {
            orgs: default_orgs(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_manifest_repository() -> String {
    "edx/repo-tools-data".to_string()
}

fn default_manifest_path() -> String {
    "repos.yaml".to_string()
}

fn default_orgs() -> Vec<String> {
    vec!["edx".to_string(), "edx-ops".to_string()]
}

impl Config {
    /// Load configuration from .repo-tools.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
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
}
