use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_PRIMARY_URL: &str = "https://ideas-hub-1.onrender.com";
pub const DEFAULT_INTERACTIONS_URL: &str = "https://final-project-p053.onrender.com";

const PRIMARY_URL_ENV: &str = "IDEAS_HUB_PRIMARY_URL";
const INTERACTIONS_URL_ENV: &str = "IDEAS_HUB_INTERACTIONS_URL";
const SESSION_FILE_ENV: &str = "IDEAS_HUB_SESSION_FILE";
const TIMEOUT_ENV: &str = "IDEAS_HUB_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Auth and ideas backend.
    #[serde(default = "default_primary_url")]
    pub primary_url: String,
    /// Comments, votes and reactions backend.
    #[serde(default = "default_interactions_url")]
    pub interactions_url: String,
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_primary_url() -> String {
    DEFAULT_PRIMARY_URL.to_string()
}
fn default_interactions_url() -> String {
    DEFAULT_INTERACTIONS_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_cache_ttl_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            interactions_url: default_interactions_url(),
            session_file: None,
            timeout_secs: default_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&raw).context("parsing config JSON")?;
        Ok(cfg.normalized())
    }

    /// Read `path` if it exists, fall back to defaults otherwise, then apply
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let cfg = if path.exists() {
            Self::from_file(path)?
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        Ok(cfg.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = lookup(PRIMARY_URL_ENV) {
            self.primary_url = url;
        }
        if let Some(url) = lookup(INTERACTIONS_URL_ENV) {
            self.interactions_url = url;
        }
        if let Some(path) = lookup(SESSION_FILE_ENV) {
            self.session_file = Some(PathBuf::from(path));
        }
        if let Some(secs) = lookup(TIMEOUT_ENV).and_then(|v| v.trim().parse::<u64>().ok()) {
            self.timeout_secs = secs;
        }
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        self.primary_url = self.primary_url.trim().trim_end_matches('/').to_string();
        self.interactions_url = self.interactions_url.trim().trim_end_matches('/').to_string();
        self
    }

    /// Where credentials are kept between runs.
    pub fn session_path(&self) -> PathBuf {
        if let Some(path) = &self.session_file {
            return path.clone();
        }
        dirs::config_dir()
            .map(|dir| dir.join("ideas-hub").join("session.json"))
            .unwrap_or_else(|| PathBuf::from(".ideas-hub-session.json"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
