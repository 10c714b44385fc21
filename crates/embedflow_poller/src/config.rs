//! Configuration for the poller

use crate::error::{PollerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for a poller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Basenames of the files that may be downloaded
    #[serde(default)]
    pub allowed_files: Vec<String>,

    /// Directory that downloaded files are copied into
    #[serde(default = "default_download_location")]
    pub download_location: String,

    /// JSON file holding last-known modification times.
    /// Without it, state lives only as long as the handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_path: Option<String>,

    /// Seconds between passes in watch mode
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Location to watch
    pub app_location: AppLocation,

    /// Executor to notify after a pass that downloaded something
    #[serde(default)]
    pub executor: ExecutorConfig,
}

/// A watched location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppLocation {
    pub path: String,
    #[serde(default)]
    pub kind: LocationKind,
}

/// Storage backend of a watched location
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    #[default]
    Local,
}

/// Command run when a pass changed something. Empty means log only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub command: Vec<String>,
}

fn default_download_location() -> String {
    let home = std::env::var_os("EMBEDFLOW_HOME")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".embedflow")))
        .unwrap_or_else(|| PathBuf::from(".embedflow"));
    home.join("downloads").to_string_lossy().to_string()
}

fn default_poll_interval() -> u64 {
    30
}

impl PollerConfig {
    /// Configuration for a local directory with defaults for everything else
    pub fn local(path: impl Into<String>, allowed_files: Vec<String>) -> Self {
        Self {
            app_location: AppLocation {
                path: path.into(),
                kind: LocationKind::Local,
            },
            allowed_files,
            download_location: default_download_location(),
            state_path: None,
            poll_interval_secs: default_poll_interval(),
            executor: ExecutorConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PollerConfig =
            toml::from_str(&content).map_err(|e| PollerError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PollerError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_location.path.trim().is_empty() {
            return Err(PollerError::Config("app_location.path is empty".to_string()));
        }
        if self.download_location.trim().is_empty() {
            return Err(PollerError::Config("download_location is empty".to_string()));
        }
        if is_within(
            Path::new(&self.download_location),
            Path::new(&self.app_location.path),
        ) {
            return Err(PollerError::Config(format!(
                "download_location '{}' must be outside app_location.path '{}'",
                self.download_location, self.app_location.path
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(PollerError::Config(
                "poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a file with this basename may be downloaded
    pub fn is_allowed(&self, file_name: &str) -> bool {
        self.allowed_files.iter().any(|allowed| allowed == file_name)
    }
}

/// Resolve both paths when they exist, so links and `..` compare by target.
fn resolve_pair(a: &Path, b: &Path) -> (PathBuf, PathBuf) {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => (a, b),
        _ => (a.to_path_buf(), b.to_path_buf()),
    }
}

/// True when `a` and `b` name the same filesystem location.
pub(crate) fn same_location(a: &Path, b: &Path) -> bool {
    let (a, b) = resolve_pair(a, b);
    a == b
}

/// True when `child` is `parent` or lies underneath it.
pub(crate) fn is_within(child: &Path, parent: &Path) -> bool {
    let (child, parent) = resolve_pair(child, parent);
    child.starts_with(parent)
}
