use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::error::{JanitorError, Result};
use crate::tasks::TaskSet;

pub const DEFAULT_DAYS: u32 = 30;
pub const DEFAULT_CONTAINER: &str = "mastodon-web";
pub const DEFAULT_TOOTCTL: &str = "tootctl";
pub const DEFAULT_DISK_USAGE_PATH: &str = "/opt/mastodon/public/system";
pub const DEFAULT_LOG_DIR: &str = "/var/log/mastodon-janitor";
const LOCK_FILE_NAME: &str = "mastodon-janitor.pid";

/// Optional TOML configuration file. Every key may be omitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub container: String,
    pub log_dir: PathBuf,
    pub lock_file: PathBuf,
    pub default_days: u32,
    pub tootctl: String,
    pub exec_user: Option<String>,
    pub docker_socket: Option<String>,
    pub disk_usage_path: String,
    pub report_disk_usage: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            container: DEFAULT_CONTAINER.to_string(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            lock_file: std::env::temp_dir().join(LOCK_FILE_NAME),
            default_days: DEFAULT_DAYS,
            tootctl: DEFAULT_TOOTCTL.to_string(),
            exec_user: None,
            docker_socket: None,
            disk_usage_path: DEFAULT_DISK_USAGE_PATH.to_string(),
            report_disk_usage: true,
        }
    }
}

impl FileConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("mastodon-janitor")
            .join("config.toml")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| JanitorError::ConfigError(format!("Cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| JanitorError::ConfigError(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// An explicitly named file must exist; the default location is optional.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Immutable settings for one run, resolved from the config file with
/// command-line values taking precedence.
#[derive(Debug, Clone)]
pub struct Settings {
    pub days: u32,
    pub container: String,
    pub log_dir: PathBuf,
    pub lock_file: PathBuf,
    pub logging: bool,
    pub tasks: TaskSet,
    pub tootctl: String,
    pub exec_user: Option<String>,
    pub docker_socket: Option<String>,
    pub disk_usage_path: String,
    pub report_disk_usage: bool,
}

impl Settings {
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self> {
        let settings = Self {
            days: cli.days.unwrap_or(file.default_days),
            container: cli.container.clone().unwrap_or(file.container),
            log_dir: cli.log_dir.clone().unwrap_or(file.log_dir),
            lock_file: cli.lock_file.clone().unwrap_or(file.lock_file),
            logging: cli.logging,
            tasks: cli.selected_tasks(),
            tootctl: file.tootctl,
            exec_user: file.exec_user,
            docker_socket: file.docker_socket,
            disk_usage_path: file.disk_usage_path,
            report_disk_usage: file.report_disk_usage,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.days == 0 {
            return Err(JanitorError::ConfigError("default_days must be at least 1".to_string()));
        }
        if self.container.trim().is_empty() {
            return Err(JanitorError::ConfigError("container name must not be empty".to_string()));
        }
        if self.tootctl.trim().is_empty() {
            return Err(JanitorError::ConfigError("tootctl path must not be empty".to_string()));
        }
        Ok(())
    }
}
