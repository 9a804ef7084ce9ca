use std::path::PathBuf;
use thiserror::Error;

use crate::tasks::Task;

#[derive(Error, Debug)]
pub enum JanitorError {
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Container {container} is not running (status: {status})")]
    ContainerNotRunning { container: String, status: String },

    #[error("Another run is already in progress (pid {pid}, lock file {})", .path.display())]
    AlreadyRunning { pid: u32, path: PathBuf },

    #[error("Cannot create lock file {}: {source}", .path.display())]
    LockCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown flag: {0}")]
    UnknownFlag(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task {task} failed: `{command}` {reason}")]
    RemoteCommandFailed {
        task: Task,
        command: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cannot set up logging in {}: {source}", .path.display())]
    LogSetupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Docker error: {0}")]
    DockerError(#[from] janitor_docker::DockerError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JanitorError>;
