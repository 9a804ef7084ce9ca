use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::ContainerState;
use bollard::Docker;
use futures_util::stream::StreamExt;
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::debug;

use crate::error::{DockerError, Result};

/// Client timeout in seconds for non-streaming Engine API calls.
const CLIENT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    Paused,
    Restarting,
    Removing,
    Dead,
    Created,
    Exited(i64), // exit code
    NotFound,
    Unknown(String),
}

impl ContainerStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running)
    }

    fn from_state(state: Option<ContainerState>) -> Self {
        let Some(state) = state else {
            return ContainerStatus::Unknown("No state information".to_owned());
        };

        if state.running.unwrap_or(false) {
            // Docker reports running=true for paused and restarting containers too
            if state.paused.unwrap_or(false) {
                ContainerStatus::Paused
            } else if state.restarting.unwrap_or(false) {
                ContainerStatus::Restarting
            } else {
                ContainerStatus::Running
            }
        } else if state.restarting.unwrap_or(false) {
            ContainerStatus::Restarting
        } else if state.dead.unwrap_or(false) {
            ContainerStatus::Dead
        } else if let Some(status) = state.status {
            match ContainerStatus::from(status.to_string().as_str()) {
                ContainerStatus::Exited(_) => ContainerStatus::Exited(state.exit_code.unwrap_or(0)),
                other => other,
            }
        } else if let Some(exit_code) = state.exit_code {
            ContainerStatus::Exited(exit_code)
        } else {
            ContainerStatus::Unknown("No state information".to_owned())
        }
    }
}

impl From<&str> for ContainerStatus {
    fn from(status: &str) -> Self {
        match status.to_lowercase().as_str() {
            "running" => ContainerStatus::Running,
            "paused" => ContainerStatus::Paused,
            "restarting" => ContainerStatus::Restarting,
            "removing" => ContainerStatus::Removing,
            "dead" => ContainerStatus::Dead,
            "created" => ContainerStatus::Created,
            s if s.starts_with("exited") => {
                // Parse exit code from "exited (code)"
                let code = s
                    .strip_prefix("exited (")
                    .and_then(|s| s.strip_suffix(')'))
                    .and_then(|s| s.parse::<i64>().ok())
                    .unwrap_or(0);
                ContainerStatus::Exited(code)
            }
            _ => ContainerStatus::Unknown(status.to_string()),
        }
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerStatus::Running => write!(f, "running"),
            ContainerStatus::Paused => write!(f, "paused"),
            ContainerStatus::Restarting => write!(f, "restarting"),
            ContainerStatus::Removing => write!(f, "removing"),
            ContainerStatus::Dead => write!(f, "dead"),
            ContainerStatus::Created => write!(f, "created"),
            ContainerStatus::Exited(code) => write!(f, "exited({})", code),
            ContainerStatus::NotFound => write!(f, "not_found"),
            ContainerStatus::Unknown(status) => write!(f, "unknown({})", status),
        }
    }
}

/// Thin wrapper over the Docker Engine API covering what a maintenance run needs:
/// reachability, container state and attached exec.
#[derive(Clone)]
pub struct ContainerManager {
    docker: Docker,
}

impl ContainerManager {
    /// Connect using `DOCKER_HOST` or the platform default socket.
    pub fn new() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DockerError::ConnectionError(format!("Failed to connect to Docker: {}", e)))?;
        Ok(Self { docker })
    }

    /// Connect to an explicit unix socket, falling back to the defaults when `None`.
    pub fn with_socket(socket: Option<&str>) -> Result<Self> {
        let Some(path) = socket else {
            return Self::new();
        };

        let docker = Docker::connect_with_unix(path, CLIENT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            .map_err(|e| DockerError::ConnectionError(format!("Failed to connect to Docker at {}: {}", path, e)))?;
        Ok(Self { docker })
    }

    pub async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| DockerError::ConnectionError(e.to_string()))
    }

    pub async fn get_container_status(&self, name: &str) -> Result<ContainerStatus> {
        match self.docker.inspect_container(name, None).await {
            Ok(info) => Ok(ContainerStatus::from_state(info.state)),
            Err(BollardError::DockerResponseServerError { status_code: 404, .. }) => Ok(ContainerStatus::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Run `cmd` inside `container`, streaming its stdout/stderr into `sink`
    /// as it arrives, and return the command's exit code.
    ///
    /// There is no timeout: the call returns only once the command finishes.
    pub async fn exec_command<W>(
        &self,
        container: &str,
        cmd: &[String],
        user: Option<&str>,
        sink: &mut W,
    ) -> Result<i64>
    where
        W: Write + Send + ?Sized,
    {
        let exec_options = CreateExecOptions {
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            cmd: Some(cmd.to_vec()),
            user: user.map(str::to_owned),
            ..Default::default()
        };

        let exec = self.docker.create_exec(container, exec_options).await?;
        debug!(container, exec_id = %exec.id, "Created exec instance");

        match self.docker.start_exec(&exec.id, None).await? {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(chunk) = output.next().await {
                    sink.write_all(&chunk?.into_bytes())?;
                }
                sink.flush()?;
            }
            StartExecResults::Detached => {
                return Err(DockerError::ExecError {
                    container: container.to_owned(),
                    message: "Failed to attach to exec".to_owned(),
                });
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        inspect.exit_code.ok_or_else(|| DockerError::ExecError {
            container: container.to_owned(),
            message: "exec finished without an exit code".to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::ContainerStateStatusEnum;

    #[test]
    fn test_status_from_running_state() {
        let state = ContainerState {
            running: Some(true),
            status: Some(ContainerStateStatusEnum::RUNNING),
            ..Default::default()
        };
        assert_eq!(ContainerStatus::from_state(Some(state)), ContainerStatus::Running);
    }

    #[test]
    fn test_status_from_paused_state() {
        let state = ContainerState {
            running: Some(true),
            paused: Some(true),
            ..Default::default()
        };
        let status = ContainerStatus::from_state(Some(state));
        assert_eq!(status, ContainerStatus::Paused);
        assert!(!status.is_running());
    }

    #[test]
    fn test_status_from_exited_state() {
        let state = ContainerState {
            running: Some(false),
            status: Some(ContainerStateStatusEnum::EXITED),
            exit_code: Some(137),
            ..Default::default()
        };
        assert_eq!(ContainerStatus::from_state(Some(state)), ContainerStatus::Exited(137));
    }

    #[test]
    fn test_status_without_state() {
        assert!(matches!(ContainerStatus::from_state(None), ContainerStatus::Unknown(_)));
    }
}
