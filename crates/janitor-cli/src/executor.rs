//! Remote command execution against the Mastodon container.
//!
//! Task logic only sees the [`CommandExecutor`] trait; [`DockerExecutor`] is the
//! production implementation backed by the Docker Engine API.

use async_trait::async_trait;
use std::fmt;
use std::io::Write;

use janitor_docker::{ContainerManager, ContainerStatus};

use crate::error::Result;

/// One command line to run inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    argv: Vec<String>,
}

impl RemoteCommand {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv.join(" "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutcome {
    pub exit_code: i64,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Container runtime capability consumed by the pre-flight checks, the task
/// dispatcher and the session reporter.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Verify the container engine answers.
    async fn ping(&self) -> Result<()>;

    async fn container_status(&self, container: &str) -> Result<ContainerStatus>;

    /// Run `command` in `container`, streaming its output into `out`. Blocks
    /// until the command exits; a non-zero exit is an `Ok` outcome.
    async fn exec(
        &self,
        container: &str,
        command: &RemoteCommand,
        out: &mut (dyn Write + Send),
    ) -> Result<ExecOutcome>;
}

pub struct DockerExecutor {
    manager: ContainerManager,
    user: Option<String>,
}

impl DockerExecutor {
    pub fn connect(socket: Option<&str>, user: Option<String>) -> Result<Self> {
        let manager = ContainerManager::with_socket(socket)?;
        Ok(Self { manager, user })
    }
}

#[async_trait]
impl CommandExecutor for DockerExecutor {
    async fn ping(&self) -> Result<()> {
        Ok(self.manager.ping().await?)
    }

    async fn container_status(&self, container: &str) -> Result<ContainerStatus> {
        Ok(self.manager.get_container_status(container).await?)
    }

    async fn exec(
        &self,
        container: &str,
        command: &RemoteCommand,
        out: &mut (dyn Write + Send),
    ) -> Result<ExecOutcome> {
        let exit_code = self
            .manager
            .exec_command(container, command.argv(), self.user.as_deref(), out)
            .await?;
        Ok(ExecOutcome { exit_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_command_display() {
        let cmd = RemoteCommand::new(["tootctl", "statuses", "remove", "--days", "7"]);
        assert_eq!(cmd.to_string(), "tootctl statuses remove --days 7");
        assert_eq!(cmd.program(), Some("tootctl"));
        assert_eq!(cmd.argv().len(), 5);
    }

    #[test]
    fn test_exec_outcome_success() {
        assert!(ExecOutcome { exit_code: 0 }.success());
        assert!(!ExecOutcome { exit_code: 1 }.success());
        assert!(!ExecOutcome { exit_code: -1 }.success());
    }
}
