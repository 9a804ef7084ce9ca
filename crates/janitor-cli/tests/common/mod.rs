//! Recording stand-in for the Docker-backed executor.

#![allow(dead_code)]

use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use janitor_cli::config::FileConfig;
use janitor_cli::executor::{CommandExecutor, ExecOutcome, RemoteCommand};
use janitor_cli::{JanitorError, Result, Settings, TaskSet};
use janitor_docker::{ContainerStatus, DockerError};

pub struct RecordingExecutor {
    reachable: bool,
    status: ContainerStatus,
    /// Commands whose rendered form contains one of these fragments exit 1.
    failing: Vec<String>,
    /// Recorded commands never finish, like a long tootctl run.
    hanging: bool,
    commands: Mutex<Vec<RemoteCommand>>,
    status_checks: Mutex<usize>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            reachable: true,
            status: ContainerStatus::Running,
            failing: Vec::new(),
            hanging: false,
            commands: Mutex::new(Vec::new()),
            status_checks: Mutex::new(0),
        }
    }

    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn with_status(mut self, status: ContainerStatus) -> Self {
        self.status = status;
        self
    }

    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.failing.push(fragment.to_string());
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hanging = true;
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().iter().map(ToString::to_string).collect()
    }

    /// Recorded commands that went through tootctl, dropping disk usage queries.
    pub fn tootctl_commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|cmd| cmd.program() == Some("tootctl"))
            .map(ToString::to_string)
            .collect()
    }

    pub fn status_checks(&self) -> usize {
        *self.status_checks.lock().unwrap()
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn ping(&self) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(DockerError::ConnectionError("connection refused".to_string()).into())
        }
    }

    async fn container_status(&self, _container: &str) -> Result<ContainerStatus> {
        *self.status_checks.lock().unwrap() += 1;
        Ok(self.status.clone())
    }

    async fn exec(
        &self,
        container: &str,
        command: &RemoteCommand,
        out: &mut (dyn Write + Send),
    ) -> Result<ExecOutcome> {
        if !self.status.is_running() {
            return Err(JanitorError::ContainerNotRunning {
                container: container.to_string(),
                status: self.status.to_string(),
            });
        }

        self.commands.lock().unwrap().push(command.clone());
        let rendered = command.to_string();
        writeln!(out, "ran: {}", rendered)?;

        if self.hanging {
            std::future::pending::<()>().await;
        }

        let exit_code = if self.failing.iter().any(|fragment| rendered.contains(fragment.as_str())) {
            1
        } else {
            0
        };
        Ok(ExecOutcome { exit_code })
    }
}

/// Settings pointing every file at `dir`, with disk reporting off.
pub fn settings_in(dir: &Path, tasks: TaskSet, days: u32) -> Settings {
    let file = FileConfig::default();
    Settings {
        days,
        container: "mastodon-web".to_string(),
        log_dir: dir.join("logs"),
        lock_file: dir.join("janitor.pid"),
        logging: false,
        tasks,
        tootctl: file.tootctl,
        exec_user: None,
        docker_socket: None,
        disk_usage_path: file.disk_usage_path,
        report_disk_usage: false,
    }
}
