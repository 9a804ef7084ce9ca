//! Maintenance tasks and the sequential dispatcher that runs them.

use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;
use tracing::{error, info};

use crate::error::JanitorError;
use crate::executor::{CommandExecutor, RemoteCommand};

/// One maintenance operation. Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Task {
    AccountsPrune,
    StatusesRemove,
    MediaRemove,
    MediaRemoveOrphan,
    PreviewCardsRemove,
    CacheClear,
    MediaUsage,
}

impl Task {
    pub const ALL: [Task; 7] = [
        Task::AccountsPrune,
        Task::StatusesRemove,
        Task::MediaRemove,
        Task::MediaRemoveOrphan,
        Task::PreviewCardsRemove,
        Task::CacheClear,
        Task::MediaUsage,
    ];

    /// Tasks enabled by `--cleanup`. Account pruning and media usage stay opt-in.
    pub const CLEANUP: [Task; 5] = [
        Task::StatusesRemove,
        Task::MediaRemove,
        Task::MediaRemoveOrphan,
        Task::PreviewCardsRemove,
        Task::CacheClear,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Task::AccountsPrune => "accounts-prune",
            Task::StatusesRemove => "statuses-remove",
            Task::MediaRemove => "media-remove",
            Task::MediaRemoveOrphan => "media-remove-orphan",
            Task::PreviewCardsRemove => "preview-cards-remove",
            Task::CacheClear => "cache-clear",
            Task::MediaUsage => "media-usage",
        }
    }

    /// Commands issued for this task, in order. `tootctl` is the program path
    /// inside the container.
    pub fn remote_commands(&self, tootctl: &str, days: u32) -> Vec<RemoteCommand> {
        let days = days.to_string();
        let days = days.as_str();

        match self {
            Task::AccountsPrune => vec![tootctl_command(tootctl, &["accounts", "prune"])],
            Task::StatusesRemove => vec![tootctl_command(tootctl, &["statuses", "remove", "--days", days])],
            Task::MediaRemove => vec![
                tootctl_command(tootctl, &["media", "remove", "--days", days]),
                tootctl_command(tootctl, &["media", "remove", "--prune-profiles", "--days", days]),
            ],
            Task::MediaRemoveOrphan => vec![tootctl_command(tootctl, &["media", "remove-orphans"])],
            Task::PreviewCardsRemove => vec![tootctl_command(tootctl, &["preview_cards", "remove", "--days", days])],
            Task::CacheClear => vec![tootctl_command(tootctl, &["cache", "clear"])],
            Task::MediaUsage => vec![tootctl_command(tootctl, &["media", "usage"])],
        }
    }
}

fn tootctl_command(tootctl: &str, args: &[&str]) -> RemoteCommand {
    RemoteCommand::new(std::iter::once(tootctl).chain(args.iter().copied()))
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The enabled tasks. Iteration always follows the fixed execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSet(BTreeSet<Task>);

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&mut self, task: Task) {
        self.0.insert(task);
    }

    pub fn enable_cleanup(&mut self) {
        self.0.extend(Task::CLEANUP);
    }

    pub fn contains(&self, task: Task) -> bool {
        self.0.contains(&task)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Task> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Task> for TaskSet {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Task> for TaskSet {
    fn extend<I: IntoIterator<Item = Task>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

#[derive(Debug)]
pub struct TaskReport {
    pub task: Task,
    pub result: Result<(), JanitorError>,
}

impl TaskReport {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<TaskReport>,
}

impl RunSummary {
    pub fn failed(&self) -> impl Iterator<Item = &TaskReport> {
        self.reports.iter().filter(|report| !report.succeeded())
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.reports.iter().map(|report| report.task).collect()
    }
}

/// Where and how remote commands run.
#[derive(Debug, Clone)]
pub struct ExecTarget {
    pub container: String,
    pub tootctl: String,
}

/// Run every enabled task once, in fixed order. A failing task is recorded and
/// the remaining tasks still run.
pub async fn run_tasks<E>(
    executor: &E,
    target: &ExecTarget,
    tasks: &TaskSet,
    days: u32,
    out: &mut (dyn Write + Send),
) -> RunSummary
where
    E: CommandExecutor + ?Sized,
{
    let mut summary = RunSummary::default();

    for task in tasks.iter() {
        info!(task = %task, days, "Running task");
        let result = run_task(executor, target, task, days, out).await;
        match &result {
            Ok(()) => info!(task = %task, "Task finished"),
            Err(err) => error!(task = %task, error = %err, "Task failed"),
        }
        summary.reports.push(TaskReport { task, result });
    }

    summary
}

/// Commands within a task run in order and stop at the first failure.
async fn run_task<E>(
    executor: &E,
    target: &ExecTarget,
    task: Task,
    days: u32,
    out: &mut (dyn Write + Send),
) -> Result<(), JanitorError>
where
    E: CommandExecutor + ?Sized,
{
    for command in task.remote_commands(&target.tootctl, days) {
        let _ = writeln!(out, "==> {}", command);

        let reason = match executor.exec(&target.container, &command, out).await {
            Ok(outcome) if outcome.success() => continue,
            Ok(outcome) => format!("exited with code {}", outcome.exit_code),
            Err(err) => format!("could not be executed: {}", err),
        };

        return Err(JanitorError::RemoteCommandFailed {
            task,
            command: command.to_string(),
            reason,
        });
    }

    Ok(())
}
