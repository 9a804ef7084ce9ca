use chrono::Local;
use colored::*;
use std::future::Future;
use std::io::Write;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{JanitorError, Result};
use crate::executor::CommandExecutor;
use crate::lock::LockGuard;
use crate::preflight;
use crate::session::{self, Console, Session};
use crate::tasks::{self, ExecTarget, RunSummary};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// SIGINT
pub const EXIT_INTERRUPTED: i32 = 128 + 2;
/// SIGTERM
pub const EXIT_TERMINATED: i32 = 128 + 15;

/// Drives one maintenance run: pre-flight checks, lock, optional file logging,
/// the enabled tasks and the closing report.
pub struct CommandHandler<E> {
    settings: Settings,
    executor: E,
    console: Console,
}

impl<E: CommandExecutor> CommandHandler<E> {
    pub fn new(settings: Settings, executor: E, console: Console) -> Self {
        Self {
            settings,
            executor,
            console,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Returns the per-task outcomes. Errors are the fatal pre-flight kind;
    /// task failures are inside the summary. The lock, once taken, is released
    /// on every return path and when the future is dropped.
    pub async fn run(&self) -> Result<RunSummary> {
        let settings = &self.settings;

        preflight::check_environment(&self.executor, &settings.container).await?;
        let lock = LockGuard::acquire(&settings.lock_file)?;

        if settings.logging {
            session::start_logging(&self.console, &settings.log_dir, Local::now())?;
        }

        info!(
            container = %settings.container,
            pid = lock.pid(),
            days = settings.days,
            tasks = settings.tasks.len(),
            "Starting maintenance"
        );

        let mut out = self.console.stdout();
        let session = Session::start(&mut out)?;

        if settings.report_disk_usage {
            session::report_disk_usage(&self.executor, &settings.container, &settings.disk_usage_path, "before", &mut out)
                .await;
        }

        let target = ExecTarget {
            container: settings.container.clone(),
            tootctl: settings.tootctl.clone(),
        };
        let summary = tasks::run_tasks(&self.executor, &target, &settings.tasks, settings.days, &mut out).await;

        if settings.report_disk_usage {
            session::report_disk_usage(&self.executor, &settings.container, &settings.disk_usage_path, "after", &mut out)
                .await;
        }

        session.finish(&mut out)?;
        print_summary(&summary, &mut out)?;
        Ok(summary)
    }

    /// Run to completion unless `shutdown` resolves first, and return the
    /// process exit code. On shutdown the in-flight command is abandoned and
    /// the run, lock included, is dropped before this returns.
    pub async fn execute<S>(&self, shutdown: S) -> i32
    where
        S: Future<Output = i32>,
    {
        tokio::select! {
            result = self.run() => match result {
                Ok(_summary) => EXIT_SUCCESS,
                Err(e) => report_fatal(&self.console, &e),
            },
            code = shutdown => {
                warn!(exit_code = code, "Interrupted, abandoning the current command and releasing the lock");
                code
            }
        }
    }
}

/// Print a one-line `Error:` message and return the failure exit code.
pub fn report_fatal(console: &Console, error: &JanitorError) -> i32 {
    let _ = writeln!(console.stderr(), "{} {}", "Error:".red(), error);
    EXIT_FAILURE
}

fn print_summary(summary: &RunSummary, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "{}", "Summary:".bold())?;
    for report in &summary.reports {
        match &report.result {
            Ok(()) => writeln!(out, "  {:<22} {}", report.task.name(), "ok".green())?,
            Err(err) => writeln!(out, "  {:<22} {} ({})", report.task.name(), "FAILED".red(), err)?,
        }
    }
    Ok(())
}
