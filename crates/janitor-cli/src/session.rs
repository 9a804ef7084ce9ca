//! Session reporting: output duplication to a log file, log retention,
//! start/end timestamps and elapsed time.

use chrono::{DateTime, Local, SubsecRound, TimeZone};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::MakeWriter;

use crate::error::{JanitorError, Result};
use crate::executor::{CommandExecutor, RemoteCommand};

pub const LOG_FILE_PREFIX: &str = "mastodon-janitor-";
pub const LOG_FILE_SUFFIX: &str = ".log";
pub const LOG_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Process output sink. Everything written through it goes to the real
/// stdout/stderr and, once a log file is attached, to that file as well.
///
/// Cheap to clone; clones share the attached file. Also serves as the
/// `tracing_subscriber` writer so log events are duplicated the same way.
#[derive(Debug, Clone, Default)]
pub struct Console {
    log_file: Arc<Mutex<Option<File>>>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(&self) -> TeeWriter {
        TeeWriter {
            stream: Stream::Stdout,
            log_file: Arc::clone(&self.log_file),
        }
    }

    pub fn stderr(&self) -> TeeWriter {
        TeeWriter {
            stream: Stream::Stderr,
            log_file: Arc::clone(&self.log_file),
        }
    }

    pub fn attach_log_file(&self, file: File) {
        if let Ok(mut slot) = self.log_file.lock() {
            *slot = Some(file);
        }
    }

    pub fn is_logging(&self) -> bool {
        self.log_file.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

impl<'a> MakeWriter<'a> for Console {
    type Writer = TeeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.stderr()
    }
}

pub struct TeeWriter {
    stream: Stream,
    log_file: Arc<Mutex<Option<File>>>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.stream {
            Stream::Stdout => tee_write(&mut io::stdout(), &self.log_file, buf)?,
            Stream::Stderr => tee_write(&mut io::stderr(), &self.log_file, buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let logged = flush_log(&self.log_file)?;
        let flushed = match self.stream {
            Stream::Stdout => io::stdout().flush(),
            Stream::Stderr => io::stderr().flush(),
        };
        match flushed {
            Err(e) if !logged => Err(e),
            _ => Ok(()),
        }
    }
}

/// Write `buf` to the log file, if any, then to `terminal`. A terminal error
/// (a closed pipe, say) is only reported when no log file took the bytes.
fn tee_write(terminal: &mut dyn Write, log_file: &Mutex<Option<File>>, buf: &[u8]) -> io::Result<()> {
    let mut logged = false;
    if let Ok(mut slot) = log_file.lock() {
        if let Some(file) = slot.as_mut() {
            file.write_all(buf)?;
            logged = true;
        }
    }

    match terminal.write_all(buf) {
        Err(e) if !logged => Err(e),
        _ => Ok(()),
    }
}

fn flush_log(log_file: &Mutex<Option<File>>) -> io::Result<bool> {
    if let Ok(mut slot) = log_file.lock() {
        if let Some(file) = slot.as_mut() {
            file.flush()?;
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn log_file_name(at: DateTime<Local>) -> String {
    format!("{}{}{}", LOG_FILE_PREFIX, at.format("%Y%m%d-%H%M%S"), LOG_FILE_SUFFIX)
}

/// Start duplicating output to a dated file in `log_dir`, after deleting
/// log files older than the retention window.
pub fn start_logging(console: &Console, log_dir: &Path, at: DateTime<Local>) -> Result<PathBuf> {
    let setup_failed = |path: &Path, source: io::Error| JanitorError::LogSetupFailed {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(log_dir).map_err(|e| setup_failed(log_dir, e))?;
    let removed = prune_old_logs(log_dir, LOG_RETENTION, SystemTime::now());

    let path = log_dir.join(log_file_name(at));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| setup_failed(&path, e))?;

    console.attach_log_file(file);
    info!(path = %path.display(), removed, "Logging to file");
    Ok(path)
}

/// Delete our own log files whose modification time is older than
/// `retention` relative to `now`. Returns how many were removed; unreadable
/// entries are skipped.
pub fn prune_old_logs(log_dir: &Path, retention: Duration, now: SystemTime) -> usize {
    let Some(cutoff) = now.checked_sub(retention) else {
        return 0;
    };
    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %log_dir.display(), error = %e, "Cannot scan log directory");
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(LOG_FILE_PREFIX) || !name.ends_with(LOG_FILE_SUFFIX) {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        if modified < cutoff {
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "Removed expired log file");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove expired log file"),
            }
        }
    }
    removed
}

/// A duration split into whole hours, minutes and seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElapsedTime {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl ElapsedTime {
    pub fn from_seconds(total: u64) -> Self {
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }

    /// Elapsed time between two timestamps at second granularity. An end
    /// before the start (clock step) counts as zero.
    pub fn between<Tz: TimeZone>(start: &DateTime<Tz>, end: &DateTime<Tz>) -> Self {
        let secs = end.timestamp() - start.timestamp();
        Self::from_seconds(u64::try_from(secs).unwrap_or(0))
    }

    pub fn total_seconds(&self) -> u64 {
        self.hours * 3600 + self.minutes * 60 + self.seconds
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("{} {}", n, unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

impl fmt::Display for ElapsedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            plural(self.hours, "hour"),
            plural(self.minutes, "minute"),
            plural(self.seconds, "second")
        )
    }
}

fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Start/end bookkeeping for one run.
#[derive(Debug)]
pub struct Session {
    started: DateTime<Local>,
}

impl Session {
    pub fn start(out: &mut dyn Write) -> io::Result<Self> {
        let started = Local::now().trunc_subsecs(0);
        writeln!(out, "Maintenance started at {}", format_timestamp(&started))?;
        Ok(Self { started })
    }

    pub fn finish(self, out: &mut dyn Write) -> io::Result<ElapsedTime> {
        let finished = Local::now().trunc_subsecs(0);
        let elapsed = ElapsedTime::between(&self.started, &finished);
        writeln!(out, "Maintenance finished at {}", format_timestamp(&finished))?;
        writeln!(out, "Elapsed: {}", elapsed)?;
        Ok(elapsed)
    }
}

/// Print `df -h <path>` as seen from inside the container. Failures are
/// logged and otherwise ignored.
pub async fn report_disk_usage<E>(
    executor: &E,
    container: &str,
    path: &str,
    label: &str,
    out: &mut (dyn Write + Send),
) where
    E: CommandExecutor + ?Sized,
{
    let command = RemoteCommand::new(["df", "-h", path]);
    let _ = writeln!(out, "Disk usage ({}):", label);

    match executor.exec(container, &command, out).await {
        Ok(outcome) if outcome.success() => {}
        Ok(outcome) => warn!(command = %command, exit_code = outcome.exit_code, "Disk usage query failed"),
        Err(err) => warn!(command = %command, error = %err, "Disk usage query failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_elapsed_decomposition() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 10, 1, 5).unwrap();

        let elapsed = ElapsedTime::between(&start, &end);

        assert_eq!(
            elapsed,
            ElapsedTime {
                hours: 0,
                minutes: 1,
                seconds: 5
            }
        );
        assert_eq!(elapsed.to_string(), "0 hours 1 minute 5 seconds");
    }

    #[test]
    fn test_elapsed_over_hours() {
        let elapsed = ElapsedTime::from_seconds(2 * 3600 + 59);
        assert_eq!(elapsed.to_string(), "2 hours 0 minutes 59 seconds");
        assert_eq!(elapsed.total_seconds(), 7259);
    }

    #[test]
    fn test_elapsed_never_negative() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 10).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(ElapsedTime::between(&start, &end), ElapsedTime::from_seconds(0));
    }

    #[test]
    fn test_log_file_name() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 4, 5, 6).unwrap();
        assert_eq!(log_file_name(at), "mastodon-janitor-20240309-040506.log");
    }

    #[test]
    fn test_prune_removes_only_expired_own_logs() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let now = SystemTime::now();
        let old = now - Duration::from_secs(31 * 24 * 60 * 60);
        let recent = now - Duration::from_secs(2 * 24 * 60 * 60);

        let touch = |name: &str, mtime: SystemTime| {
            let file = File::create(dir.join(name)).unwrap();
            file.set_modified(mtime).unwrap();
        };
        touch("mastodon-janitor-20240101-000000.log", old);
        touch("mastodon-janitor-20240301-000000.log", recent);
        touch("unrelated.log", old);
        touch("mastodon-janitor-notes.txt", old);

        let removed = prune_old_logs(dir, LOG_RETENTION, now);

        assert_eq!(removed, 1);
        assert!(!dir.join("mastodon-janitor-20240101-000000.log").exists());
        assert!(dir.join("mastodon-janitor-20240301-000000.log").exists());
        assert!(dir.join("unrelated.log").exists());
        assert!(dir.join("mastodon-janitor-notes.txt").exists());
    }

    #[test]
    fn test_start_logging_tees_output() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("logs");
        let console = Console::new();
        assert!(!console.is_logging());

        let path = start_logging(&console, &log_dir, Local::now()).unwrap();
        assert!(console.is_logging());

        writeln!(console.stdout(), "to stdout").unwrap();
        writeln!(console.stderr(), "to stderr").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("to stdout"));
        assert!(content.contains("to stderr"));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn test_closed_terminal_does_not_lose_logged_output() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.log");
        let log_file = Mutex::new(Some(File::create(&path).unwrap()));

        tee_write(&mut ClosedPipe, &log_file, b"Removed 12 statuses\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "Removed 12 statuses\n");
    }

    #[test]
    fn test_closed_terminal_is_an_error_without_log_file() {
        let log_file = Mutex::new(None);

        let err = tee_write(&mut ClosedPipe, &log_file, b"lost\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_start_logging_fails_when_dir_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let not_a_dir = temp_dir.path().join("occupied");
        File::create(&not_a_dir).unwrap();

        let result = start_logging(&Console::new(), &not_a_dir, Local::now());
        assert!(matches!(result, Err(JanitorError::LogSetupFailed { .. })));
    }

    #[test]
    fn test_session_reports_timestamps() {
        let mut out = Vec::new();
        let session = Session::start(&mut out).unwrap();
        let elapsed = session.finish(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Maintenance started at"));
        assert!(text.contains("Maintenance finished at"));
        assert!(text.contains(&format!("Elapsed: {}", elapsed)));
    }
}
