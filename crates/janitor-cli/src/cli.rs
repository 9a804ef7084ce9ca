use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::JanitorError;
use crate::tasks::{Task, TaskSet};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mastodon-janitor",
    about = "Run tootctl maintenance tasks inside a Mastodon container",
    version = env!("CARGO_PKG_VERSION"),
    args_override_self = true,
    after_help = "Tasks always run in this order: accounts-prune, statuses-remove, media-remove, \
                  media-remove-orphan, preview-cards-remove, cache-clear, media-usage."
)]
pub struct Cli {
    /// Age threshold in days for statuses, media and preview cards [default: 30]
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub days: Option<u32>,

    /// Duplicate all output to a dated log file (30-day retention)
    #[arg(long)]
    pub logging: bool,

    /// Enable statuses, media, orphan media and preview card removal plus cache clearing
    #[arg(long)]
    pub cleanup: bool,

    /// Prune remote accounts that never interacted with local users
    #[arg(long = "accountsprune")]
    pub accounts_prune: bool,

    /// Remove unreferenced remote statuses older than --days
    #[arg(long = "statusesremove")]
    pub statuses_remove: bool,

    /// Remove cached remote media and profile images older than --days
    #[arg(long = "mediaremove")]
    pub media_remove: bool,

    /// Remove media files no longer referenced by the database
    #[arg(long = "mediaremoveorphan")]
    pub media_remove_orphan: bool,

    /// Remove preview cards older than --days
    #[arg(long = "previewcardsremove")]
    pub preview_cards_remove: bool,

    /// Clear the Rails cache
    #[arg(long = "cacheclear")]
    pub cache_clear: bool,

    /// Report media storage usage (read-only)
    #[arg(long = "mediausage")]
    pub media_usage: bool,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "MASTODON_JANITOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Name of the Mastodon web container
    #[arg(long, value_name = "NAME", env = "MASTODON_JANITOR_CONTAINER")]
    pub container: Option<String>,

    /// Directory for --logging output
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Lock file guarding against concurrent runs
    #[arg(long, value_name = "FILE")]
    pub lock_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn selected_tasks(&self) -> TaskSet {
        let mut tasks = TaskSet::new();
        if self.cleanup {
            tasks.enable_cleanup();
        }

        let flags = [
            (self.accounts_prune, Task::AccountsPrune),
            (self.statuses_remove, Task::StatusesRemove),
            (self.media_remove, Task::MediaRemove),
            (self.media_remove_orphan, Task::MediaRemoveOrphan),
            (self.preview_cards_remove, Task::PreviewCardsRemove),
            (self.cache_clear, Task::CacheClear),
            (self.media_usage, Task::MediaUsage),
        ];
        tasks.extend(flags.into_iter().filter(|(on, _)| *on).map(|(_, task)| task));
        tasks
    }
}

/// What the process should do with its arguments.
#[derive(Debug)]
pub enum Invocation {
    Run(Box<Cli>),
    /// Print to stdout and exit 0 (help, version, bare invocation, nothing selected).
    Info(String),
    /// Print the error and usage to stderr and exit 1.
    Rejected { error: JanitorError, usage: String },
}

pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

pub fn parse_invocation<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if args.len() <= 1 {
        return Invocation::Info(usage());
    }

    match Cli::try_parse_from(&args) {
        Ok(cli) if cli.selected_tasks().is_empty() => {
            Invocation::Info(format!("No maintenance task selected.\n\n{}", usage()))
        }
        Ok(cli) => Invocation::Run(Box::new(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => Invocation::Info(err.to_string()),
            ErrorKind::UnknownArgument => {
                let flag = match err.get(ContextKind::InvalidArg) {
                    Some(ContextValue::String(flag)) => flag.clone(),
                    _ => first_line(&err),
                };
                Invocation::Rejected {
                    error: JanitorError::UnknownFlag(flag),
                    usage: usage(),
                }
            }
            _ => Invocation::Rejected {
                error: JanitorError::InvalidArgument(first_line(&err)),
                usage: usage(),
            },
        },
    }
}

fn first_line(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    let line = rendered.lines().next().unwrap_or_default();
    line.strip_prefix("error: ").unwrap_or(line).to_string()
}
