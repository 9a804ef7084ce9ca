pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod lock;
pub mod preflight;
pub mod session;
pub mod tasks;

pub use cli::{parse_invocation, Cli, Invocation};
pub use commands::{report_fatal, CommandHandler, EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_SUCCESS, EXIT_TERMINATED};
pub use config::{FileConfig, Settings};
pub use error::{JanitorError, Result};
pub use executor::{CommandExecutor, DockerExecutor, ExecOutcome, RemoteCommand};
pub use lock::LockGuard;
pub use session::{Console, ElapsedTime};
pub use tasks::{RunSummary, Task, TaskSet};
