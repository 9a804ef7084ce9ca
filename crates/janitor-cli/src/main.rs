use colored::*;
use std::process;
use tracing::warn;

use janitor_cli::{
    parse_invocation, report_fatal, Cli, CommandHandler, Console, DockerExecutor, FileConfig, Invocation,
    JanitorError, Settings, EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_SUCCESS, EXIT_TERMINATED,
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match parse_invocation(std::env::args_os()) {
        Invocation::Run(cli) => cli,
        Invocation::Info(text) => {
            print!("{}", text);
            process::exit(EXIT_SUCCESS);
        }
        Invocation::Rejected { error, usage } => {
            eprintln!("{} {}", "Error:".red(), error);
            eprintln!();
            eprint!("{}", usage);
            process::exit(EXIT_FAILURE);
        }
    };

    let console = Console::new();
    setup_logging(&console, cli.verbose, !cli.logging);

    // Everything owned by `run` is dropped, lock included, before we exit.
    let code = run(*cli, console).await;
    process::exit(code);
}

async fn run(cli: Cli, console: Console) -> i32 {
    let settings = match FileConfig::load_or_default(cli.config.as_deref()).and_then(|file| Settings::resolve(&cli, file)) {
        Ok(settings) => settings,
        Err(e) => return report_fatal(&console, &e),
    };

    if settings.logging {
        colored::control::set_override(false);
    }

    let executor = match DockerExecutor::connect(settings.docker_socket.as_deref(), settings.exec_user.clone()) {
        Ok(executor) => executor,
        Err(e) => {
            let e = JanitorError::MissingDependency(format!("Docker client unavailable ({})", e));
            return report_fatal(&console, &e);
        }
    };

    CommandHandler::new(settings, executor, console)
        .execute(shutdown_signal())
        .await
}

/// Resolves with the conventional exit code once SIGINT or SIGTERM arrives.
async fn shutdown_signal() -> i32 {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        Ok(()) = tokio::signal::ctrl_c() => EXIT_INTERRUPTED,
        () = terminate => EXIT_TERMINATED,
    }
}

fn setup_logging(console: &Console, verbose: bool, ansi: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,janitor_cli={level},janitor_docker={level},mastodon_janitor={level}")));

    fmt()
        .with_env_filter(filter)
        .with_writer(console.clone())
        .with_ansi(ansi)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
