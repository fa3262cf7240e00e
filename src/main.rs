//! Main entry point for the zipup CLI application.

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use zipup::cli::{self, BIN_NAME};
use zipup::path::path_to_posix;
use zipup::{build_archive, ErrorKind, Invocation};

/// Install the stderr log subscriber. `RUST_LOG` overrides the default `warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Application entry point.
///
/// Exit code 0 on success or when help/examples were requested, 1 otherwise.
#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let tokens: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    let cwd = match std::env::current_dir() {
        Ok(dir) => path_to_posix(&dir),
        Err(e) => {
            eprintln!("Cannot determine the current directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match Invocation::from_tokens(&tokens, &cwd) {
        Ok(Invocation::Help { is_error }) => {
            if is_error {
                eprintln!("{}", cli::usage());
                return ExitCode::FAILURE;
            }
            println!("{}", cli::usage());
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Examples) => {
            println!("{}", cli::examples());
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Build(plan)) => build_archive(&plan).await.map(|_| ()),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.kind() {
                ErrorKind::Validation => {
                    eprintln!("{err}");
                    eprintln!("Run \"{BIN_NAME} --help\" for usage");
                }
                ErrorKind::Filesystem | ErrorKind::Write => eprintln!("{err}"),
            }
            ExitCode::FAILURE
        }
    }
}
