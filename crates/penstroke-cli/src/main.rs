//! Penstroke - a terminal client for the penstroke notes service.
//!
//! Signs in against the notes service, keeps the session between runs, and
//! lists, creates, edits, searches, and deletes the signed-in user's notes.

mod app;
mod format;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, Command};

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes buffered log lines on drop and must be held
/// until exit.
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (writer, guard) = tracing_appender::non_blocking(io::stderr());
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            drop(guard);
            std::process::exit(2);
        }
    };

    info!(?command, "penstroke starting");

    let result = match App::new() {
        Ok(mut app) => app.run(command).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        drop(guard);
        std::process::exit(1);
    }
    Ok(())
}
