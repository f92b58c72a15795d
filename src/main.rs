//! dirsync - console entry point.
//!
//! # Overview
//!
//! Reads one command per line from stdin and drives the [`Orchestrator`]. Every event
//! the orchestrator pushes is printed to stdout as one JSON line, so another program can
//! follow progress by reading stdout. Diagnostics go to the rolling log file (and to
//! stderr in debug mode).
//!
//! # Execution Flow
//!
//! 1. Load settings from `dirsync.yaml` and `DIRSYNC_*` variables
//! 2. Initialize logging → `<log_dir>/dirsync.<date>`
//! 3. Create the tokio runtime
//! 4. Open the artifact directories and rebuild the registry from them
//! 5. Spawn the event printer, then read commands until `quit` or end of input
//! 6. Stop any running operation, wait for it to finalise, log metrics

use anyhow::{Context, Result};
use dirsync::console::{self, Reply};
use dirsync::{APP_NAME, ConfigManager, Orchestrator, VERSION};
use tokio::io::{AsyncBufReadExt, BufReader};

fn main() -> Result<()> {
    let config_manager = ConfigManager::new(".")?;
    let settings = config_manager.load_settings()?;

    let _log_guard = dirsync::logging::setup_logging_with_console(
        &settings.log_dir,
        APP_NAME,
        settings.debug_mode,
        settings.debug_mode,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("dirsync-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let result = runtime.block_on(run(settings));

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Application shutdown complete");

    result
}

async fn run(settings: dirsync::Settings) -> Result<()> {
    let orchestrator = Orchestrator::from_settings(&settings)?;

    let mut observer = orchestrator.attach();
    let printer = tokio::spawn(async move {
        while let Some(event) = observer.recv().await {
            match event.to_json_line() {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::error!("Cannot encode {} event: {}", event.name(), e),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let command = match console::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        tracing::debug!("Console command: {:?}", command);

        match console::execute(&orchestrator, command) {
            Reply::Print(text) => println!("{}", text),
            Reply::Quit => break,
        }
    }

    if orchestrator.stop().is_ok() {
        tracing::warn!("Input closed during an operation, stopping it");
    }
    orchestrator.wait_idle().await;
    orchestrator.metrics().log_summary();

    // Dropping the last handle closes the bus, which lets the printer drain and exit
    drop(orchestrator);
    if tokio::time::timeout(std::time::Duration::from_secs(1), printer)
        .await
        .is_err()
    {
        tracing::warn!("Event printer did not finish in time");
    }
    Ok(())
}
