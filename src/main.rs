use anyhow::{Context, Result};
use bash_gate::config::{self, GateConfig};
use bash_gate::{Gate, InterceptionEvent};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Exit code that tells the host the command was blocked
const BLOCKED: u8 = 2;

/// Route tracing output. Stderr carries the block reason back to the host,
/// so logs go to the configured file, or to stderr only when RUST_LOG asks.
/// A log file that cannot be opened falls back to the stderr path.
fn init_logging(config: &GateConfig) {
    let Some(path) = &config.log_file else {
        init_stderr_logging();
        return;
    };

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => {
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        Err(e) => {
            init_stderr_logging();
            tracing::warn!(path = %path.display(), error = %e, "failed to open log file");
        }
    }
}

fn init_stderr_logging() {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
}

fn main() -> Result<ExitCode> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = config::find_config(config_path.as_deref())?;
    init_logging(&config);

    let event = read_input()?;
    tracing::debug!(tool = %event.tool, "received event");

    let gate = Gate::new(&config);
    match gate.before_tool_execution(&event) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(reason) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("{}", reason);
            }
            Ok(ExitCode::from(BLOCKED))
        }
    }
}

fn read_input() -> Result<InterceptionEvent> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read event from stdin")?;
    let event: InterceptionEvent =
        serde_json::from_str(&buffer).context("Failed to parse event JSON")?;
    Ok(event)
}
