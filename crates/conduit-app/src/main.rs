mod cli;
mod host;
mod replay;

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::process::ExitCode;

use conduit_config::ConduitConfig;
use tracing_subscriber::EnvFilter;

use cli::{Args, Command};
use host::BrowserHost;

fn load_config(args: &Args) -> Result<ConduitConfig, conduit_common::ConfigError> {
    match &args.config {
        Some(path) => conduit_config::load_config_from(path),
        None => conduit_config::load_config(),
    }
}

fn init_logging(args: &Args, config: &ConduitConfig) {
    let log_directive = args
        .log_level
        .as_deref()
        .unwrap_or(config.logging.level.directive());
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| "conduit=info".parse().unwrap()),
            ),
        )
        .init();
}

fn run_replay(config: &ConduitConfig, file: Option<&Path>) -> conduit_common::Result<()> {
    let host = BrowserHost::new(config);
    let stdout = io::stdout().lock();
    let summary = match file {
        Some(path) => replay::run(&host, BufReader::new(File::open(path)?), stdout)?,
        None => replay::run(&host, io::stdin().lock(), stdout)?,
    };
    tracing::info!(steps = summary.steps, errors = summary.errors, "replay finished");
    Ok(())
}

fn main() -> ExitCode {
    let args = cli::parse();

    // Logging needs the configured level, so config loads first and any
    // failure is reported once the subscriber is up.
    let loaded = load_config(&args);
    let config = loaded.as_ref().cloned().unwrap_or_default();
    init_logging(&args, &config);

    tracing::info!("Conduit v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(ref path) = args.config {
        tracing::info!(path = %path.display(), "using config override");
    }
    if let Err(e) = &loaded {
        tracing::warn!(error = %e, "config load failed, using defaults");
    }

    match &args.command {
        Command::Config => {
            println!("{}", conduit_config::config_to_json(&config));
            ExitCode::SUCCESS
        }
        Command::Replay { file } => match run_replay(&config, file.as_deref()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "replay failed");
                ExitCode::FAILURE
            }
        },
    }
}
