use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Conduit: browser-side IPC coordination driven by scripted renderers.
#[derive(Parser, Debug)]
#[command(name = "conduit", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (debug, info, warn, error, or a full filter directive).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a JSON-lines renderer script against a headless browser.
    Replay {
        /// Script file. Reads stdin when omitted.
        file: Option<PathBuf>,
    },
    /// Print the effective configuration as JSON.
    Config,
}

pub fn parse() -> Args {
    Args::parse()
}
