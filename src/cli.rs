//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// binwatch - chat-driven bin fullness monitoring
#[derive(Debug, Parser)]
#[command(name = "binwatch", version, about)]
pub struct Cli {
    /// Path to a config file (default: .binwatch.yml, then user config)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bot in the foreground (default)
    Run,

    /// Load and validate the configuration, then exit
    CheckConfig,
}
