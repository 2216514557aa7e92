//! Command-line interface for the `jotter` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, EditCommand, ListCommand, NewCommand, ServeCommand, ShowCommand, StatusCommand,
};

use crate::logging::Verbosity;

/// jotter - a small note-taking app
///
/// Serves the browser UI and manages the local note database.
#[derive(Debug, Parser)]
#[command(name = "jotter")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the web UI from a directory
    Serve(ServeCommand),

    /// List notes, most recently modified first
    List(ListCommand),

    /// Create a note
    New(NewCommand),

    /// Print one note
    Show(ShowCommand),

    /// Change a note's title or body
    Edit(EditCommand),

    /// Show database status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}
