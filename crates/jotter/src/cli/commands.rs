//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::config::Config;
use crate::note::{NoteDraft, NoteId};

/// Arguments for `jotter serve`.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory to serve (overrides server.asset_dir)
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

impl ServeCommand {
    /// Apply the command-line overrides on top of `config`.
    #[must_use]
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(host) = &self.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.dir {
            config.server.asset_dir = Some(dir.clone());
        }
        config
    }
}

/// Arguments for `jotter list`.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments for `jotter new`.
#[derive(Debug, Args)]
pub struct NewCommand {
    /// Title of the new note (defaults to a timestamped title)
    #[arg(short, long)]
    pub title: Option<String>,

    /// Body of the new note
    #[arg(long)]
    pub text: Option<String>,
}

impl NewCommand {
    /// The draft this command describes, if it sets any field.
    #[must_use]
    pub fn draft(&self) -> Option<NoteDraft> {
        if self.title.is_none() && self.text.is_none() {
            return None;
        }
        Some(NoteDraft {
            title: self.title.clone(),
            text: self.text.clone(),
            ..NoteDraft::default()
        })
    }
}

/// Arguments for `jotter show`.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Note id
    pub id: NoteId,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments for `jotter edit`.
#[derive(Debug, Args)]
#[command(group = clap::ArgGroup::new("change").required(true).multiple(true).args(["title", "text"]))]
pub struct EditCommand {
    /// Note id
    pub id: NoteId,

    /// New title
    #[arg(short, long)]
    pub title: Option<String>,

    /// New body
    #[arg(long)]
    pub text: Option<String>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
