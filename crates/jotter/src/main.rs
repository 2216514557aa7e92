//! `jotter` - CLI for the jotter note app.
//!
//! Serves the browser UI and lets notes be listed, created and edited from the
//! terminal through the same provider the UI uses.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use jotter::cli::{
    Cli, Command, ConfigCommand, EditCommand, ListCommand, NewCommand, ShowCommand, StatusCommand,
};
use jotter::{init_logging, App, Config, ConsoleAlerts, Error, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let Cli {
        config: config_path,
        command,
        ..
    } = cli;

    match command {
        Command::Config(cmd) => handle_config(config_path, cmd),
        Command::Serve(cmd) => {
            let config = cmd.apply(load_config(config_path)?);
            config.validate()?;
            jotter::server::serve(&config).await?;
            Ok(())
        }
        Command::List(cmd) => handle_list(&load_config(config_path)?, &cmd).await,
        Command::New(cmd) => handle_new(&load_config(config_path)?, &cmd).await,
        Command::Show(cmd) => handle_show(&load_config(config_path)?, cmd).await,
        Command::Edit(cmd) => handle_edit(&load_config(config_path)?, cmd).await,
        Command::Status(cmd) => handle_status(&load_config(config_path)?, &cmd),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    Config::load_from(path).context("loading configuration")
}

async fn open_app(config: &Config) -> anyhow::Result<App> {
    App::open(config, Arc::new(ConsoleAlerts))
        .await
        .with_context(|| format!("opening {}", config.database_path().display()))
}

async fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let app = open_app(config).await?;
    let notes = app.view_model().summaries();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
    } else if notes.is_empty() {
        println!("No notes.");
    } else {
        for note in notes {
            println!(
                "{}  {}  {}",
                note.id,
                note.modified.format("%Y-%m-%d %H:%M"),
                note.title
            );
        }
    }
    Ok(())
}

async fn handle_new(config: &Config, cmd: &NewCommand) -> anyhow::Result<()> {
    let app = open_app(config).await?;
    let note = app.create_note(cmd.draft());
    app.settle().await;

    if app.store().get(note.id().clone()).await?.is_none() {
        anyhow::bail!("note {} was not saved", note.id());
    }
    println!("{}", note.id());
    Ok(())
}

async fn handle_show(config: &Config, cmd: ShowCommand) -> anyhow::Result<()> {
    let app = open_app(config).await?;
    let record = app
        .store()
        .get(cmd.id.clone())
        .await?
        .ok_or(Error::NoteNotFound { id: cmd.id })?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("{}", record.title);
        println!("{}", "-".repeat(record.title.chars().count().max(3)));
        println!("id:       {}", record.id);
        println!("created:  {}", record.created.to_rfc3339());
        println!("modified: {}", record.modified.to_rfc3339());
        println!();
        println!("{}", record.text);
    }
    Ok(())
}

async fn handle_edit(config: &Config, cmd: EditCommand) -> anyhow::Result<()> {
    let app = open_app(config).await?;
    let view_model = app.view_model();
    let note = view_model
        .find(&cmd.id)
        .ok_or(Error::NoteNotFound { id: cmd.id })?;

    view_model.open_note(&note);
    if let Some(title) = cmd.title {
        view_model.update_title(&note, title);
    }
    if let Some(text) = cmd.text {
        view_model.update_text(&note, text);
    }
    app.settle().await;
    view_model.close_note();

    println!("{}", note.id());
    Ok(())
}

fn handle_status(config: &Config, cmd: &StatusCommand) -> anyhow::Result<()> {
    let storage = Storage::open(config.database_path())?;
    let stats = storage.stats()?;

    if cmd.json {
        let status = serde_json::json!({
            "database_path": storage.path(),
            "schema_version": stats.schema_version,
            "notes": stats.total_notes,
            "last_modified": stats.last_modified,
            "db_size_bytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("jotter status");
        println!("-------------");
        println!("Database:       {}", storage.path().display());
        println!("Schema version: {}", stats.schema_version);
        println!("Notes:          {}", stats.total_notes);
        match stats.last_modified {
            Some(at) => println!("Last modified:  {}", at.to_rfc3339()),
            None => println!("Last modified:  never"),
        }
        println!("Size:           {} bytes", stats.db_size_bytes);
    }
    Ok(())
}

fn handle_config(config_path: Option<PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path: {}", config.database_path().display());
                println!();
                println!("[Server]");
                println!("  Host:          {}", config.server.host);
                println!("  Port:          {}", config.server.port);
                println!("  Asset dir:     {}", config.asset_dir().display());
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => {
                    println!("Configuration error: {e}");
                    return Err(e.into());
                }
            }
        }
    }
    Ok(())
}
