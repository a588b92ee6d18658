//! Listener CRUD subcommands

use super::read_script;
use crate::cli::{ListenerArgs, OutputFormat};
use crate::engine::Engine;
use crate::output;
use anyhow::Result;
use colored::Colorize;
use hearken_core::{ListenerForm, ListenerId};

/// Turn command-line arguments into a listener form
pub fn form_from_args(args: ListenerArgs) -> Result<ListenerForm> {
    let body = match (args.body, args.script) {
        (Some(body), _) => body,
        (None, Some(path)) => read_script(&path)?,
        (None, None) => anyhow::bail!("either --body or --script is required"),
    };

    let mut form = ListenerForm::new(args.name, String::new(), body)
        .with_selectors(args.selectors)
        .with_enabled(!args.disabled);
    if let Some(description) = args.description {
        form = form.with_description(description);
    }
    if let Some(comment) = args.comment {
        form = form.with_comment(comment);
    }
    Ok(form)
}

pub async fn list(engine: &Engine, all: bool, format: OutputFormat) -> Result<()> {
    let defs = engine
        .repository
        .list_listeners(&engine.requestor, all)
        .await?;
    output::listeners(&defs, format)
}

pub async fn show(engine: &Engine, id: i64, format: OutputFormat) -> Result<()> {
    let def = engine
        .repository
        .get_listener(&engine.requestor, ListenerId(id))
        .await?;
    output::listener(&def, format)
}

pub async fn create(engine: &Engine, args: ListenerArgs, format: OutputFormat) -> Result<()> {
    let form = form_from_args(args)?;
    let def = engine
        .repository
        .create_listener(&engine.requestor, form)
        .await?;

    if format == OutputFormat::Table {
        println!("{} listener #{} ({})", "Created".green().bold(), def.id, def.name);
        Ok(())
    } else {
        output::listener(&def, format)
    }
}

pub async fn update(
    engine: &Engine,
    id: i64,
    args: ListenerArgs,
    format: OutputFormat,
) -> Result<()> {
    let form = form_from_args(args)?;
    let def = engine
        .repository
        .update_listener(&engine.requestor, ListenerId(id), form)
        .await?;

    if format == OutputFormat::Table {
        println!("{} listener #{} ({})", "Updated".green().bold(), def.id, def.name);
        Ok(())
    } else {
        output::listener(&def, format)
    }
}

pub async fn delete(engine: &Engine, id: i64) -> Result<()> {
    engine
        .repository
        .delete_listener(&engine.requestor, ListenerId(id))
        .await?;
    println!("{} listener #{}", "Deleted".green().bold(), id);
    Ok(())
}

pub async fn history(engine: &Engine, id: i64, format: OutputFormat) -> Result<()> {
    let changes = engine
        .repository
        .listener_changes(&engine.requestor, ListenerId(id))
        .await?;
    output::changes(&changes, format)
}
