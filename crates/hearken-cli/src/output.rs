//! Table and JSON rendering

use crate::cli::OutputFormat;
use anyhow::Result;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use hearken_core::{InvocationOutcome, InvocationStatus, ListenerChange, ListenerDefinition};
use serde_json::json;

pub fn listeners(defs: &[ListenerDefinition], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(defs)?),
        OutputFormat::Table => {
            if defs.is_empty() {
                println!("{}", "No listeners registered".dimmed());
                return Ok(());
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["ID", "Name", "Selectors", "Enabled", "Updated"]);
            for def in defs {
                table.add_row(vec![
                    Cell::new(def.id),
                    Cell::new(&def.name),
                    Cell::new(def.selectors.join(", ")),
                    enabled_cell(def.enabled),
                    Cell::new(format!(
                        "{} by {}",
                        def.updated_at.format("%Y-%m-%d %H:%M"),
                        def.updated_by
                    )),
                ]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

pub fn listener(def: &ListenerDefinition, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(def)?),
        OutputFormat::Table => {
            println!("{} {}", format!("#{}", def.id).bold(), def.name.bold());
            if let Some(description) = &def.description {
                println!("  {}", description);
            }
            println!("  selectors: {}", def.selectors.join(", "));
            println!(
                "  enabled:   {}",
                if def.enabled { "yes".green() } else { "no".yellow() }
            );
            println!("  created:   {} by {}", def.created_at.to_rfc3339(), def.created_by);
            println!("  updated:   {} by {}", def.updated_at.to_rfc3339(), def.updated_by);
            println!("{}", "--".dimmed());
            println!("{}", def.script_body);
        }
    }
    Ok(())
}

pub fn changes(changes: &[ListenerChange], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(changes)?),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["When", "Author", "Change", "Comment"]);
            for change in changes {
                table.add_row(vec![
                    Cell::new(change.recorded_at.format("%Y-%m-%d %H:%M:%S")),
                    Cell::new(&change.author),
                    Cell::new(change.kind.as_str()),
                    Cell::new(change.comment.as_deref().unwrap_or("")),
                ]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

pub fn outcomes(event_type: &str, outcomes: &[InvocationOutcome], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let body = json!({ "eventType": event_type, "outcomes": outcomes });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Table => {
            if outcomes.is_empty() {
                println!("{}", format!("No listeners for {}", event_type).dimmed());
                return Ok(());
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["ID", "Listener", "Status", "Duration", "Error"]);
            for outcome in outcomes {
                let (status, error) = match &outcome.status {
                    InvocationStatus::Succeeded => (Cell::new("ok").fg(Color::Green), ""),
                    InvocationStatus::Failed { error } => {
                        (Cell::new("failed").fg(Color::Red), error.as_str())
                    }
                    InvocationStatus::TimedOut => (Cell::new("timed out").fg(Color::Yellow), ""),
                };
                table.add_row(vec![
                    Cell::new(outcome.listener_id),
                    Cell::new(&outcome.listener_name),
                    status,
                    Cell::new(format!("{}ms", outcome.duration.as_millis())),
                    Cell::new(error),
                ]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

fn enabled_cell(enabled: bool) -> Cell {
    if enabled {
        Cell::new("yes").fg(Color::Green)
    } else {
        Cell::new("no").fg(Color::Yellow)
    }
}
