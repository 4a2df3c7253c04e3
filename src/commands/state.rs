use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;

use crate::Context;
use crate::cli::StateCommand;
use crate::state::{InstanceState, StateFile};
use crate::ui;

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    match cmd {
        StateCommand::Show { instance, json } => show(ctx, instance.as_deref(), json),
        StateCommand::Rm { instance } => rm(&instance),
    }
}

fn show(ctx: &Context, instance: Option<&str>, json: bool) -> Result<()> {
    let state = StateFile::load()?;

    match instance {
        Some(name) => {
            let Some(entry) = state.instances.get(name) else {
                bail!("No state recorded for instance '{name}'");
            };
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(entry).context("Failed to serialize state")?
                );
            } else {
                show_instance(ctx, name, entry);
            }
        }
        None if json => println!(
            "{}",
            serde_json::to_string_pretty(&state).context("Failed to serialize state")?
        ),
        None => {
            if state.instances.is_empty() {
                ui::info("No instances applied yet");
                return Ok(());
            }
            ui::header("Instances");
            for (name, entry) in &state.instances {
                println!(
                    "  {} {:<16} {:>9}  {}",
                    format!("{name:<24}").bold(),
                    entry.kind,
                    ui::count(entry.items.len(), "item"),
                    entry
                        .last_updated
                        .format("%Y-%m-%d %H:%M:%S UTC")
                        .to_string()
                        .dimmed()
                );
            }
        }
    }

    Ok(())
}

fn show_instance(ctx: &Context, name: &str, entry: &InstanceState) {
    ui::header(name);
    ui::kv("kind", &entry.kind);
    ui::kv(
        "last updated",
        &entry.last_updated.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    println!();

    for (item, remote) in &entry.items {
        println!(
            "  {} {:<30} {}",
            "•".cyan(),
            item,
            ui::truncate(&remote.remote_id, 40).dimmed()
        );
        if ctx.verbose > 0 && !remote.attributes.is_empty() {
            for (key, value) in &remote.attributes {
                ui::dim(&format!("    {key} = {value}"));
            }
        }
    }
}

fn rm(instance: &str) -> Result<()> {
    let mut state = StateFile::load()?;
    if !state.remove(instance) {
        ui::warn(&format!("No state recorded for instance '{instance}'"));
        return Ok(());
    }
    state.save()?;
    ui::success(&format!(
        "Forgot '{instance}'; its FMC objects were left untouched"
    ));
    Ok(())
}
