//! Watch command implementation.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local};
use membind::{FieldChange, Layout, RefreshDriver, Value};
use owo_colors::OwoColorize;

use super::hex_utils::format_hex_address;
use super::{ctrlc_shutdown, open_binder};
use crate::TargetArgs;
use crate::config::CliConfig;

/// Run the watch command
pub fn run(target: &TargetArgs, config: &CliConfig) -> Result<()> {
    let shutdown = ctrlc_shutdown()?;
    let mut binder = open_binder(target, config)?;

    let layout = Arc::clone(binder.layout());
    binder.subscribe_all(move |change| println!("{}", format_change(&layout, change, Local::now())));

    println!(
        "Watching {} at {} in process {} (Ctrl-C to stop)",
        binder.layout().name(),
        format_hex_address(binder.base_address().unwrap_or_default()),
        target.pid
    );

    RefreshDriver::new(config.interval())
        .with_binder(binder.into_shared())
        .stop_on_detach(true)
        .run(&shutdown);
    Ok(())
}

pub fn format_change(layout: &Layout, change: &FieldChange, at: DateTime<Local>) -> String {
    let render = |value: &Value| match layout.field(&change.field) {
        Some(field) => value.display_with(&field.shape),
        None => value.to_string(),
    };

    let time = at.format("%H:%M:%S%.3f");
    match &change.old {
        Some(old) => format!(
            "[{}] {} {} -> {}",
            time,
            change.field.cyan(),
            render(old).dimmed(),
            render(&change.new).green()
        ),
        None => format!(
            "[{}] {} = {}",
            time,
            change.field.cyan(),
            render(&change.new).green()
        ),
    }
}
