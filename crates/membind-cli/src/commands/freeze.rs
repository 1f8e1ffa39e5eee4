//! Freeze command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use membind::{MemoryBinder, RefreshDriver, Value};
use tracing::warn;

use super::set::parse_field_value;
use super::{ctrlc_shutdown, open_binder};
use crate::TargetArgs;
use crate::config::CliConfig;

/// Split `FIELD=VALUE` into its parts; a bare `FIELD` has no value
pub fn parse_freeze_arg(arg: &str) -> (&str, Option<&str>) {
    match arg.split_once('=') {
        Some((field, value)) => (field.trim(), Some(value)),
        None => (arg.trim(), None),
    }
}

/// Freeze every argument on an attached binder. Returns the held values.
pub fn apply_freezes(binder: &mut MemoryBinder, args: &[String]) -> Result<Vec<(String, Value)>> {
    let layout = Arc::clone(binder.layout());
    let mut held = Vec::with_capacity(args.len());

    for arg in args {
        let (field, text) = parse_freeze_arg(arg);
        let value = text
            .map(|t| parse_field_value(&layout, field, t))
            .transpose()?;
        binder
            .freeze(field, value)
            .with_context(|| format!("Failed to freeze {}", field))?;

        if let Some(value) = binder.freezes().get(field) {
            held.push((field.to_string(), value.clone()));
        }
    }
    Ok(held)
}

/// Run the freeze command
pub fn run(target: &TargetArgs, config: &CliConfig, args: &[String]) -> Result<()> {
    let shutdown = ctrlc_shutdown()?;
    let mut binder = open_binder(target, config)?;
    binder.refresh()?;

    for (field, value) in apply_freezes(&mut binder, args)? {
        println!("Holding {} at {}", field, value);
    }
    println!("Press Ctrl-C to release");

    let shared = binder.into_shared();
    RefreshDriver::new(config.interval())
        .with_binder(Arc::clone(&shared))
        .stop_on_detach(true)
        .run(&shutdown);

    let mut binder = shared.lock();
    let fields: Vec<String> = binder.frozen_fields().map(str::to_string).collect();
    for field in &fields {
        if let Err(e) = binder.unfreeze(field) {
            warn!("Failed to release {}: {}", field, e);
        }
    }
    println!("Released {} field(s)", fields.len());
    Ok(())
}
