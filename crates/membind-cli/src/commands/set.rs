//! Set command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use membind::{Layout, Value};
use tracing::warn;

use super::open_binder;
use crate::TargetArgs;
use crate::config::CliConfig;

/// Parse `text` according to the shape of `field`
pub fn parse_field_value(layout: &Layout, field: &str, text: &str) -> Result<Value> {
    let descriptor = layout
        .field(field)
        .with_context(|| format!("Layout {} has no field {:?}", layout.name(), field))?;
    Value::parse(&descriptor.shape, text)
        .with_context(|| format!("Invalid value for {} ({})", field, descriptor.shape))
}

/// Run the set command
pub fn run(target: &TargetArgs, config: &CliConfig, field: &str, text: &str) -> Result<()> {
    let mut binder = open_binder(target, config)?;
    let layout = Arc::clone(binder.layout());
    let value = parse_field_value(&layout, field, text)?;

    if let Err(e) = binder.refresh() {
        warn!("Could not read current values: {}", e);
    }
    let old = binder.get(field)?.cloned();
    binder.set(field, value.clone())?;

    let shape = &layout.field(field).context("Field disappeared from layout")?.shape;
    match old {
        Some(old) => println!(
            "{}: {} -> {}",
            field,
            old.display_with(shape),
            value.display_with(shape)
        ),
        None => println!("{}: {}", field, value.display_with(shape)),
    }
    Ok(())
}
