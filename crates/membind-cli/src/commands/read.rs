//! Read command implementation.

use anyhow::Result;
use membind::MemoryBinder;

use super::hex_utils::format_hex_address;
use super::open_binder;
use crate::TargetArgs;
use crate::config::CliConfig;

/// Run the read command
pub fn run(target: &TargetArgs, config: &CliConfig) -> Result<()> {
    let mut binder = open_binder(target, config)?;
    let report = binder.refresh()?;

    print!("{}", format_values(&binder));
    if report.skipped > 0 {
        eprintln!("{} field(s) could not be read", report.skipped);
    }
    Ok(())
}

pub fn format_values(binder: &MemoryBinder) -> String {
    let mut out = String::new();
    for (field, value) in binder.values() {
        let rendered = match value {
            Some(value) => value.display_with(&field.shape),
            None => "<unreadable>".to_string(),
        };
        out.push_str(&format!(
            "{:<24} {:>8}  {}\n",
            field.name,
            format_hex_address(field.offset),
            rendered
        ));
    }
    out
}
