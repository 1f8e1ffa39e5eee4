//! CLI command implementations.

pub mod freeze;
pub mod hex_utils;
pub mod layout;
pub mod read;
pub mod set;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use membind::layout::{builtin, file};
use membind::{Layout, MemoryBinder, ProcessMemory, ShutdownSignal};
use tracing::info;

use crate::TargetArgs;
use crate::config::CliConfig;
use hex_utils::parse_hex_address;

/// Resolve a built-in layout name or a JSON layout path
pub fn resolve_layout(name: &str) -> Result<Layout> {
    if let Some(layout) = builtin::lookup(name) {
        return Ok(layout?);
    }

    let path = Path::new(name);
    if !path.exists() {
        bail!(
            "Unknown layout {:?}: not a built-in ({}) and no such file",
            name,
            builtin::NAMES.join(", ")
        );
    }
    file::load_layout(path).with_context(|| format!("Failed to load layout {}", path.display()))
}

/// Open the target process and attach a binder to the object
pub fn open_binder(target: &TargetArgs, config: &CliConfig) -> Result<MemoryBinder> {
    let layout = resolve_layout(&target.layout)?;
    let address = parse_hex_address(&target.address)?;
    let memory = ProcessMemory::open(target.pid)
        .with_context(|| format!("Failed to open process {}", target.pid))?;

    let mut binder = MemoryBinder::with_config(
        Arc::new(layout),
        Arc::new(memory),
        config.binder_config(target.no_block_reads),
    );
    binder.attach(address)?;
    Ok(binder)
}

/// Shutdown signal triggered by Ctrl-C
pub fn ctrlc_shutdown() -> Result<Arc<ShutdownSignal>> {
    let shutdown = Arc::new(ShutdownSignal::new());
    let shutdown_ctrlc = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, stopping...");
        shutdown_ctrlc.trigger();
    })?;
    Ok(shutdown)
}
