mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "membind")]
#[command(version, about = "Read, write and freeze fields of a live process's memory")]
struct Cli {
    /// Config file (defaults to ./membind.toml, then the user config directory)
    #[arg(short, long, global = true, env = "MEMBIND_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Which object to bind
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Target process id
    #[arg(long, env = "MEMBIND_PID")]
    pub pid: u32,

    /// Base address of the object (hex, 0x optional)
    #[arg(short, long)]
    pub address: String,

    /// Built-in layout name or path to a JSON layout file
    #[arg(short, long, default_value = "camera")]
    pub layout: String,

    /// Read fields one by one instead of one read spanning the layout
    #[arg(long)]
    pub no_block_reads: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect layouts
    Layout {
        #[command(subcommand)]
        action: LayoutAction,
    },

    /// Read every field once and print it
    Read {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Print field changes until Ctrl-C
    Watch {
        #[command(flatten)]
        target: TargetArgs,

        /// Refresh interval in milliseconds
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },

    /// Write one field
    Set {
        #[command(flatten)]
        target: TargetArgs,

        field: String,

        value: String,
    },

    /// Hold fields at fixed values until Ctrl-C
    Freeze {
        #[command(flatten)]
        target: TargetArgs,

        /// FIELD or FIELD=VALUE; without a value the current one is held
        #[arg(required = true)]
        fields: Vec<String>,

        /// Refresh interval in milliseconds
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },
}

#[derive(Subcommand)]
enum LayoutAction {
    /// Print the field table of a layout
    Show {
        /// Built-in layout name or path to a JSON layout file
        layout: String,
    },

    /// Validate a JSON layout file
    Check { path: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("membind=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;
    debug!("Using {:?}", config);

    match cli.command {
        Command::Layout { action } => match action {
            LayoutAction::Show { layout } => commands::layout::show(&layout),
            LayoutAction::Check { path } => commands::layout::check(&path),
        },
        Command::Read { target } => commands::read::run(&target, &config),
        Command::Watch {
            target,
            interval_ms,
        } => commands::watch::run(&target, &config.with_interval(interval_ms)),
        Command::Set {
            target,
            field,
            value,
        } => commands::set::run(&target, &config, &field, &value),
        Command::Freeze {
            target,
            fields,
            interval_ms,
        } => commands::freeze::run(&target, &config.with_interval(interval_ms), &fields),
    }
}
