//! CLI for FANUC CNCs over FOCAS2.
//!
//! ```text
//! focas status                     Run, mode and alarm state
//! focas --simulate upload 100      Upload O100 from the built-in simulator
//! focas gen-config --write FILE    Write the default config
//! ```

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod cmd;
mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use focas::SimTransport;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "focas",
    version,
    about = "Query FANUC CNCs and upload their programs over FOCAS2"
)]
struct Cli {
    /// Config file [default: <config dir>/focas/config.toml].
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Controller host, overriding the config file.
    #[arg(long, global = true)]
    host: Option<String>,

    /// Controller port, overriding the config file.
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Call timeout in milliseconds, overriding the config file.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Talk to the built-in simulated controller.
    #[arg(long, global = true)]
    simulate: bool,

    /// Output format.
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Show run, mode, motion, emergency and alarm state.
    Status,

    /// Show controller identification.
    Info,

    /// List controlled axes.
    Axes,

    /// Show axis positions.
    Position(cmd::PositionArgs),

    /// Show the executing program and block.
    Program,

    /// Upload a program (the executing one by default).
    Upload(cmd::UploadArgs),

    /// List active alarms.
    Alarms {
        /// Maximum number of alarms to read.
        #[arg(long, default_value_t = 10)]
        max: usize,
    },

    /// Show actual feed rate with feed and jog overrides.
    Feed,

    /// Show spindle load, speed and override.
    Spindles,

    /// Show the parts counter and machine timers.
    Counters,

    /// Poll machine status until interrupted.
    Watch(cmd::WatchArgs),

    /// Print the default configuration.
    GenConfig {
        /// Write to this file instead of stdout.
        #[arg(long)]
        write: Option<PathBuf>,
    },

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

/// Output format for every command.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable table.
    #[default]
    Table,
    /// Machine-readable JSON.
    Json,
}

fn main() {
    if let Err(e) = Cli::parse().dispatch() {
        eprintln!("focas: {e:#}");
        std::process::exit(1);
    }
}

impl Cli {
    fn dispatch(self) -> Result<()> {
        let (config, load_error) = self.resolve_config();
        init_logging(&config.logging.level);
        if let Some(e) = load_error {
            tracing::warn!("{e:#}; using defaults");
        }

        match self.command {
            Command::GenConfig { write } => gen_config(write.as_deref()),
            Command::Completion { shell } => {
                clap_complete::generate(shell, &mut Self::command(), "focas", &mut std::io::stdout());
                Ok(())
            }
            command if config.machine.simulate => {
                cmd::run(SimTransport::default(), &config, command, self.format)
            }
            command => run_live(&config, command, self.format),
        }
    }

    /// Config file values with command-line overrides applied, plus the
    /// load error when the file was unusable.
    fn resolve_config(&self) -> (Config, Option<anyhow::Error>) {
        let (mut config, load_error) = match self.config.clone().or_else(Config::default_path) {
            Some(path) => match Config::load(&path) {
                Ok(config) => (config, None),
                Err(e) => (Config::default(), Some(e)),
            },
            None => (Config::default(), None),
        };
        if let Some(host) = &self.host {
            config.machine.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.machine.port = port;
        }
        if let Some(ms) = self.timeout_ms {
            config.machine.timeout_ms = ms;
        }
        config.machine.simulate |= self.simulate;
        (config, load_error)
    }
}

/// Level from the config, overridable with `RUST_LOG`.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn gen_config(write: Option<&Path>) -> Result<()> {
    match write {
        Some(path) => {
            Config::write_default(path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("{}", path.display());
        }
        None => print!("{}", Config::default_toml()?),
    }
    Ok(())
}

#[cfg(feature = "fwlib")]
fn run_live(config: &Config, command: Command, format: OutputFormat) -> Result<()> {
    let transport = focas::Fwlib::startup(config.machine.library_log_level, &config.library_log())
        .context("initializing fwlib32")?;
    cmd::run(transport, config, command, format)
}

#[cfg(not(feature = "fwlib"))]
fn run_live(_config: &Config, _command: Command, _format: OutputFormat) -> Result<()> {
    anyhow::bail!("built without the `fwlib` feature; pass --simulate or rebuild with --features fwlib")
}
