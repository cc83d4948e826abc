//! CLI for the IFDL download harness.

mod commands;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{run_checksum, run_harness, run_interfaces};
use settings::{load_config, RunOverrides};

/// Top-level CLI for the IFDL download harness.
#[derive(Debug, Parser)]
#[command(name = "ifdl")]
#[command(about = "IFDL: multi-interface HTTP download robustness harness", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Bring up every configured interface and run the download workers.
    /// Prints the verdict line; exits 0 when passed, 1 when failed.
    Run {
        /// Config file to use instead of ~/.config/ifdl/config.toml.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// URL of the resource to download.
        #[arg(long)]
        url: Option<String>,
        /// Expected CRC-32 of the resource (8 hex digits).
        #[arg(long, value_name = "HEX")]
        crc32: Option<String>,
        /// Workers per interface.
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
        /// Downloads per worker.
        #[arg(long, value_name = "N")]
        iterations: Option<u32>,
        /// Pre-configured interfaces, comma-separated (e.g. "eth0,usb0").
        #[arg(long, value_name = "LIST")]
        interfaces: Option<String>,
    },

    /// List the host's network interfaces and the managers a run would load.
    Interfaces {
        /// Config file to use instead of ~/.config/ifdl/config.toml.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Print the CRC-32 of a local file, for `download.crc32`.
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

impl CliCommand {
    /// Parse arguments, run the command and return the process exit code.
    pub async fn run_from_args() -> Result<i32> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Run {
                config,
                url,
                crc32,
                workers,
                iterations,
                interfaces,
            } => {
                let overrides = RunOverrides {
                    url,
                    crc32,
                    workers,
                    iterations,
                    interfaces,
                };
                let cfg = load_config(config.as_deref(), &overrides)?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_harness(cfg).await
            }
            CliCommand::Interfaces { config } => {
                let cfg = load_config(config.as_deref(), &RunOverrides::default())?;
                run_interfaces(&cfg)?;
                Ok(0)
            }
            CliCommand::Checksum { path } => {
                run_checksum(&path)?;
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests;
