//! CLI for the DLM download manager.

mod commands;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dlm_core::config;
use std::path::PathBuf;

use commands::{run_get, run_shell};

/// Top-level CLI for the DLM download manager.
#[derive(Debug, Parser)]
#[command(name = "dlm")]
#[command(about = "DLM: resumable HTTP download manager", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more URLs in parallel and wait until all finish.
    Get {
        /// Direct HTTP/HTTPS URLs to download.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Directory to save into (default: config `download_dir`, else current directory).
        #[arg(long, value_name = "DIR")]
        download_dir: Option<PathBuf>,
    },

    /// Interactive shell: add, pause, resume, cancel and clear downloads.
    Shell {
        /// Directory to save into (default: config `download_dir`, else current directory).
        #[arg(long, value_name = "DIR")]
        download_dir: Option<PathBuf>,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get { urls, download_dir } => {
                let dir = cfg.resolve_download_dir(download_dir.as_deref())?;
                run_get(&cfg, &dir, &urls)?;
            }
            CliCommand::Shell { download_dir } => {
                let dir = cfg.resolve_download_dir(download_dir.as_deref())?;
                run_shell(&cfg, &dir)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
