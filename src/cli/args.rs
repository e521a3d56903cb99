//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this configuration file
//! - `--debug`: Enable debug logging

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::core::types::VersionId;

/// regstore - versioned access to registry artifacts kept in git
#[derive(Parser, Debug)]
#[command(name = "regstore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: $REGSTORE_CONFIG, then XDG, then ~/.regstore)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List files of a version with their status
    Ls {
        /// Version id: the trunk name or a change number
        version: VersionId,

        /// Directory to list (default: repository root)
        path: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print a file of a version
    Cat {
        version: VersionId,
        path: String,
    },

    /// Write stdin to a file of a candidate version and push it for review
    Write {
        version: VersionId,
        path: String,
    },

    /// Delete a file of a candidate version and push it for review
    Rm {
        version: VersionId,
        path: String,
    },

    /// Report whether a file exists in a version
    Exists {
        version: VersionId,
        path: String,
    },

    /// Reset the trunk clone to the remote and clear cached dates
    Refresh,

    /// Remove clones of merged and abandoned changes
    Sweep,
}
