//! Files - browse and edit folders and archives from the command line
//!
//! Every path may point inside ZIP, TAR and 7z archives, nested to any depth:
//! `files ls ~/backup.7z/photos.tar/2021`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "files")]
#[command(version)]
#[command(about = "File manager core with transparent archive support")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "FILES_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging on stderr (use RUST_LOG for finer control)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortKey {
    Name,
    Size,
    Modified,
    Type,
}

#[derive(Subcommand)]
enum Commands {
    /// List a folder, drive, archive or the root folder
    Ls {
        #[arg(default_value = ".")]
        path: String,

        /// Include hidden files
        #[arg(short, long)]
        all: bool,

        /// Sort key (defaults to the configured one)
        #[arg(short, long, value_enum)]
        sort: Option<SortKey>,

        /// Reverse the sort order
        #[arg(short, long)]
        reverse: bool,
    },

    /// Print the folder tree below a path
    Tree {
        #[arg(default_value = ".")]
        path: String,
    },

    /// Show what a path is: kind, sizes, modification time and owning archive
    Info { path: String },

    /// Write a file's bytes to stdout
    Cat { path: String },

    /// Extract a file to a disk path
    Extract { path: String, output: PathBuf },

    /// Copy files or folders into a folder
    Cp {
        #[arg(required = true, num_args = 1..)]
        sources: Vec<String>,
        destination: String,
    },

    /// Move files or folders into a folder
    Mv {
        #[arg(required = true, num_args = 1..)]
        sources: Vec<String>,
        destination: String,
    },

    /// Delete files or folders (folders recursively)
    Rm {
        #[arg(required = true, num_args = 1..)]
        paths: Vec<String>,
    },

    /// Rename a file or folder in place
    Rename { path: String, new_name: String },

    /// Create an empty folder
    Mkdir { parent: String, name: String },

    /// Create an empty file
    Touch { parent: String, name: String },

    /// Pin a folder
    Pin { path: String },

    /// Remove a pin
    Unpin { path: String },

    /// List pinned folders that still exist
    Pins,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_options = app_log::LogOptions {
        default_filter: if cli.verbose { "debug".into() } else { "info".into() },
        console: cli.verbose,
        ..Default::default()
    };
    let _guard = app_log::init(&log_options)?;

    if let Err(e) = app_log::cleanup_old_logs(&log_options.directory, 7) {
        tracing::warn!("Failed to cleanup old logs: {}", e);
    }

    let config_path = cli.config.unwrap_or_else(app_core::AppConfig::config_path);
    let config = app_core::AppConfig::load_from(&config_path).unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable configuration {:?}: {}", config_path, e);
        app_core::AppConfig::default()
    });

    let state = app_core::AppState::new(config)?;
    let runner = commands::Runner::new(&state, config_path);
    runner.run(cli.command)
}
