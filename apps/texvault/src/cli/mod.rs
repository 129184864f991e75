//! # texvault CLI Module
//!
//! This module implements the CLI interface for texvault.
//!
//! ## Available Commands
//!
//! - `init` - Create the vault skeleton and default config
//! - `status` - Show index and asset summary
//! - `reindex` - Rebuild the link graph
//! - `backlinks` / `links` - Incoming / outgoing references of a note
//! - `graph` - Export the link graph (JSON or DOT)
//! - `broken` - List references to notes that do not exist
//! - `preprocess` - Stage one note without compiling it
//! - `build` - Compile one note or the whole vault
//! - `asset` - Add, list, verify or remove attachments
//! - `serve` - Start the HTTP server

mod commands;

use crate::config::VaultConfig;
use crate::vault::Vault;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use texvault_core::VaultError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// texvault - LaTeX note vault
///
/// Indexes cross-references between notes, rewrites them into hyperlinked
/// standalone documents and compiles them in parallel.
#[derive(Parser, Debug)]
#[command(name = "texvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress the startup banner
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Vault root directory
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub vault: PathBuf,

    /// Compiler backend, overrides config and TEXVAULT_COMPILER
    #[arg(long, global = true)]
    pub compiler: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Graph export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Json,
    Dot,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create notes/, assets/, pdf/ and a default texvault.toml
    Init {
        /// Overwrite an existing texvault.toml
        #[arg(short, long)]
        force: bool,
    },

    /// Show index and asset summary
    Status,

    /// Rebuild the link graph index
    Reindex,

    /// Notes that reference SLUG
    Backlinks {
        slug: String,
    },

    /// Notes SLUG references
    Links {
        slug: String,
    },

    /// Export the link graph
    Graph {
        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: GraphFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List references to notes that do not exist
    Broken,

    /// Stage one note for compilation without compiling it
    Preprocess {
        slug: String,
    },

    /// Compile one note, or every note when SLUG is omitted
    Build {
        slug: Option<String>,

        /// Number of parallel workers, overrides config and TEXVAULT_WORKERS
        #[arg(short, long)]
        workers: Option<usize>,

        /// Print one line per finished note
        #[arg(short, long)]
        progress: bool,
    },

    /// Manage attachments
    #[command(subcommand)]
    Asset(AssetCommands),

    /// Start HTTP server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
}

/// Attachment subcommands.
#[derive(Subcommand, Debug)]
pub enum AssetCommands {
    /// Store a file, deduplicated by content
    Add {
        /// File to ingest
        file: PathBuf,

        /// Display name (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,

        /// Free-form description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// List stored attachments
    List,

    /// Re-hash stored files against the manifest
    Verify,

    /// Delete an attachment and its manifest entry
    Remove {
        /// Stored file name
        filename: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), VaultError> {
    let json_mode = cli.json_mode;

    if let Some(Commands::Init { force }) = cli.command {
        return cmd_init(&cli.vault, force, json_mode);
    }

    let workers = match &cli.command {
        Some(Commands::Build { workers, .. }) => workers.map(|w| w.to_string()),
        _ => None,
    };
    let config = VaultConfig::load(&cli.vault)?
        .with_overrides(workers.as_deref(), cli.compiler.as_deref())?;
    let vault = Vault::open(&cli.vault, config)?;

    match cli.command {
        Some(Commands::Init { .. }) | Some(Commands::Status) | None => {
            cmd_status(&vault, json_mode)
        }
        Some(Commands::Reindex) => cmd_reindex(&vault, json_mode),
        Some(Commands::Backlinks { slug }) => cmd_backlinks(&vault, &slug, json_mode),
        Some(Commands::Links { slug }) => cmd_links(&vault, &slug, json_mode),
        Some(Commands::Graph { format, output }) => cmd_graph(&vault, format, output.as_deref()),
        Some(Commands::Broken) => cmd_broken(&vault, json_mode),
        Some(Commands::Preprocess { slug }) => cmd_preprocess(&vault, &slug, json_mode),
        Some(Commands::Build { slug, progress, .. }) => {
            cmd_build(&vault, slug.as_deref(), progress, json_mode).await
        }
        Some(Commands::Asset(command)) => cmd_asset(&vault, command, json_mode),
        Some(Commands::Serve { host, port }) => cmd_serve(vault, &host, port).await,
    }
}
