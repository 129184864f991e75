//! # texvault - LaTeX note vault
//!
//! The main binary: CLI commands and the HTTP server over one vault.
//!
//! ## Usage
//!
//! ```bash
//! # Create a vault and index it
//! texvault -C ~/notes init
//! texvault -C ~/notes reindex
//!
//! # Explore the link graph
//! texvault backlinks intro
//! texvault graph --format dot -o notes.dot
//!
//! # Compile everything with 8 workers
//! texvault build --workers 8 --progress
//!
//! # Start the HTTP server
//! texvault serve --host 127.0.0.1 --port 8080
//! ```

use clap::Parser;
use texvault::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize tracing. TEXVAULT_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("TEXVAULT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "texvault=debug,texvault_core=debug,tower_http=debug"
    } else {
        "texvault=info,texvault_core=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr so `--json-mode` output on stdout stays parseable.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        if let texvault_core::VaultError::CompileFailure { output, .. } = &e {
            eprintln!("{}", output.trim_end());
        }
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ╔╦╗╔═╗═╗ ╦╦  ╦╔═╗╦ ╦╦  ╔╦╗
   ║ ║╣ ╔╩╦╝╚╗╔╝╠═╣║ ║║   ║
   ╩ ╚═╝╩ ╚═ ╚╝ ╩ ╩╚═╝╩═╝ ╩   v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
