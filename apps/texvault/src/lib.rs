//! # texvault
//!
//! Application layer of the texvault LaTeX note vault.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    apps/texvault (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐    │
//! │  │    CLI      │    │  HTTP API   │    │ Build Orchestr.  │    │
//! │  │  (clap)     │    │  (axum)     │    │ (tokio workers)  │    │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘    │
//! │         └──────────────────┼────────────────────┘              │
//! │                            ▼                                   │
//! │    ┌────────────────┐  ┌──────────────────┐                    │
//! │    │ texvault-core  │  │ Compiler (spawn) │                    │
//! │    │  (THE LOGIC)   │  │ latexmk/tectonic │                    │
//! │    └────────────────┘  └──────────────────┘                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod build;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod vault;

pub use build::{BatchReport, BuildCancel, BuildOrchestrator, BuildProgress, BuildResult, JobState};
pub use compiler::Compiler;
pub use config::{CompilerKind, VaultConfig};
pub use vault::Vault;
