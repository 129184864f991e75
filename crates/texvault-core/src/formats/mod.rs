//! # Formats
//!
//! On-disk snapshot encoding shared by the index and the asset manifest.

pub mod persistence;

pub use persistence::{load_snapshot, save_snapshot, write_atomic};
