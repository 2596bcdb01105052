//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `pipeline` - Config loading and the pipeline commands (run, init, merge)
//! - `status` - Destination status and config display

pub mod pipeline;
pub mod status;

// Re-export command functions for main.rs
pub use pipeline::*;
pub use status::*;

/// Shorten a hex digest for display
pub fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
