//! Cosigner Core - Foundational Types
//!
//! Error taxonomy and configuration shared by the signing runtime and CLI.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::SignerConfig;
pub use error::{Result, SignerError};

/// Cosigner version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
