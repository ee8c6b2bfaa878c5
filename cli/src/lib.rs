//! Cosigner CLI - multi-key image signing.

pub mod commands;
pub mod output;
