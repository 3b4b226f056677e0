//! Subcommand implementations for the `bot` binary.

pub mod start;
pub mod status;
