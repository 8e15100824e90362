//! Subcommand implementations

pub mod check;
pub mod explain;
pub mod matching;
