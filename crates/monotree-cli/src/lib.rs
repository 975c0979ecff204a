//! Library side of the `monotree` binary: command implementations and
//! terminal output.

pub mod commands;
pub mod output;

pub use commands::Session;
pub use output::OutputFormat;
