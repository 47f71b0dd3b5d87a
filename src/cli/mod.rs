//! CLI parser and command dispatch.

mod commands;

pub use commands::{is_verbose, run};
