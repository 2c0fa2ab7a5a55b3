pub mod args;
pub mod commands;

pub use args::{Cli, Commands, CompletionsArgs, DebugArgs, OutputFormat, RunArgs, Verbosity};
