//! Interactive step debugger for Lua scripts embedded in a host application.
//!
//! The host submits source text to an [`ExecutionController`], which runs it
//! on a dedicated worker thread against a shared [`Runtime`]. A per-statement
//! trace hook drives the debug state machine: breakpoints, stepping into, over
//! and out of calls, execution pacing and cooperative abort. Everything the
//! script prints and every fault it raises flows back to the host as
//! [`ControllerEvent`]s.

pub mod cli;
pub mod config;
pub mod debugger;
pub mod protocol;
pub mod runtime;

pub use debugger::{
    BreakpointSet, ControllerEvent, DebugCommand, DebugState, ExecutionController,
};
pub use runtime::{ExecutionLock, Runtime, RuntimeConfig};

use thiserror::Error;

/// Errors surfaced by the debugger core and its host binary.
#[derive(Debug, Error)]
pub enum DebuggerError {
    #[error("Code execution already in progress")]
    SessionActive,

    #[error("Interpreter runtime not initialized")]
    Uninitialized,

    #[error("Interpreter runtime was finalized and cannot be initialized again")]
    RuntimeFinalized,

    #[error("Interpreter runtime is busy executing on another thread")]
    RuntimeBusy,

    #[error("{0}")]
    ExecutionFault(String),

    #[error("execution aborted by user")]
    Interrupted,

    #[error("Trace hook fault: {0}")]
    TraceFault(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = anyhow::Result<T>;
