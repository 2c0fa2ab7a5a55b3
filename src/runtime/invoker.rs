//! Chunk invocation.
//!
//! This is the hot path for actually *running* submitted source: load it under
//! the session's chunk name, call it, and classify whatever fault comes back.
//! The caller must already own the execution lock.

use crate::runtime::loader::Interpreter;
use crate::runtime::result::{describe_fault, into_debugger_error};
use crate::Result;
use std::time::Instant;
use tracing::{info, warn};

/// Load and run `source` as a chunk named `chunk_name`.
#[tracing::instrument(skip_all, fields(chunk = chunk_name, bytes = source.len()))]
pub(crate) fn invoke_chunk(interpreter: &Interpreter, source: &str, chunk_name: &str) -> Result<()> {
    let started = Instant::now();

    // The leading '=' makes Lua use the name verbatim in messages.
    let outcome = interpreter
        .lua
        .load(source)
        .set_name(format!("={}", chunk_name))
        .exec();

    let elapsed_ms = started.elapsed().as_millis();
    match outcome {
        Ok(()) => {
            info!(elapsed_ms, "Chunk executed successfully");
            Ok(())
        }
        Err(err) => {
            warn!(elapsed_ms, fault = %describe_fault(&err), "Chunk raised a fault");
            Err(into_debugger_error(&err).into())
        }
    }
}
