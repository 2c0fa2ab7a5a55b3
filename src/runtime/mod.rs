//! Embedded interpreter runtime.
//!
//! Sub-modules:
//! - [`executor`] public handle; owns the interpreter and its lock.
//! - [`loader`]   interpreter bootstrap, module search paths, host module.
//! - [`invoker`]  runs one chunk and classifies its fault.
//! - [`lock`]     the reentrant global execution lock.
//! - [`output`]   redirection of everything the script writes.
//! - [`result`]   fault formatting helpers.

pub mod executor;
pub mod invoker;
pub mod loader;
pub mod lock;
pub mod output;
pub mod result;

pub use executor::{Runtime, SessionGuard};
pub use loader::{RuntimeConfig, DEFAULT_CHUNK_NAME};
pub use lock::{ExecutionLock, LockGuard, SuspendGuard};
pub use output::OutputCallback;
