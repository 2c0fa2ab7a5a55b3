use crate::debugger::bridge;
use crate::runtime::invoker::invoke_chunk;
use crate::runtime::loader::{bootstrap, Interpreter, RuntimeConfig};
use crate::runtime::lock::ExecutionLock;
use crate::runtime::output;
use crate::{DebuggerError, Result};

use mlua::HookTriggers;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};
use tracing::{debug, info, warn};

static GLOBAL_RUNTIME: OnceLock<Arc<Runtime>> = OnceLock::new();

#[derive(Default)]
struct RuntimeState {
    interpreter: Option<Arc<Interpreter>>,
    finalized: bool,
    config: RuntimeConfig,
    executing_on: Option<ThreadId>,
}

/// Owns the embedded interpreter and its global execution lock.
///
/// Everything that touches the Lua state goes through this handle while the
/// calling thread owns [`Runtime::lock`]. The caller-side queries
/// ([`Runtime::version`], [`Runtime::search_paths`]) only read handle
/// metadata, so they complete even while a worker sits paused inside the
/// trace hook.
#[derive(Default)]
pub struct Runtime {
    lock: ExecutionLock,
    state: Mutex<RuntimeState>,
}

impl Runtime {
    /// Create an uninitialized handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide handle shared by every controller that asks for it.
    pub fn global() -> Arc<Runtime> {
        Arc::clone(GLOBAL_RUNTIME.get_or_init(|| Arc::new(Runtime::new())))
    }

    /// The global execution lock.
    pub fn lock(&self) -> &ExecutionLock {
        &self.lock
    }

    /// Create the interpreter. Happens once over the handle's life.
    pub fn initialize(&self, config: &RuntimeConfig) -> Result<()> {
        let _gil = self.lock.acquire();
        let mut state = self.state();

        if state.finalized {
            return Err(DebuggerError::RuntimeFinalized.into());
        }
        if state.interpreter.is_some() {
            warn!("Lua interpreter is already initialized");
            return Ok(());
        }

        let mut merged = config.clone();
        for path in &state.config.search_paths {
            if !merged.search_paths.contains(path) {
                merged.search_paths.push(path.clone());
            }
        }

        let interpreter = bootstrap(&merged)?;
        info!(version = %interpreter.version, "Lua interpreter initialized successfully");
        state.config = merged;
        state.interpreter = Some(Arc::new(interpreter));
        Ok(())
    }

    /// Tear the interpreter down. Later calls are no-ops.
    pub fn finalize(&self) {
        let _gil = self.lock.acquire();
        let mut state = self.state();
        if state.interpreter.take().is_some() {
            info!("Lua interpreter finalized");
        }
        state.finalized = true;
    }

    pub fn is_initialized(&self) -> bool {
        let _gil = self.lock.acquire();
        self.state().interpreter.is_some()
    }

    /// The interpreter's version string, or `"Not initialized"`.
    pub fn version(&self) -> String {
        let _gil = self.lock.acquire();
        match &self.state().interpreter {
            Some(interpreter) => interpreter.version.clone(),
            None => "Not initialized".to_string(),
        }
    }

    /// Directories searched by `require`, in priority order.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let _gil = self.lock.acquire();
        self.state().config.search_paths.clone()
    }

    /// Add a module search directory; takes effect on the next execution.
    pub fn add_search_path(&self, path: impl AsRef<Path>) {
        let _gil = self.lock.acquire();
        let path = path.as_ref().to_path_buf();
        let mut state = self.state();
        if !state.config.search_paths.contains(&path) {
            debug!(path = %path.display(), "Added module search path");
            state.config.search_paths.push(path);
        }
    }

    /// Chunk name configured for submitted source.
    pub fn chunk_name(&self) -> String {
        let _gil = self.lock.acquire();
        self.state().config.chunk_name.clone()
    }

    /// Claim the interpreter for a session on the calling thread.
    ///
    /// Fails with [`DebuggerError::RuntimeBusy`] while another thread's session
    /// holds it, without touching the interpreter. A thread that already holds
    /// the claim gets a nested guard that releases nothing.
    pub fn begin_session(&self) -> Result<SessionGuard<'_>> {
        let me = thread::current().id();
        let mut state = self.state();
        match state.executing_on {
            Some(owner) if owner != me => {
                warn!(?owner, "Interpreter is claimed by another session");
                Err(DebuggerError::RuntimeBusy.into())
            }
            Some(_) => Ok(SessionGuard {
                runtime: self,
                outermost: false,
            }),
            None => {
                state.executing_on = Some(me);
                Ok(SessionGuard {
                    runtime: self,
                    outermost: true,
                })
            }
        }
    }

    /// Route every write the script makes to `callback`, in emission order.
    pub fn redirect_output<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let _gil = self.lock.acquire();
        self.ensure_not_claimed_elsewhere()?;
        let interpreter = self.interpreter()?;
        interpreter.output.set(Arc::new(callback));
        output::install(&interpreter.lua, &interpreter.output).map_err(|e| {
            DebuggerError::ExecutionFault(format!("Failed to redirect Lua output: {}", e))
        })?;
        debug!("Lua output redirection configured");
        Ok(())
    }

    /// Stop forwarding output to the last redirect callback.
    pub fn clear_output_redirect(&self) {
        let _gil = self.lock.acquire();
        if self.ensure_not_claimed_elsewhere().is_err() {
            return;
        }
        if let Some(interpreter) = self.state().interpreter.clone() {
            interpreter.output.clear();
        }
    }

    /// Install the trace bridge as the interpreter's line/call/return hook.
    pub fn install_trace_hook(&self) -> Result<()> {
        let _gil = self.lock.acquire();
        self.ensure_not_claimed_elsewhere()?;
        let interpreter = self.interpreter()?;
        let triggers = HookTriggers::new().on_calls().on_returns().every_line();
        interpreter.lua.set_hook(triggers, bridge::dispatch);
        Ok(())
    }

    pub fn remove_trace_hook(&self) {
        let _gil = self.lock.acquire();
        if self.ensure_not_claimed_elsewhere().is_err() {
            return;
        }
        if let Some(interpreter) = self.state().interpreter.clone() {
            interpreter.lua.remove_hook();
        }
    }

    /// Run `source` to completion on the calling thread.
    ///
    /// Fails with [`DebuggerError::ExecutionFault`] on an uncaught script
    /// error, [`DebuggerError::Interrupted`] when the trace hook raised the
    /// abort interrupt, and [`DebuggerError::RuntimeBusy`] while another
    /// thread is mid-execution on this handle.
    pub fn execute_source(&self, source: &str, chunk_name: &str) -> Result<()> {
        let _gil = self.lock.acquire();
        let (interpreter, search_paths) = {
            let state = self.state();
            let interpreter = state
                .interpreter
                .clone()
                .ok_or(DebuggerError::Uninitialized)?;
            (interpreter, state.config.search_paths.clone())
        };

        let _session = self.begin_session()?;
        interpreter.apply_search_paths(&search_paths)?;
        invoke_chunk(&interpreter, source, chunk_name)
    }

    /// Fails while another thread's session holds the interpreter.
    fn ensure_not_claimed_elsewhere(&self) -> Result<()> {
        match self.state().executing_on {
            Some(owner) if owner != thread::current().id() => {
                Err(DebuggerError::RuntimeBusy.into())
            }
            _ => Ok(()),
        }
    }

    fn interpreter(&self) -> Result<Arc<Interpreter>> {
        self.state()
            .interpreter
            .clone()
            .ok_or_else(|| DebuggerError::Uninitialized.into())
    }

    fn state(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A session's claim on the interpreter; released on drop.
#[must_use = "the interpreter is released as soon as the guard is dropped"]
pub struct SessionGuard<'a> {
    runtime: &'a Runtime,
    outermost: bool,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.outermost {
            self.runtime.state().executing_on = None;
        }
    }
}
