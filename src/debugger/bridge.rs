//! Trace bridge between the interpreter's hook and the controllers.
//!
//! Lua accepts exactly one hook per state and calls it as a plain function,
//! so the hook cannot carry a controller with it. Instead each worker thread
//! registers its [`TraceSink`] here before executing, and [`dispatch`] looks up
//! the sink for the thread the interpreter is running on. Keying by thread
//! lets several controllers (each on its own runtime) coexist; the
//! one-hook-per-state limit belongs to the interpreter, not to the controller.
//!
//! Nothing may unwind out of the hook. A panicking sink is caught here, logged
//! and counted, and execution continues as if the event had not happened.

use crate::DebuggerError;
use mlua::{Debug, DebugEvent, Lua, VmState};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::thread::{self, ThreadId};
use tracing::{error, warn};

/// Kind of interpreter event the hook reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Call,
    /// A call that replaces the current frame; no matching return follows.
    TailCall,
    Return,
    Line,
}

/// One trace event, detached from the interpreter's activation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub kind: TraceKind,
    /// 1-based line, or `None` when the frame has no resolvable line.
    pub line: Option<u32>,
    /// Short source name of the executing chunk, when known.
    pub source: Option<String>,
    /// Active frames on the interpreter stack; only line events carry one.
    pub depth: Option<usize>,
}

impl TraceEvent {
    pub fn new(kind: TraceKind) -> Self {
        Self {
            kind,
            line: None,
            source: None,
            depth: None,
        }
    }

    /// A line event in the chunk named `source`.
    pub fn line(line: u32, source: impl Into<String>) -> Self {
        Self {
            kind: TraceKind::Line,
            line: Some(line),
            source: Some(source.into()),
            depth: None,
        }
    }

    fn from_debug(lua: &Lua, debug: &Debug<'_>) -> Option<Self> {
        let kind = match debug.event() {
            DebugEvent::Call => TraceKind::Call,
            DebugEvent::TailCall => TraceKind::TailCall,
            DebugEvent::Ret => TraceKind::Return,
            DebugEvent::Line => TraceKind::Line,
            _ => return None,
        };
        if kind != TraceKind::Line {
            return Some(Self::new(kind));
        }
        Some(Self {
            kind,
            line: u32::try_from(debug.curr_line()).ok().filter(|&l| l > 0),
            source: debug.source().short_src.map(|s| s.into_owned()),
            depth: Some(stack_depth(lua)),
        })
    }
}

/// Frames unwound by an error raise no return event, so depth is measured
/// from the live stack rather than counted.
fn stack_depth(lua: &Lua) -> usize {
    let mut depth = 0;
    while lua.inspect_stack(depth).is_some() {
        depth += 1;
    }
    depth
}

/// What the interpreter should do after a trace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceAction {
    Continue,
    /// Raise the abort interrupt inside the running script.
    Interrupt,
}

/// Receives the trace events of the thread it is registered on.
pub trait TraceSink: Send + Sync {
    fn on_trace(&self, event: &TraceEvent) -> TraceAction;
}

type Registry = RwLock<HashMap<ThreadId, Arc<dyn TraceSink>>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static FAULTS: AtomicU64 = AtomicU64::new(0);

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Removes its thread's sink from the table when dropped.
#[must_use = "the sink is unregistered as soon as the registration is dropped"]
#[derive(Debug)]
pub struct Registration {
    thread: ThreadId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        registry()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.thread);
    }
}

/// Route trace events raised on the calling thread to `sink`.
pub fn register(sink: Arc<dyn TraceSink>) -> Registration {
    let thread = thread::current().id();
    let previous = registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(thread, sink);
    if previous.is_some() {
        warn!(?thread, "Replacing an existing trace sink for this thread");
    }
    Registration { thread }
}

/// Whether the calling thread has a sink registered.
pub fn is_registered() -> bool {
    registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(&thread::current().id())
}

/// Number of sink panics swallowed since process start.
pub fn fault_count() -> u64 {
    FAULTS.load(Ordering::Relaxed)
}

/// Deliver `event` to the calling thread's sink.
///
/// Unregistered threads get [`TraceAction::Continue`]; that only happens in
/// teardown races and is not an error.
pub fn forward(event: &TraceEvent) -> TraceAction {
    // Clone the sink out so the table is not locked while the sink blocks.
    let sink = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&thread::current().id())
        .cloned();
    let Some(sink) = sink else {
        return TraceAction::Continue;
    };

    match panic::catch_unwind(AssertUnwindSafe(|| sink.on_trace(event))) {
        Ok(action) => action,
        Err(payload) => {
            FAULTS.fetch_add(1, Ordering::Relaxed);
            let fault = DebuggerError::TraceFault(panic_message(payload.as_ref()));
            error!(?event, "{}", fault);
            TraceAction::Continue
        }
    }
}

/// The hook installed into the interpreter.
pub(crate) fn dispatch(lua: &Lua, debug: Debug<'_>) -> mlua::Result<VmState> {
    let Some(event) = TraceEvent::from_debug(lua, &debug) else {
        return Ok(VmState::Continue);
    };
    match forward(&event) {
        TraceAction::Continue => Ok(VmState::Continue),
        TraceAction::Interrupt => Err(mlua::Error::external(DebuggerError::Interrupted)),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
