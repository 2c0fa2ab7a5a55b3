//! Debugger core.
//!
//! Sub-modules:
//! - [`controller`] owns the worker thread and the session lifecycle.
//! - [`policy`]     decides, per trace event, whether execution pauses.
//! - [`bridge`]     routes interpreter hook events to the right controller.
//! - [`breakpoint`] the line breakpoint set.
//! - [`state`]      debug states and the commands that move between them.

pub mod breakpoint;
pub mod bridge;
pub mod controller;
pub mod policy;
pub mod state;

pub use breakpoint::BreakpointSet;
pub use bridge::{TraceAction, TraceEvent, TraceKind, TraceSink};
pub use controller::{ControllerEvent, ExecutionController};
pub use policy::{StepPolicy, Verdict};
pub use state::{DebugCommand, DebugState};
