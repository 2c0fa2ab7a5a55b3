//! The execution/debug controller.
//!
//! One controller owns one worker thread. [`ExecutionController::submit`]
//! hands source text to that worker and returns immediately; the worker runs
//! it against the shared [`Runtime`] with the trace bridge installed, and
//! reports back through a channel of [`ControllerEvent`]s.
//!
//! Lock discipline: the worker owns the runtime's execution lock for the
//! whole run and takes the debug mutex inside the trace hook. Host commands
//! only take the debug mutex. Before the worker blocks (paused, or sleeping
//! out the execution delay) it suspends the execution lock, and it always
//! lets go of the debug mutex before reacquiring the execution lock.

use crate::debugger::breakpoint::BreakpointSet;
use crate::debugger::bridge::{self, panic_message, TraceAction, TraceEvent, TraceKind, TraceSink};
use crate::debugger::policy::{StepPolicy, Verdict};
use crate::debugger::state::{DebugCommand, DebugState};
use crate::runtime::Runtime;
use crate::{DebuggerError, Result};

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

static NEXT_WORKER_ID: AtomicUsize = AtomicUsize::new(1);

/// Notification delivered to the host, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    ExecutionStarted,
    ExecutionFinished,
    LineExecuted(u32),
    OutputReceived(String),
    ErrorOccurred(String),
    DebugStateChanged(DebugState),
    ProgressUpdated { current: u32, total: u32 },
}

struct Job {
    source: String,
    total_lines: u32,
}

#[derive(Default)]
struct DebugContext {
    policy: StepPolicy,
    breakpoints: BreakpointSet,
    latched: Option<DebugCommand>,
    chunk_name: String,
    total_lines: u32,
}

impl DebugContext {
    /// Breakpoints belong to the submitted chunk; lines of required modules
    /// and frames with no source never match.
    fn at_breakpoint(&self, line: u32, source: Option<&str>) -> bool {
        self.breakpoints.contains(line) && source == Some(self.chunk_name.as_str())
    }
}

struct Shared {
    runtime: Arc<Runtime>,
    events: Sender<ControllerEvent>,
    executing: AtomicBool,
    abort: AtomicBool,
    delay_ms: AtomicU64,
    current_line: AtomicI64,
    debug: Mutex<DebugContext>,
    resumed: Condvar,
}

/// Runs submitted source on a dedicated worker thread under debugger control.
pub struct ExecutionController {
    shared: Arc<Shared>,
    jobs: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl ExecutionController {
    /// Spawn the worker and return the controller with its event stream.
    pub fn new(runtime: Arc<Runtime>) -> Result<(Self, Receiver<ControllerEvent>)> {
        let (event_tx, event_rx) = mpsc::channel();
        let (job_tx, job_rx) = mpsc::channel::<Job>();

        let shared = Arc::new(Shared {
            runtime,
            events: event_tx,
            executing: AtomicBool::new(false),
            abort: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            current_line: AtomicI64::new(-1),
            debug: Mutex::new(DebugContext::default()),
            resumed: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let name = format!("exec-worker-{}", NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed));
        let worker = thread::Builder::new().name(name).spawn(move || {
            for job in job_rx {
                worker_shared.run_session(job);
            }
            debug!("Execution worker exiting");
        })?;

        let controller = Self {
            shared,
            jobs: Some(job_tx),
            worker: Some(worker),
        };
        Ok((controller, event_rx))
    }

    /// Start a session. Rejected while another session is active.
    pub fn submit(
        &self,
        source: impl Into<String>,
        breakpoints: BreakpointSet,
        delay_ms: u64,
    ) -> Result<()> {
        let shared = &self.shared;
        if shared
            .executing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Code execution already in progress");
            return Err(DebuggerError::SessionActive.into());
        }

        let source = source.into();
        let total_lines = u32::try_from(source.lines().count()).unwrap_or(u32::MAX);
        shared.abort.store(false, Ordering::Release);
        shared.delay_ms.store(delay_ms, Ordering::Relaxed);
        {
            let mut ctx = shared.debug();
            ctx.policy.reset();
            ctx.breakpoints = breakpoints;
            ctx.latched = None;
        }

        let sent = match &self.jobs {
            Some(jobs) => jobs.send(Job { source, total_lines }).is_ok(),
            None => false,
        };
        if !sent {
            shared.executing.store(false, Ordering::Release);
            return Err(DebuggerError::ExecutionFault(
                "Execution worker is not running".to_string(),
            )
            .into());
        }
        info!(total_lines, delay_ms, "Submitted source for execution");
        Ok(())
    }

    /// Start a session with the current breakpoints and delay.
    pub fn run(&self, source: impl Into<String>) -> Result<()> {
        let breakpoints = self.breakpoints();
        self.submit(source, breakpoints, self.execution_delay())
    }

    /// Ask the running session to stop at its next trace event.
    pub fn abort(&self) {
        self.shared.abort.store(true, Ordering::Release);
        // Taken so a worker between its abort check and its wait cannot miss this.
        let _ctx = self.shared.debug();
        self.shared.resumed.notify_all();
    }

    /// Replace the breakpoint set; seen by the next trace event.
    pub fn set_breakpoints(&self, breakpoints: BreakpointSet) {
        self.shared.debug().breakpoints = breakpoints;
    }

    pub fn breakpoints(&self) -> BreakpointSet {
        self.shared.debug().breakpoints.clone()
    }

    /// Pause this long on every line, for visualization.
    pub fn set_execution_delay(&self, delay_ms: u64) {
        self.shared.delay_ms.store(delay_ms, Ordering::Relaxed);
    }

    pub fn execution_delay(&self) -> u64 {
        self.shared.delay_ms.load(Ordering::Relaxed)
    }

    pub fn continue_execution(&self) {
        self.command(DebugCommand::Continue);
    }

    pub fn step_into(&self) {
        self.command(DebugCommand::StepInto);
    }

    pub fn step_over(&self) {
        self.command(DebugCommand::StepOver);
    }

    pub fn step_out(&self) {
        self.command(DebugCommand::StepOut);
    }

    /// Resume a paused session with `command`.
    ///
    /// When nothing is paused the command is latched: the most recent one is
    /// kept and applied at the next pause instead of blocking there.
    pub fn command(&self, command: DebugCommand) {
        let mut ctx = self.shared.debug();
        match ctx.policy.apply(command) {
            Some(next) => {
                debug!(%command, state = %next, "Resuming paused session");
                self.shared.emit(ControllerEvent::DebugStateChanged(next));
                drop(ctx);
                self.shared.resumed.notify_all();
            }
            None => {
                debug!(%command, "No pause in effect; command latched");
                ctx.latched = Some(command);
            }
        }
    }

    pub fn debug_state(&self) -> DebugState {
        self.shared.debug().policy.state()
    }

    /// Line about to execute, or -1 when idle.
    pub fn current_line(&self) -> i64 {
        self.shared.current_line.load(Ordering::Acquire)
    }

    pub fn is_executing(&self) -> bool {
        self.shared.executing.load(Ordering::Acquire)
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.shared.runtime
    }
}

impl Drop for ExecutionController {
    fn drop(&mut self) {
        self.abort();
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Execution worker panicked during shutdown");
            }
        }
    }
}

impl Shared {
    fn debug(&self) -> MutexGuard<'_, DebugContext> {
        self.debug.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ControllerEvent) {
        // The host may have dropped its receiver.
        let _ = self.events.send(event);
    }

    fn run_session(self: &Arc<Self>, job: Job) {
        self.emit(ControllerEvent::ExecutionStarted);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(&job)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(self.describe_failure(&err)),
            Err(payload) => Some(format!(
                "Internal error during execution: {}",
                panic_message(payload.as_ref())
            )),
        };
        if let Some(message) = failure {
            self.emit(ControllerEvent::ErrorOccurred(message));
        }

        self.current_line.store(-1, Ordering::Release);
        {
            let mut ctx = self.debug();
            ctx.policy.reset();
            ctx.latched = None;
        }
        self.executing.store(false, Ordering::Release);
        self.emit(ControllerEvent::ExecutionFinished);
    }

    #[tracing::instrument(skip_all, fields(lines = job.total_lines))]
    fn execute(self: &Arc<Self>, job: &Job) -> Result<()> {
        let runtime = &self.runtime;
        if !runtime.is_initialized() {
            return Err(DebuggerError::Uninitialized.into());
        }

        // Claimed before anything touches the interpreter: a paused session
        // elsewhere keeps it locked for as long as it stays paused.
        let _session = runtime.begin_session()?;
        let _gil = runtime.lock().acquire();
        let chunk_name = runtime.chunk_name();
        {
            let mut ctx = self.debug();
            ctx.chunk_name = chunk_name.clone();
            ctx.total_lines = job.total_lines;
        }

        let _registration = bridge::register(Arc::clone(self) as Arc<dyn TraceSink>);
        let events = self.events.clone();
        runtime.redirect_output(move |text: &str| {
            let _ = events.send(ControllerEvent::OutputReceived(text.to_string()));
        })?;
        runtime.install_trace_hook()?;

        let outcome = runtime.execute_source(&job.source, &chunk_name);

        runtime.remove_trace_hook();
        runtime.clear_output_redirect();
        outcome
    }

    fn describe_failure(&self, err: &anyhow::Error) -> String {
        let interrupted = matches!(
            err.downcast_ref::<DebuggerError>(),
            Some(DebuggerError::Interrupted)
        );
        if interrupted || self.abort.load(Ordering::Acquire) {
            DebuggerError::Interrupted.to_string()
        } else {
            err.to_string()
        }
    }

    fn on_line(&self, line: u32, event: &TraceEvent) -> TraceAction {
        self.current_line.store(i64::from(line), Ordering::Release);

        let mut ctx = self.debug();
        if let Some(depth) = event.depth {
            ctx.policy.sync(depth);
        }
        let at_breakpoint = ctx.at_breakpoint(line, event.source.as_deref());
        let verdict = ctx.policy.observe(TraceKind::Line, Some(line), at_breakpoint);
        self.emit(ControllerEvent::LineExecuted(line));
        self.emit(ControllerEvent::ProgressUpdated {
            current: line,
            total: ctx.total_lines,
        });

        if verdict == Verdict::Pause {
            debug!(line, at_breakpoint, "Pausing execution");
            self.emit(ControllerEvent::DebugStateChanged(DebugState::Paused));
            match ctx.latched.take() {
                Some(command) => {
                    if let Some(next) = ctx.policy.apply(command) {
                        debug!(%command, "Applying latched command");
                        self.emit(ControllerEvent::DebugStateChanged(next));
                    }
                    drop(ctx);
                }
                None => self.wait_for_resume(ctx),
            }
        } else {
            drop(ctx);
        }

        if self.abort.load(Ordering::Acquire) {
            return TraceAction::Interrupt;
        }
        self.pace();
        if self.abort.load(Ordering::Acquire) {
            TraceAction::Interrupt
        } else {
            TraceAction::Continue
        }
    }

    /// Block the worker until a command or an abort ends the pause.
    fn wait_for_resume(&self, ctx: MutexGuard<'_, DebugContext>) {
        let suspended = self.runtime.lock().suspend();
        let ctx = self
            .resumed
            .wait_while(ctx, |ctx| {
                ctx.policy.state() == DebugState::Paused && !self.abort.load(Ordering::Acquire)
            })
            .unwrap_or_else(PoisonError::into_inner);
        drop(ctx);
        drop(suspended);
    }

    /// Sleep out the execution delay without holding the execution lock.
    fn pace(&self) {
        let delay_ms = self.delay_ms.load(Ordering::Relaxed);
        if delay_ms == 0 {
            return;
        }
        let _suspended = self.runtime.lock().suspend();
        let ctx = self.debug();
        // An abort cuts the delay short.
        let _ = self
            .resumed
            .wait_timeout_while(ctx, Duration::from_millis(delay_ms), |_| {
                !self.abort.load(Ordering::Acquire)
            })
            .unwrap_or_else(PoisonError::into_inner);
    }
}

impl TraceSink for Shared {
    fn on_trace(&self, event: &TraceEvent) -> TraceAction {
        if self.abort.load(Ordering::Acquire) {
            return TraceAction::Interrupt;
        }
        match (event.kind, event.line) {
            (TraceKind::Line, Some(line)) => self.on_line(line, event),
            (kind, line) => {
                self.debug().policy.observe(kind, line, false);
                TraceAction::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(lines: &[u32]) -> DebugContext {
        DebugContext {
            policy: StepPolicy::new(),
            breakpoints: lines.iter().copied().collect(),
            latched: None,
            chunk_name: "script".to_string(),
            total_lines: 4,
        }
    }

    #[test]
    fn breakpoints_match_only_the_session_chunk() {
        let ctx = context(&[2]);
        assert!(ctx.at_breakpoint(2, Some("script")));
        assert!(!ctx.at_breakpoint(3, Some("script")));
        assert!(!ctx.at_breakpoint(2, Some("greet")));
        assert!(!ctx.at_breakpoint(2, None));
    }
}
