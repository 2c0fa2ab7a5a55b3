//! Trace-to-debug policy: decides, per trace event, whether to pause.
//!
//! | state    | pauses on a line event when              |
//! |----------|------------------------------------------|
//! | Running  | the line holds a breakpoint              |
//! | StepInto | always                                   |
//! | StepOver | depth <= depth when stepping began       |
//! | StepOut  | depth <  depth when stepping began       |
//!
//! Breakpoints pause in every mode. Call and return events move the depth
//! counter between lines; each line event then resets it to the measured
//! stack depth, since frames unwound by an error never report a return.

use crate::debugger::bridge::TraceKind;
use crate::debugger::state::{DebugCommand, DebugState};

/// Outcome of feeding one trace event to the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Pause,
}

#[derive(Debug, Clone, Default)]
pub struct StepPolicy {
    state: DebugState,
    call_depth: usize,
    step_depth: usize,
}

impl StepPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to `Running` at depth 0, as at the start of a session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn state(&self) -> DebugState {
        self.state
    }

    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    /// Depth recorded when the current step command was issued.
    pub fn step_depth(&self) -> usize {
        self.step_depth
    }

    /// Adopt the measured stack depth of the line about to run.
    pub fn sync(&mut self, depth: usize) {
        self.call_depth = depth;
    }

    /// Feed one trace event. Moves to `Paused` when the verdict is `Pause`.
    pub fn observe(&mut self, kind: TraceKind, line: Option<u32>, at_breakpoint: bool) -> Verdict {
        match kind {
            TraceKind::Call => {
                self.call_depth += 1;
                Verdict::Continue
            }
            TraceKind::TailCall => Verdict::Continue,
            TraceKind::Return => {
                self.call_depth = self.call_depth.saturating_sub(1);
                Verdict::Continue
            }
            TraceKind::Line => {
                if line.is_none() {
                    return Verdict::Continue;
                }
                let stepping_done = match self.state {
                    DebugState::Running | DebugState::Paused => false,
                    DebugState::StepInto => true,
                    DebugState::StepOver => self.call_depth <= self.step_depth,
                    DebugState::StepOut => self.call_depth < self.step_depth,
                };
                if stepping_done || (at_breakpoint && self.state != DebugState::Paused) {
                    self.state = DebugState::Paused;
                    Verdict::Pause
                } else {
                    Verdict::Continue
                }
            }
        }
    }

    /// Resume from a pause. Returns the new state, or `None` when not paused.
    pub fn apply(&mut self, command: DebugCommand) -> Option<DebugState> {
        if self.state != DebugState::Paused {
            return None;
        }
        self.step_depth = self.call_depth;
        self.state = command.target_state();
        Some(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(policy: &mut StepPolicy, n: u32) -> Verdict {
        policy.observe(TraceKind::Line, Some(n), false)
    }

    fn paused_at_depth(depth: usize) -> StepPolicy {
        let mut policy = StepPolicy::new();
        for _ in 0..depth {
            policy.observe(TraceKind::Call, None, false);
        }
        assert_eq!(policy.observe(TraceKind::Line, Some(1), true), Verdict::Pause);
        policy
    }

    #[test]
    fn running_pauses_only_on_breakpoints() {
        let mut policy = StepPolicy::new();
        policy.observe(TraceKind::Call, None, false);
        assert_eq!(line(&mut policy, 1), Verdict::Continue);
        assert_eq!(
            policy.observe(TraceKind::Line, Some(2), true),
            Verdict::Pause
        );
        assert_eq!(policy.state(), DebugState::Paused);
    }

    #[test]
    fn unresolvable_lines_never_pause() {
        let mut policy = paused_at_depth(1);
        policy.apply(DebugCommand::StepInto);
        assert_eq!(
            policy.observe(TraceKind::Line, None, true),
            Verdict::Continue
        );
    }

    #[test]
    fn step_into_pauses_inside_new_frame() {
        let mut policy = paused_at_depth(1);
        assert_eq!(policy.apply(DebugCommand::StepInto), Some(DebugState::StepInto));
        policy.observe(TraceKind::Call, None, false);
        assert_eq!(line(&mut policy, 10), Verdict::Pause);
        assert_eq!(policy.call_depth(), 2);
    }

    #[test]
    fn step_over_skips_nested_frames() {
        let mut policy = paused_at_depth(1);
        policy.apply(DebugCommand::StepOver);
        assert_eq!(policy.step_depth(), 1);

        policy.observe(TraceKind::Call, None, false);
        assert_eq!(line(&mut policy, 10), Verdict::Continue);
        assert_eq!(line(&mut policy, 11), Verdict::Continue);
        policy.observe(TraceKind::Return, None, false);
        assert_eq!(line(&mut policy, 2), Verdict::Pause);
    }

    #[test]
    fn step_over_still_honours_breakpoints_in_callee() {
        let mut policy = paused_at_depth(1);
        policy.apply(DebugCommand::StepOver);
        policy.observe(TraceKind::Call, None, false);
        assert_eq!(
            policy.observe(TraceKind::Line, Some(10), true),
            Verdict::Pause
        );
    }

    #[test]
    fn step_out_waits_for_return() {
        let mut policy = paused_at_depth(2);
        policy.apply(DebugCommand::StepOut);
        assert_eq!(line(&mut policy, 11), Verdict::Continue);

        // A deeper call and its return do not count.
        policy.observe(TraceKind::Call, None, false);
        assert_eq!(line(&mut policy, 20), Verdict::Continue);
        policy.observe(TraceKind::Return, None, false);
        assert_eq!(line(&mut policy, 12), Verdict::Continue);

        policy.observe(TraceKind::Return, None, false);
        assert_eq!(line(&mut policy, 3), Verdict::Pause);
    }

    #[test]
    fn tail_calls_do_not_deepen() {
        let mut policy = paused_at_depth(2);
        policy.apply(DebugCommand::StepOver);
        policy.observe(TraceKind::TailCall, None, false);
        assert_eq!(line(&mut policy, 30), Verdict::Pause);
    }

    #[test]
    fn frames_lost_to_an_error_are_resynced() {
        let mut policy = paused_at_depth(1);
        policy.apply(DebugCommand::StepOver);

        // pcall and the raising callee enter; only pcall reports a return.
        policy.observe(TraceKind::Call, None, false);
        policy.observe(TraceKind::Call, None, false);
        policy.observe(TraceKind::Return, None, false);
        assert_eq!(policy.call_depth(), 2);

        policy.sync(1);
        assert_eq!(line(&mut policy, 3), Verdict::Pause);
    }

    #[test]
    fn step_out_uses_the_measured_depth() {
        let mut policy = paused_at_depth(2);
        policy.apply(DebugCommand::StepOut);

        // Still inside the frame that was stepped out of.
        policy.sync(2);
        assert_eq!(line(&mut policy, 4), Verdict::Continue);

        policy.sync(1);
        assert_eq!(line(&mut policy, 8), Verdict::Pause);
    }

    #[test]
    fn commands_only_apply_while_paused() {
        let mut policy = StepPolicy::new();
        assert_eq!(policy.apply(DebugCommand::Continue), None);
        assert_eq!(policy.state(), DebugState::Running);

        let mut policy = paused_at_depth(1);
        assert_eq!(policy.apply(DebugCommand::Continue), Some(DebugState::Running));
        assert_eq!(policy.apply(DebugCommand::StepInto), None);
    }

    #[test]
    fn depth_never_underflows() {
        let mut policy = StepPolicy::new();
        policy.observe(TraceKind::Return, None, false);
        assert_eq!(policy.call_depth(), 0);
    }
}
