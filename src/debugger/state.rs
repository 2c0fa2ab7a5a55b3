use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the debugger stands with respect to the running session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugState {
    /// Free running; only breakpoints stop execution.
    #[default]
    Running,
    /// The worker is blocked waiting for a command.
    Paused,
    /// Stop at the very next statement, at any depth.
    StepInto,
    /// Stop at the next statement no deeper than where stepping began.
    StepOver,
    /// Stop once the current function has returned.
    StepOut,
}

impl fmt::Display for DebugState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DebugState::Running => "running",
            DebugState::Paused => "paused",
            DebugState::StepInto => "step-into",
            DebugState::StepOver => "step-over",
            DebugState::StepOut => "step-out",
        };
        write!(f, "{}", s)
    }
}

/// A resume command issued by the host while execution is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugCommand {
    Continue,
    StepInto,
    StepOver,
    StepOut,
}

impl DebugCommand {
    /// The state the debugger enters when this command resumes a pause.
    pub fn target_state(self) -> DebugState {
        match self {
            DebugCommand::Continue => DebugState::Running,
            DebugCommand::StepInto => DebugState::StepInto,
            DebugCommand::StepOver => DebugState::StepOver,
            DebugCommand::StepOut => DebugState::StepOut,
        }
    }
}

impl fmt::Display for DebugCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DebugCommand::Continue => "continue",
            DebugCommand::StepInto => "step into",
            DebugCommand::StepOver => "step over",
            DebugCommand::StepOut => "step out",
        };
        write!(f, "{}", s)
    }
}
