//! Wire messages for driving a controller from outside the process.
//!
//! Events go out as one JSON object per line; commands come in the same way.

use crate::debugger::breakpoint::BreakpointSet;
use crate::debugger::controller::{ControllerEvent, ExecutionController};
use crate::debugger::state::{DebugCommand, DebugState};
use serde::{Deserialize, Serialize};

/// JSON mirror of [`ControllerEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventMessage {
    ExecutionStarted,
    ExecutionFinished,
    LineExecuted { line: u32 },
    OutputReceived { text: String },
    ErrorOccurred { message: String },
    DebugStateChanged { state: DebugState },
    ProgressUpdated { current: u32, total: u32 },
}

impl EventMessage {
    /// Serialize as a single line of JSON, without the trailing newline.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&ControllerEvent> for EventMessage {
    fn from(event: &ControllerEvent) -> Self {
        match event {
            ControllerEvent::ExecutionStarted => EventMessage::ExecutionStarted,
            ControllerEvent::ExecutionFinished => EventMessage::ExecutionFinished,
            ControllerEvent::LineExecuted(line) => EventMessage::LineExecuted { line: *line },
            ControllerEvent::OutputReceived(text) => {
                EventMessage::OutputReceived { text: text.clone() }
            }
            ControllerEvent::ErrorOccurred(message) => EventMessage::ErrorOccurred {
                message: message.clone(),
            },
            ControllerEvent::DebugStateChanged(state) => {
                EventMessage::DebugStateChanged { state: *state }
            }
            ControllerEvent::ProgressUpdated { current, total } => {
                EventMessage::ProgressUpdated {
                    current: *current,
                    total: *total,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CommandMessage {
    Continue,
    StepInto,
    StepOver,
    StepOut,
    AddBreakpoint { line: u32 },
    RemoveBreakpoint { line: u32 },
    SetBreakpoints { lines: Vec<u32> },
    SetDelay { ms: u64 },
    Abort,
    GetState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum DebugResponse {
    Ok,
    Error {
        message: String,
    },
    State {
        state: DebugState,
        line: i64,
        executing: bool,
        breakpoints: Vec<u32>,
    },
}

/// Apply one command to `controller`.
pub fn dispatch(controller: &ExecutionController, message: CommandMessage) -> DebugResponse {
    match message {
        CommandMessage::Continue => controller.command(DebugCommand::Continue),
        CommandMessage::StepInto => controller.command(DebugCommand::StepInto),
        CommandMessage::StepOver => controller.command(DebugCommand::StepOver),
        CommandMessage::StepOut => controller.command(DebugCommand::StepOut),
        CommandMessage::AddBreakpoint { line } => {
            if line == 0 {
                return DebugResponse::Error {
                    message: "Line numbers start at 1".to_string(),
                };
            }
            let mut breakpoints = controller.breakpoints();
            breakpoints.add(line);
            controller.set_breakpoints(breakpoints);
        }
        CommandMessage::RemoveBreakpoint { line } => {
            let mut breakpoints = controller.breakpoints();
            if !breakpoints.remove(line) {
                return DebugResponse::Error {
                    message: format!("No breakpoint at line {}", line),
                };
            }
            controller.set_breakpoints(breakpoints);
        }
        CommandMessage::SetBreakpoints { lines } => {
            controller.set_breakpoints(lines.into_iter().collect::<BreakpointSet>());
        }
        CommandMessage::SetDelay { ms } => controller.set_execution_delay(ms),
        CommandMessage::Abort => controller.abort(),
        CommandMessage::GetState => {
            return DebugResponse::State {
                state: controller.debug_state(),
                line: controller.current_line(),
                executing: controller.is_executing(),
                breakpoints: controller.breakpoints().list(),
            }
        }
    }
    DebugResponse::Ok
}
