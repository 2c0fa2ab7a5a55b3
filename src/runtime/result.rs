//! Fault classification and formatting for chunk execution.
//!
//! Lua faults reach the worker as [`mlua::Error`] values that may be wrapped
//! several times (a hook error inside a callback inside a `pcall`). This module
//! peels those layers back so the host sees the script's own message, and so
//! the interrupt raised by an abort can be told apart from a genuine fault.

use crate::DebuggerError;
use mlua::Error as LuaError;

/// Render a Lua fault as the message delivered through `ErrorOccurred`.
pub fn describe_fault(err: &LuaError) -> String {
    match err {
        LuaError::SyntaxError { message, .. } => format!("Syntax error: {}", message),
        LuaError::RuntimeError(message) => message.clone(),
        LuaError::MemoryError(message) => format!("Out of memory: {}", message),
        LuaError::CallbackError { cause, .. } => describe_fault(cause),
        LuaError::ExternalError(inner) => match inner.downcast_ref::<DebuggerError>() {
            Some(debugger_err) => debugger_err.to_string(),
            None => inner.to_string(),
        },
        other => other.to_string(),
    }
}

/// Whether `err` is the interrupt raised by the trace hook after an abort.
pub fn is_interrupt(err: &LuaError) -> bool {
    match err {
        LuaError::CallbackError { cause, .. } => is_interrupt(cause),
        LuaError::ExternalError(inner) => matches!(
            inner.downcast_ref::<DebuggerError>(),
            Some(DebuggerError::Interrupted)
        ),
        _ => false,
    }
}

/// Convert a Lua fault into the crate's error taxonomy.
pub fn into_debugger_error(err: &LuaError) -> DebuggerError {
    if is_interrupt(err) {
        DebuggerError::Interrupted
    } else {
        DebuggerError::ExecutionFault(describe_fault(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn runtime_error_keeps_script_message() {
        let err = LuaError::RuntimeError("script:3: boom".to_string());
        assert_eq!(describe_fault(&err), "script:3: boom");
        assert!(!is_interrupt(&err));
    }

    #[test]
    fn interrupt_is_detected_through_callback_wrapping() {
        let interrupt = LuaError::external(DebuggerError::Interrupted);
        let wrapped = LuaError::CallbackError {
            traceback: String::new(),
            cause: Arc::new(interrupt),
        };
        assert!(is_interrupt(&wrapped));
        assert!(matches!(
            into_debugger_error(&wrapped),
            DebuggerError::Interrupted
        ));
        assert_eq!(describe_fault(&wrapped), "execution aborted by user");
    }

    #[test]
    fn syntax_error_is_labelled() {
        let err = LuaError::SyntaxError {
            message: "script:1: unexpected symbol near 'then'".to_string(),
            incomplete_input: false,
        };
        assert!(describe_fault(&err).starts_with("Syntax error: "));
    }
}
