//! Why a recording session ended.

use std::fmt;

/// The cause of a session reaching its terminal state.
///
/// Exactly one of these is produced per session. Only
/// [`TerminationReason::ToolUnavailable`] is an error condition; the other
/// two are normal ways for a broadcast to end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The reconnect counter reached the configured maximum.
    ReconnectBudgetExhausted { reconnects: u32 },
    /// The stream did not come back within the grace period.
    StreamEnded,
    /// The capture tool binary could not be started.
    ToolUnavailable { tool: String },
}

impl TerminationReason {
    /// Returns true for session endings that indicate a broken environment.
    pub fn is_error(&self) -> bool {
        matches!(self, TerminationReason::ToolUnavailable { .. })
    }

    /// Process exit status this ending maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            TerminationReason::ReconnectBudgetExhausted { .. } | TerminationReason::StreamEnded => 0,
            TerminationReason::ToolUnavailable { .. } => 2,
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::ReconnectBudgetExhausted { reconnects } => {
                write!(f, "reconnect budget exhausted after {} reconnect(s)", reconnects)
            }
            TerminationReason::StreamEnded => write!(f, "stream ended"),
            TerminationReason::ToolUnavailable { tool } => {
                write!(f, "capture tool '{}' unavailable", tool)
            }
        }
    }
}
