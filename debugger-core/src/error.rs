// Error taxonomy for the debugger core
//
// Recoverable failures (no thread selected, stale frame index) surface to
// the immediate caller and are never logged as system errors. Transport
// disconnection is an expected terminal event that drives a state
// transition, not an error to retry.

use jdwp_transport::JdwpError;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A step was requested with no thread selected. Recoverable; the
    /// session state is unchanged.
    #[error("no current thread selected")]
    NoCurrentThread,

    /// A thread or frame query failed because the target moved on, or the
    /// requested frame does not exist. The caller should re-fetch context.
    #[error("incompatible thread state: {0}")]
    IncompatibleState(String),

    /// Step-request construction or arming failed.
    #[error("stepping failed")]
    Stepping(#[source] JdwpError),

    /// The transport rejected the connection.
    #[error("connection failed")]
    Connect(#[source] JdwpError),

    /// Priority outside [1, 1023], or a reserved band used by a listener
    /// without the matching capability.
    #[error("invalid listener priority {priority}: {reason}")]
    InvalidPriority { priority: u16, reason: &'static str },

    /// A session operation was issued in the wrong lifecycle state.
    #[error("session is {actual}, operation requires {required}")]
    InvalidState {
        required: &'static str,
        actual: &'static str,
    },

    /// The listener is already registered with this session.
    #[error("listener already registered")]
    DuplicateListener,

    /// The debuggee went away. Propagated out of the dispatch loop and
    /// turned into a `Deactivated` session event; never retried.
    #[error("debuggee disconnected")]
    Disconnected,

    /// A dispatch listener failed. Caught at the dispatcher boundary,
    /// logged, and counted as a vote against resuming.
    #[error("listener failed")]
    Listener(#[source] anyhow::Error),
}

impl CoreError {
    /// Wrap a protocol failure from a stepping operation, keeping the
    /// disconnect signal distinct so it can end the session.
    pub fn stepping(source: JdwpError) -> Self {
        if source.is_disconnect() {
            CoreError::Disconnected
        } else {
            CoreError::Stepping(source)
        }
    }

    /// Wrap a protocol failure from connection establishment.
    pub fn connect(source: JdwpError) -> Self {
        CoreError::Connect(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepping_wrapper_promotes_disconnects() {
        assert!(matches!(
            CoreError::stepping(JdwpError::Disconnected),
            CoreError::Disconnected
        ));
        assert!(matches!(
            CoreError::stepping(JdwpError::ErrorCode(13, "THREAD_NOT_SUSPENDED")),
            CoreError::Stepping(_)
        ));
    }
}
