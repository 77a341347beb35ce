//! Caller-misuse errors returned synchronously by [`crate::Session`].
//!
//! Everything that goes wrong asynchronously (transport, protocol,
//! authorization, storage) is reported as [`crate::SessionEvent::Error`]
//! instead.

use crate::state::InteractivityState;

/// An operation was called in a way the host can correct.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Another [`crate::Session`] is alive in this process.
    #[error("a session is already active in this process")]
    SessionAlreadyActive,

    /// `app_id` or `project_version_id` is not configured.
    #[error("project app_id and project_version_id must be configured")]
    MissingProjectConfig,

    /// The session has not been initialized.
    #[error("session must be initialized before calling `{0}`")]
    NotInitialized(&'static str),

    /// The operation is not valid in the current state.
    #[error("`{operation}` is not allowed while {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the session was in.
        state: InteractivityState,
    },

    /// No control with this id is cached.
    #[error("unknown control `{0}`")]
    UnknownControl(String),

    /// No scene with this id is cached.
    #[error("unknown scene `{0}`")]
    UnknownScene(String),

    /// No participant with this user id is cached.
    #[error("unknown participant {0}")]
    UnknownParticipant(u32),

    /// The control exists but is not a button.
    #[error("control `{0}` is not a button")]
    NotAButton(String),

    /// The control exists but is not a joystick.
    #[error("control `{0}` is not a joystick")]
    NotAJoystick(String),
}
