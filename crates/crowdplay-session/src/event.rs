//! Events delivered to the host from [`crate::Session::poll`].

use std::fmt;

use crate::entities::{Participant, ParticipantState};
use crate::state::InteractivityState;

/// Everything the host can be told about, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    InteractivityStateChanged(InteractivityState),
    ParticipantStateChanged(ParticipantStateChange),
    Button(ButtonEvent),
    Joystick(JoystickEvent),
    Error(ErrorEvent),
}

/// A participant joined, left, or had input enabled/disabled.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantStateChange {
    /// Snapshot of the participant after the change.
    pub participant: Participant,
    pub state: ParticipantState,
}

/// A press or release.
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonEvent {
    pub control_id: String,
    /// `None` when the input came from a participant the cache does not know.
    pub participant: Option<Participant>,
    pub is_pressed: bool,
}

/// A joystick move. `y` is already inverted so that up is positive.
#[derive(Debug, Clone, PartialEq)]
pub struct JoystickEvent {
    pub control_id: String,
    pub participant: Option<Participant>,
    pub x: f64,
    pub y: f64,
}

impl JoystickEvent {
    pub fn intensity(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Category of an asynchronous failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Host discovery, connect failure, or unexpected close.
    Transport,
    /// A frame that could not be decoded or projected.
    Protocol,
    /// Short-code, token validation, exchange or refresh failure.
    Authorization,
    /// The token cache could not be read or written.
    Storage,
}

impl ErrorKind {
    /// Numeric code carried by [`ErrorEvent`].
    pub fn code(self) -> u32 {
        match self {
            ErrorKind::Transport => 1,
            ErrorKind::Protocol => 2,
            ErrorKind::Authorization => 3,
            ErrorKind::Storage => 4,
        }
    }
}

/// An asynchronous failure. The session keeps running after these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub code: u32,
    pub message: String,
}

impl ErrorEvent {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?} {}] {}", self.kind, self.code, self.message)
    }
}
