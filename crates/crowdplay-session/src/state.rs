//! Session lifecycle states.

use std::fmt;

/// Where the session is in its connect/authorize/interactive lifecycle.
///
/// ```text
/// NotInitialized -> Initializing -> (ShortCodeRequired <-> polling) -> Initialized
///   -> InteractivityPending -> InteractivityEnabled -> InteractivityDisabled
/// ```
///
/// `InteractivityDisabled -> InteractivityPending` re-enters interactivity. A
/// transport closure from any connected state moves to `InteractivityDisabled`
/// and starts the reconnect path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InteractivityState {
    #[default]
    NotInitialized,
    /// Discovering hosts, validating tokens or opening the socket.
    Initializing,
    /// Waiting for the user to enter the short code.
    ShortCodeRequired,
    /// Connected; groups and scenes are loaded.
    Initialized,
    InteractivityDisabled,
    /// `ready` was sent; waiting for the service to acknowledge.
    InteractivityPending,
    InteractivityEnabled,
}

impl InteractivityState {
    /// States in which the socket is open and the initial fetch completed.
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            Self::Initialized | Self::InteractivityPending | Self::InteractivityEnabled
        )
    }
}

impl fmt::Display for InteractivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotInitialized => "not initialized",
            Self::Initializing => "initializing",
            Self::ShortCodeRequired => "waiting for short code",
            Self::Initialized => "initialized",
            Self::InteractivityDisabled => "interactivity disabled",
            Self::InteractivityPending => "interactivity pending",
            Self::InteractivityEnabled => "interactivity enabled",
        };
        f.write_str(name)
    }
}
