//! Client-side interactivity session engine.
//!
//! A [`Session`] keeps a persistent, authorized connection to the interactive
//! service, mirrors the server's participants, groups, scenes and controls in
//! an [`EntityCache`], and turns audience input into [`SessionEvent`]s.
//!
//! Network callbacks only decode frames, update shared state and queue
//! events. Host callbacks run exclusively inside [`Session::poll`], which
//! first rotates the input counters and then drains the queue in arrival
//! order.
//!
//! I/O is injected through the [`Transport`], [`AuthHttpClient`] and
//! [`TokenStore`] capabilities; `crowdplay-net` provides the production
//! implementations.

mod auth;
mod cache;
mod capability;
mod entities;
mod error;
mod event;
mod machine;
mod reconnect;
mod requests;
mod session;
mod settings;
mod state;
mod token_store;

pub use cache::EntityCache;
pub use capability::{
    AuthError, AuthHttpClient, ConnectRequest, ShortCode, ShortCodeStatus, StorageError,
    TokenStore, Tokens, Transport, TransportError, TransportListener,
};
pub use entities::{Control, ControlKind, Group, Participant, ParticipantState, Scene};
pub use error::SessionError;
pub use event::{
    ButtonEvent, ErrorEvent, ErrorKind, JoystickEvent, ParticipantStateChange, SessionEvent,
};
pub use reconnect::ReconnectPolicy;
pub use requests::OutstandingRequests;
pub use session::{Services, Session};
pub use settings::SessionSettings;
pub use state::InteractivityState;
pub use token_store::{FileTokenStore, MemoryTokenStore};
