//! Wire codec for the interactive service protocol.
//!
//! Every frame is a JSON object carrying a `type` discriminator. Inbound
//! frames are parsed into a [`serde_json::Value`] once and then projected onto
//! typed records with defaults for absent keys; unknown keys are ignored at
//! every level. Outbound requests are built from [`ClientMethod`] values and
//! encoded with [`encode_request`].

mod error;
mod frame;
mod inbound;
mod outbound;
mod records;

pub use error::CodecError;
pub use frame::{Frame, decode_frame};
pub use inbound::{
    GiveInput, GroupsResult, ParticipantsResult, ScenesResult, ServerMethod, project,
};
pub use outbound::{
    ClientMethod, ControlUpdate, GroupAssignment, GroupUpdate, Method, ParticipantUpdate,
    SceneUpdate, encode_request,
};
pub use records::{
    ControlRecord, DEFAULT_GROUP_ID, DEFAULT_SCENE_ID, GroupRecord, InputKind, InputRecord,
    ParticipantRecord, SceneRecord,
};
