//! Projection of server methods and reply results onto typed values.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CodecError;
use crate::records::{
    ControlRecord, GroupRecord, InputRecord, ParticipantRecord, SceneRecord, collect_records,
    lenient, lenient_list,
};

/// A server-originated method the session understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMethod {
    /// `onParticipantJoin`
    ParticipantJoin(Vec<ParticipantRecord>),
    /// `onParticipantLeave`
    ParticipantLeave(Vec<ParticipantRecord>),
    /// `onParticipantUpdate`
    ParticipantUpdate(Vec<ParticipantRecord>),
    /// `giveInput`
    GiveInput(GiveInput),
    /// `onReady`
    Ready(bool),
    /// `onGroupCreate`
    GroupCreate(Vec<GroupRecord>),
    /// `onGroupUpdate`
    GroupUpdate(Vec<GroupRecord>),
    /// `onSceneCreate`
    SceneCreate(Vec<SceneRecord>),
    /// `onSceneUpdate`
    SceneUpdate(Vec<SceneRecord>),
    /// `onControlUpdate`
    ControlUpdate {
        scene_id: String,
        controls: Vec<ControlRecord>,
    },
    /// Anything else. Kept by name for logging and otherwise ignored.
    Unsupported(String),
}

/// Params of `giveInput`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GiveInput {
    /// Session id of the participant that produced the input.
    pub participant_session: String,
    /// One or more raw inputs, in wire order.
    pub inputs: Vec<InputRecord>,
}

/// Result of `getGroups`, `createGroups` and `updateGroups`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GroupsResult {
    #[serde(deserialize_with = "lenient_list")]
    pub groups: Vec<GroupRecord>,
}

/// Result of `getScenes` and `updateScenes`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScenesResult {
    #[serde(deserialize_with = "lenient_list")]
    pub scenes: Vec<SceneRecord>,
}

/// Result of `getAllParticipants` and `updateParticipants`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParticipantsResult {
    #[serde(deserialize_with = "lenient_list")]
    pub participants: Vec<ParticipantRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReadyParams {
    #[serde(rename = "isReady", deserialize_with = "lenient")]
    is_ready: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ControlsParams {
    #[serde(rename = "sceneID", deserialize_with = "lenient")]
    scene_id: String,
    #[serde(deserialize_with = "lenient_list")]
    controls: Vec<ControlRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GiveInputParams {
    #[serde(rename = "participantID", deserialize_with = "lenient")]
    participant_id: String,
    /// A single object in practice, but arrays are accepted too.
    input: Value,
}

fn input_records(input: Value) -> Vec<InputRecord> {
    match input {
        Value::Null => Vec::new(),
        Value::Array(items) => collect_records(items),
        single => collect_records(vec![single]),
    }
}

/// Project a params or result value onto `T`. `Null` projects to `T::default()`.
pub fn project<T>(method: &str, value: &Value) -> Result<T, CodecError>
where
    T: DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(T::default());
    }
    T::deserialize(value).map_err(|source| CodecError::InvalidPayload {
        method: method.to_string(),
        source,
    })
}

impl ServerMethod {
    /// Project a `method` frame onto a typed server method.
    pub fn from_frame(method: &str, params: &Value) -> Result<Self, CodecError> {
        let parsed = match method {
            "onParticipantJoin" => {
                Self::ParticipantJoin(project::<ParticipantsResult>(method, params)?.participants)
            }
            "onParticipantLeave" => {
                Self::ParticipantLeave(project::<ParticipantsResult>(method, params)?.participants)
            }
            "onParticipantUpdate" => {
                Self::ParticipantUpdate(project::<ParticipantsResult>(method, params)?.participants)
            }
            "giveInput" => {
                let raw: GiveInputParams = project(method, params)?;
                Self::GiveInput(GiveInput {
                    participant_session: raw.participant_id,
                    inputs: input_records(raw.input),
                })
            }
            "onReady" => Self::Ready(project::<ReadyParams>(method, params)?.is_ready),
            "onGroupCreate" => Self::GroupCreate(project::<GroupsResult>(method, params)?.groups),
            "onGroupUpdate" => Self::GroupUpdate(project::<GroupsResult>(method, params)?.groups),
            "onSceneCreate" => Self::SceneCreate(project::<ScenesResult>(method, params)?.scenes),
            "onSceneUpdate" => Self::SceneUpdate(project::<ScenesResult>(method, params)?.scenes),
            "onControlUpdate" => {
                let raw: ControlsParams = project(method, params)?;
                Self::ControlUpdate {
                    scene_id: raw.scene_id,
                    controls: raw.controls,
                }
            }
            other => Self::Unsupported(other.to_string()),
        };
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{DEFAULT_GROUP_ID, InputKind};
    use serde_json::json;

    #[test]
    fn test_participant_join_projects_records() {
        let params = json!({
            "participants": [
                {"sessionID": "abc", "userID": 12, "username": "ana", "level": 3,
                 "connectedAt": 1000, "groupID": "default", "etag": "p1", "extra": true}
            ]
        });
        let ServerMethod::ParticipantJoin(participants) =
            ServerMethod::from_frame("onParticipantJoin", &params).unwrap()
        else {
            panic!("expected join");
        };
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].username, "ana");
        assert_eq!(participants[0].connected_at, Some(1000));
        assert_eq!(participants[0].group_id, DEFAULT_GROUP_ID);
    }

    #[test]
    fn test_give_input_accepts_single_object() {
        let params = json!({
            "participantID": "abc",
            "input": {"controlID": "stick", "event": "move", "x": 0.5, "y": -0.25}
        });
        let ServerMethod::GiveInput(input) = ServerMethod::from_frame("giveInput", &params).unwrap()
        else {
            panic!("expected giveInput");
        };
        assert_eq!(input.participant_session, "abc");
        assert_eq!(input.inputs.len(), 1);
        assert_eq!(input.inputs[0].kind(), Some(InputKind::Move));
        assert_eq!(input.inputs[0].y, -0.25);
    }

    #[test]
    fn test_give_input_accepts_array() {
        let params = json!({
            "participantID": "abc",
            "input": [
                {"controlID": "jump", "event": "mousedown"},
                {"controlID": "jump", "event": "mouseup"}
            ]
        });
        let ServerMethod::GiveInput(input) = ServerMethod::from_frame("giveInput", &params).unwrap()
        else {
            panic!("expected giveInput");
        };
        let kinds: Vec<_> = input.inputs.iter().map(InputRecord::kind).collect();
        assert_eq!(kinds, [Some(InputKind::Press), Some(InputKind::Release)]);
    }

    #[test]
    fn test_give_input_without_input_is_empty() {
        let params = json!({"participantID": "abc"});
        let ServerMethod::GiveInput(input) = ServerMethod::from_frame("giveInput", &params).unwrap()
        else {
            panic!("expected giveInput");
        };
        assert!(input.inputs.is_empty());
    }

    #[test]
    fn test_on_ready() {
        let method = ServerMethod::from_frame("onReady", &json!({"isReady": true})).unwrap();
        assert_eq!(method, ServerMethod::Ready(true));
        let method = ServerMethod::from_frame("onReady", &Value::Null).unwrap();
        assert_eq!(method, ServerMethod::Ready(false));
    }

    #[test]
    fn test_unknown_method_is_unsupported() {
        let method = ServerMethod::from_frame("onWorldUpdate", &json!({"x": 1})).unwrap();
        assert_eq!(method, ServerMethod::Unsupported("onWorldUpdate".to_string()));
    }

    #[test]
    fn test_wrong_shape_is_invalid_payload() {
        let err = ServerMethod::from_frame("onGroupCreate", &json!({"groups": "nope"})).unwrap_err();
        match err {
            CodecError::InvalidPayload { method, .. } => assert_eq!(method, "onGroupCreate"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_control_update_carries_scene() {
        let params = json!({
            "sceneID": "lobby",
            "controls": [{"controlID": "jump", "disabled": true, "etag": "c2"}]
        });
        let ServerMethod::ControlUpdate { scene_id, controls } =
            ServerMethod::from_frame("onControlUpdate", &params).unwrap()
        else {
            panic!("expected control update");
        };
        assert_eq!(scene_id, "lobby");
        assert_eq!(controls[0].disabled, Some(true));
    }

    #[test]
    fn test_bad_participant_does_not_drop_the_batch() {
        let params = json!({
            "participants": [
                {"sessionID": "s-1", "userID": 1, "username": "ana"},
                {"sessionID": "s-2", "userID": 2, "username": null},
                42
            ]
        });
        let ServerMethod::ParticipantJoin(participants) =
            ServerMethod::from_frame("onParticipantJoin", &params).unwrap()
        else {
            panic!("expected join");
        };
        let users: Vec<_> = participants.iter().map(|p| p.user_id).collect();
        assert_eq!(users, [1, 2]);
        assert_eq!(participants[1].username, "");
    }

    #[test]
    fn test_give_input_skips_malformed_entries() {
        let params = json!({
            "participantID": "abc",
            "input": [
                {"controlID": "jump", "event": "mousedown"},
                [1, 2],
                {"controlID": "stick", "event": "move", "x": null, "y": 0.5}
            ]
        });
        let ServerMethod::GiveInput(input) = ServerMethod::from_frame("giveInput", &params).unwrap()
        else {
            panic!("expected giveInput");
        };
        assert_eq!(input.inputs.len(), 2);
        assert_eq!(input.inputs[1].x, 0.0);
        assert_eq!(input.inputs[1].y, 0.5);
    }

    #[test]
    fn test_project_groups_result() {
        let result: GroupsResult = project(
            "getGroups",
            &json!({"groups": [{"groupID": "default", "sceneID": "lobby", "etag": "g1"}]}),
        )
        .unwrap();
        assert_eq!(result.groups[0].scene_id, "lobby");
    }
}
