//! Outbound requests.

use serde::Serialize;
use serde_json::{Value, json};

/// Name of every method this client produces. Stored in the outstanding-request
/// table so replies can be routed by what they answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Ready,
    CreateGroups,
    UpdateGroups,
    UpdateScenes,
    UpdateParticipants,
    UpdateControls,
    GetGroups,
    GetScenes,
    GetAllParticipants,
    SetCompression,
}

impl Method {
    /// Wire name of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Ready => "ready",
            Method::CreateGroups => "createGroups",
            Method::UpdateGroups => "updateGroups",
            Method::UpdateScenes => "updateScenes",
            Method::UpdateParticipants => "updateParticipants",
            Method::UpdateControls => "updateControls",
            Method::GetGroups => "getGroups",
            Method::GetScenes => "getScenes",
            Method::GetAllParticipants => "getAllParticipants",
            Method::SetCompression => "setCompression",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `createGroups` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAssignment {
    #[serde(rename = "groupID")]
    pub group_id: String,
    #[serde(rename = "sceneID")]
    pub scene_id: String,
}

/// `updateGroups` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupUpdate {
    #[serde(rename = "groupID")]
    pub group_id: String,
    #[serde(rename = "sceneID")]
    pub scene_id: String,
    pub etag: String,
}

/// `updateScenes` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneUpdate {
    #[serde(rename = "sceneID")]
    pub scene_id: String,
    pub etag: String,
}

/// `updateParticipants` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantUpdate {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub etag: String,
    #[serde(rename = "groupID")]
    pub group_id: String,
}

/// `updateControls` entry. Only the properties that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControlUpdate {
    #[serde(rename = "controlID")]
    pub control_id: String,
    pub etag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    /// Epoch milliseconds at which the cooldown ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl ControlUpdate {
    /// Update with no properties set yet.
    pub fn new(control_id: impl Into<String>, etag: impl Into<String>) -> Self {
        Self {
            control_id: control_id.into(),
            etag: etag.into(),
            ..Default::default()
        }
    }
}

/// A request this client can send, with typed params.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMethod {
    Ready { is_ready: bool },
    CreateGroups(Vec<GroupAssignment>),
    UpdateGroups(Vec<GroupUpdate>),
    UpdateScenes(Vec<SceneUpdate>),
    UpdateParticipants(Vec<ParticipantUpdate>),
    UpdateControls {
        scene_id: String,
        controls: Vec<ControlUpdate>,
    },
    GetGroups,
    GetScenes,
    GetAllParticipants,
    SetCompression { schemes: Vec<String> },
}

impl ClientMethod {
    /// The method name this request is recorded under.
    pub fn method(&self) -> Method {
        match self {
            ClientMethod::Ready { .. } => Method::Ready,
            ClientMethod::CreateGroups(_) => Method::CreateGroups,
            ClientMethod::UpdateGroups(_) => Method::UpdateGroups,
            ClientMethod::UpdateScenes(_) => Method::UpdateScenes,
            ClientMethod::UpdateParticipants(_) => Method::UpdateParticipants,
            ClientMethod::UpdateControls { .. } => Method::UpdateControls,
            ClientMethod::GetGroups => Method::GetGroups,
            ClientMethod::GetScenes => Method::GetScenes,
            ClientMethod::GetAllParticipants => Method::GetAllParticipants,
            ClientMethod::SetCompression { .. } => Method::SetCompression,
        }
    }

    fn params(&self) -> Value {
        match self {
            ClientMethod::Ready { is_ready } => json!({ "isReady": is_ready }),
            ClientMethod::CreateGroups(groups) => json!({ "groups": groups }),
            ClientMethod::UpdateGroups(groups) => json!({ "groups": groups }),
            ClientMethod::UpdateScenes(scenes) => json!({ "scenes": scenes }),
            ClientMethod::UpdateParticipants(participants) => {
                json!({ "participants": participants })
            }
            ClientMethod::UpdateControls { scene_id, controls } => {
                json!({ "sceneID": scene_id, "controls": controls })
            }
            ClientMethod::GetGroups | ClientMethod::GetScenes | ClientMethod::GetAllParticipants => {
                json!({})
            }
            ClientMethod::SetCompression { schemes } => json!({ "scheme": schemes }),
        }
    }
}

/// Encode `method` as a request envelope with the given id.
pub fn encode_request(id: u64, method: &ClientMethod) -> String {
    json!({
        "type": "method",
        "id": id,
        "method": method.method().as_str(),
        "params": method.params(),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_ready_envelope() {
        let frame = parse(&encode_request(7, &ClientMethod::Ready { is_ready: true }));
        assert_eq!(
            frame,
            json!({"type": "method", "id": 7, "method": "ready", "params": {"isReady": true}})
        );
    }

    #[test]
    fn test_fetch_requests_have_empty_params() {
        for (method, name) in [
            (ClientMethod::GetGroups, "getGroups"),
            (ClientMethod::GetScenes, "getScenes"),
            (ClientMethod::GetAllParticipants, "getAllParticipants"),
        ] {
            let frame = parse(&encode_request(1, &method));
            assert_eq!(frame["method"], name);
            assert_eq!(frame["params"], json!({}));
        }
    }

    #[test]
    fn test_update_controls_sends_only_set_properties() {
        let mut update = ControlUpdate::new("jump", "c1");
        update.cooldown = Some(1_700_000_005_000);
        let frame = parse(&encode_request(
            3,
            &ClientMethod::UpdateControls {
                scene_id: "lobby".to_string(),
                controls: vec![update],
            },
        ));
        assert_eq!(
            frame["params"],
            json!({
                "sceneID": "lobby",
                "controls": [{"controlID": "jump", "etag": "c1", "cooldown": 1_700_000_005_000u64}]
            })
        );
    }

    #[test]
    fn test_update_groups_carries_etag() {
        let frame = parse(&encode_request(
            9,
            &ClientMethod::UpdateGroups(vec![GroupUpdate {
                group_id: "default".to_string(),
                scene_id: "boss".to_string(),
                etag: "g7".to_string(),
            }]),
        ));
        assert_eq!(
            frame["params"]["groups"][0],
            json!({"groupID": "default", "sceneID": "boss", "etag": "g7"})
        );
    }

    #[test]
    fn test_update_participants_shape() {
        let frame = parse(&encode_request(
            2,
            &ClientMethod::UpdateParticipants(vec![ParticipantUpdate {
                session_id: "s-1".to_string(),
                etag: "p4".to_string(),
                group_id: "red".to_string(),
            }]),
        ));
        assert_eq!(
            frame["params"]["participants"][0],
            json!({"sessionID": "s-1", "etag": "p4", "groupID": "red"})
        );
    }

    #[test]
    fn test_set_compression_scheme_list() {
        let frame = parse(&encode_request(
            4,
            &ClientMethod::SetCompression {
                schemes: vec!["gzip".to_string()],
            },
        ));
        assert_eq!(frame["method"], "setCompression");
        assert_eq!(frame["params"], json!({"scheme": ["gzip"]}));
    }

    #[test]
    fn test_method_names() {
        assert_eq!(Method::CreateGroups.to_string(), "createGroups");
        assert_eq!(
            ClientMethod::CreateGroups(Vec::new()).method(),
            Method::CreateGroups
        );
    }
}
