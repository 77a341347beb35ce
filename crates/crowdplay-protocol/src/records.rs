//! Typed projections of the entity objects carried in params and results.
//!
//! Every record uses `#[serde(default)]` so absent keys take their default and
//! unknown keys are skipped. Known keys carrying `null` or a value of the wrong
//! type also fall back to the default, and record lists are projected element
//! by element so one malformed entry never takes its siblings with it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Id of the group every participant starts in.
pub const DEFAULT_GROUP_ID: &str = "default";

/// Id of the scene the default group shows.
pub const DEFAULT_SCENE_ID: &str = "default";

/// A participant as reported by join/leave/update pushes and roster replies.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParticipantRecord {
    /// Per-connection session token; `giveInput` identifies participants by it.
    #[serde(rename = "sessionID", deserialize_with = "lenient")]
    pub session_id: String,
    /// Numeric user id.
    #[serde(rename = "userID", deserialize_with = "lenient")]
    pub user_id: u32,
    #[serde(deserialize_with = "lenient")]
    pub username: String,
    #[serde(deserialize_with = "lenient")]
    pub level: u32,
    /// Epoch milliseconds of the last input, if any.
    #[serde(rename = "lastInputAt", deserialize_with = "lenient_millis")]
    pub last_input_at: Option<u64>,
    /// Epoch milliseconds of the connection.
    #[serde(rename = "connectedAt", deserialize_with = "lenient_millis")]
    pub connected_at: Option<u64>,
    #[serde(rename = "groupID", deserialize_with = "group_id_or_default")]
    pub group_id: String,
    /// Input from this participant is being ignored by the service.
    #[serde(deserialize_with = "lenient")]
    pub disabled: bool,
    #[serde(deserialize_with = "lenient")]
    pub etag: String,
}

impl Default for ParticipantRecord {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            user_id: 0,
            username: String::new(),
            level: 0,
            last_input_at: None,
            connected_at: None,
            group_id: DEFAULT_GROUP_ID.to_string(),
            disabled: false,
            etag: String::new(),
        }
    }
}

/// A group and the scene it shows.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GroupRecord {
    #[serde(rename = "groupID", deserialize_with = "lenient")]
    pub group_id: String,
    #[serde(rename = "sceneID", deserialize_with = "scene_id_or_default")]
    pub scene_id: String,
    #[serde(deserialize_with = "lenient")]
    pub etag: String,
}

impl Default for GroupRecord {
    fn default() -> Self {
        Self {
            group_id: String::new(),
            scene_id: DEFAULT_SCENE_ID.to_string(),
            etag: String::new(),
        }
    }
}

/// A scene with its controls in wire order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneRecord {
    #[serde(rename = "sceneID", deserialize_with = "lenient")]
    pub scene_id: String,
    #[serde(deserialize_with = "lenient")]
    pub etag: String,
    #[serde(deserialize_with = "lenient_list")]
    pub controls: Vec<ControlRecord>,
}

/// A control inside a scene. `kind` is kept as text; unknown kinds are skipped by the cache.
///
/// Update pushes carry only the fields that changed, so `disabled` stays
/// `None` unless the service sent it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControlRecord {
    #[serde(rename = "controlID", deserialize_with = "lenient")]
    pub control_id: String,
    #[serde(deserialize_with = "lenient")]
    pub kind: String,
    #[serde(deserialize_with = "lenient")]
    pub disabled: Option<bool>,
    /// Help text shown to the audience.
    #[serde(deserialize_with = "lenient")]
    pub text: String,
    #[serde(deserialize_with = "lenient")]
    pub etag: String,
    /// Epoch milliseconds until which a button is cooling down.
    #[serde(deserialize_with = "lenient_millis")]
    pub cooldown: Option<u64>,
}

/// One raw input carried by `giveInput`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InputRecord {
    #[serde(rename = "controlID", deserialize_with = "lenient")]
    pub control_id: String,
    /// `mousedown`, `mouseup` or `move`.
    #[serde(deserialize_with = "lenient")]
    pub event: String,
    #[serde(deserialize_with = "lenient")]
    pub x: f64,
    #[serde(deserialize_with = "lenient")]
    pub y: f64,
}

/// What a raw input does to its control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Button went down.
    Press,
    /// Button came up.
    Release,
    /// Joystick moved.
    Move,
}

impl InputRecord {
    /// Classify the event name. Unknown names yield `None`.
    pub fn kind(&self) -> Option<InputKind> {
        match self.event.as_str() {
            "mousedown" => Some(InputKind::Press),
            "mouseup" => Some(InputKind::Release),
            "move" => Some(InputKind::Move),
            _ => None,
        }
    }
}

/// Project each element of an array, skipping the ones that do not fit `T`.
pub(crate) fn collect_records<T: DeserializeOwned>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match T::deserialize(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping malformed record");
                None
            }
        })
        .collect()
}

/// A record list. `null` is empty; anything but an array is rejected.
pub(crate) fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(collect_records(items)),
        other => Err(serde::de::Error::custom(format!(
            "expected an array of records, found {other}"
        ))),
    }
}

/// A scalar field; `null` or a value of the wrong type becomes `T::default()`.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

fn group_id_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().unwrap_or(DEFAULT_GROUP_ID).to_string())
}

fn scene_id_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().unwrap_or(DEFAULT_SCENE_ID).to_string())
}

/// Accept any JSON number as epoch milliseconds; anything else becomes `None`.
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64)))
}
