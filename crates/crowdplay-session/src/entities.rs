//! Server-synchronized entities.
//!
//! Each entity carries the concurrency token (`etag`) the service returned
//! with it; update requests send it back so the service can reject stale
//! writes.

use crowdplay_protocol::{
    ControlRecord, DEFAULT_GROUP_ID, DEFAULT_SCENE_ID, GroupRecord, ParticipantRecord, SceneRecord,
};

/// Lifecycle of a participant as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticipantState {
    Joined,
    /// Connected, but the service is ignoring their input.
    InputDisabled,
    Left,
}

/// An audience member.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub user_id: u32,
    /// Connection-scoped id; input frames reference participants by it.
    pub session_id: String,
    pub username: String,
    pub level: u32,
    /// Group membership by id. Looked up in the cache, never owned.
    pub group_id: String,
    /// Epoch milliseconds.
    pub connected_at: Option<u64>,
    /// Epoch milliseconds of the last input seen from this participant.
    pub last_input_at: Option<u64>,
    pub etag: String,
    pub state: ParticipantState,
}

impl Participant {
    pub(crate) fn from_record(record: &ParticipantRecord, state: ParticipantState) -> Self {
        Self {
            user_id: record.user_id,
            session_id: record.session_id.clone(),
            username: record.username.clone(),
            level: record.level,
            group_id: record.group_id.clone(),
            connected_at: record.connected_at,
            last_input_at: record.last_input_at,
            etag: record.etag.clone(),
            state,
        }
    }

    /// Overwrite server-owned fields; timestamps only move when the record has one.
    pub(crate) fn apply_record(&mut self, record: &ParticipantRecord, state: ParticipantState) {
        self.session_id.clone_from(&record.session_id);
        self.username.clone_from(&record.username);
        self.level = record.level;
        self.group_id.clone_from(&record.group_id);
        self.connected_at = record.connected_at.or(self.connected_at);
        self.last_input_at = record.last_input_at.or(self.last_input_at);
        self.etag.clone_from(&record.etag);
        self.state = state;
    }

    /// Stand-in returned for unknown user ids.
    pub fn placeholder(user_id: u32) -> Self {
        Self {
            user_id,
            session_id: String::new(),
            username: String::new(),
            level: 0,
            group_id: DEFAULT_GROUP_ID.to_string(),
            connected_at: None,
            last_input_at: None,
            etag: String::new(),
            state: ParticipantState::Left,
        }
    }
}

/// An audience segment showing one scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub group_id: String,
    pub scene_id: String,
    pub etag: String,
}

impl Group {
    /// Stand-in returned for unknown group ids; it shows the default scene.
    pub fn placeholder(group_id: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            scene_id: DEFAULT_SCENE_ID.to_string(),
            etag: String::new(),
        }
    }
}

impl From<&GroupRecord> for Group {
    fn from(record: &GroupRecord) -> Self {
        Self {
            group_id: record.group_id.clone(),
            scene_id: record.scene_id.clone(),
            etag: record.etag.clone(),
        }
    }
}

/// A collection of controls, in the order the service listed them.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub scene_id: String,
    pub etag: String,
    pub control_ids: Vec<String>,
}

impl Scene {
    /// Stand-in returned for unknown scene ids.
    pub fn placeholder(scene_id: &str) -> Self {
        Self {
            scene_id: scene_id.to_string(),
            etag: String::new(),
            control_ids: Vec::new(),
        }
    }

    pub(crate) fn from_record(record: &SceneRecord) -> Self {
        Self {
            scene_id: record.scene_id.clone(),
            etag: record.etag.clone(),
            control_ids: Vec::new(),
        }
    }
}

/// Button or joystick specifics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlKind {
    Button {
        /// Epoch milliseconds until which the button is cooling down.
        cooldown_expires_at: Option<u64>,
    },
    Joystick,
}

/// An interactive element inside a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub control_id: String,
    pub scene_id: String,
    pub disabled: bool,
    pub help_text: String,
    pub etag: String,
    pub kind: ControlKind,
}

impl Control {
    /// Build from a scene entry. Unknown kinds yield `None`.
    pub(crate) fn from_record(scene_id: &str, record: &ControlRecord) -> Option<Self> {
        let kind = match record.kind.as_str() {
            "button" => ControlKind::Button {
                cooldown_expires_at: record.cooldown,
            },
            "joystick" => ControlKind::Joystick,
            _ => return None,
        };
        Some(Self {
            control_id: record.control_id.clone(),
            scene_id: scene_id.to_string(),
            disabled: record.disabled.unwrap_or(false),
            help_text: record.text.clone(),
            etag: record.etag.clone(),
            kind,
        })
    }

    /// Apply a partial update pushed by the service. Absent fields keep their value.
    pub(crate) fn apply_record(&mut self, record: &ControlRecord) {
        if let Some(disabled) = record.disabled {
            self.disabled = disabled;
        }
        if !record.text.is_empty() {
            self.help_text.clone_from(&record.text);
        }
        if !record.etag.is_empty() {
            self.etag.clone_from(&record.etag);
        }
        if let (ControlKind::Button { cooldown_expires_at }, Some(cooldown)) =
            (&mut self.kind, record.cooldown)
        {
            *cooldown_expires_at = Some(cooldown);
        }
    }

    /// Stand-in button for unknown ids: enabled, no cooldown.
    pub fn placeholder_button(control_id: &str) -> Self {
        Self {
            control_id: control_id.to_string(),
            scene_id: DEFAULT_SCENE_ID.to_string(),
            disabled: false,
            help_text: String::new(),
            etag: String::new(),
            kind: ControlKind::Button {
                cooldown_expires_at: None,
            },
        }
    }

    /// Stand-in joystick for unknown ids. It is disabled so hosts ignore it.
    pub fn placeholder_joystick(control_id: &str) -> Self {
        Self {
            control_id: control_id.to_string(),
            scene_id: DEFAULT_SCENE_ID.to_string(),
            disabled: true,
            help_text: String::new(),
            etag: String::new(),
            kind: ControlKind::Joystick,
        }
    }

    pub fn is_button(&self) -> bool {
        matches!(self.kind, ControlKind::Button { .. })
    }

    pub fn is_joystick(&self) -> bool {
        matches!(self.kind, ControlKind::Joystick)
    }

    /// Whether a button cooldown is still running at `now_ms`.
    pub fn is_cooling_down(&self, now_ms: u64) -> bool {
        matches!(
            self.kind,
            ControlKind::Button { cooldown_expires_at: Some(until) } if until > now_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control_record(id: &str, kind: &str) -> ControlRecord {
        ControlRecord {
            control_id: id.to_string(),
            kind: kind.to_string(),
            etag: "c1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_control_kinds() {
        let button = Control::from_record("lobby", &control_record("jump", "button")).unwrap();
        assert!(button.is_button());
        assert_eq!(button.scene_id, "lobby");
        let stick = Control::from_record("lobby", &control_record("aim", "joystick")).unwrap();
        assert!(stick.is_joystick());
        assert!(Control::from_record("lobby", &control_record("slider", "slider")).is_none());
    }

    #[test]
    fn test_cooldown_window() {
        let mut record = control_record("jump", "button");
        record.cooldown = Some(5_000);
        let button = Control::from_record("lobby", &record).unwrap();
        assert!(button.is_cooling_down(4_999));
        assert!(!button.is_cooling_down(5_000));
    }

    #[test]
    fn test_partial_update_keeps_disabled() {
        let mut record = control_record("jump", "button");
        record.disabled = Some(true);
        let mut button = Control::from_record("lobby", &record).unwrap();

        let cooldown_only = ControlRecord {
            control_id: "jump".to_string(),
            cooldown: Some(5_000),
            ..Default::default()
        };
        button.apply_record(&cooldown_only);
        assert!(button.disabled);
        assert!(button.is_cooling_down(4_000));

        record.disabled = Some(false);
        button.apply_record(&record);
        assert!(!button.disabled);
    }

    #[test]
    fn test_placeholders() {
        assert!(Control::placeholder_joystick("x").disabled);
        assert!(!Control::placeholder_button("x").disabled);
        assert_eq!(Group::placeholder("red").scene_id, DEFAULT_SCENE_ID);
        assert_eq!(Participant::placeholder(5).state, ParticipantState::Left);
    }

    #[test]
    fn test_participant_update_keeps_known_timestamps() {
        let mut record = ParticipantRecord {
            user_id: 3,
            session_id: "s".to_string(),
            connected_at: Some(10),
            ..Default::default()
        };
        let mut participant = Participant::from_record(&record, ParticipantState::Joined);
        record.connected_at = None;
        record.etag = "p2".to_string();
        participant.apply_record(&record, ParticipantState::InputDisabled);
        assert_eq!(participant.connected_at, Some(10));
        assert_eq!(participant.etag, "p2");
        assert_eq!(participant.state, ParticipantState::InputDisabled);
    }
}
