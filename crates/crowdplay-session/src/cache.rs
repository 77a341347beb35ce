//! In-memory mirror of the service's participants, groups, scenes and controls.
//!
//! Collections are small (dozens to low hundreds of entries), so lookups are
//! linear scans. Lookups return `Option`; the placeholder-on-miss behaviour
//! lives in [`crate::Session`]'s accessors.

use crowdplay_protocol::{ControlRecord, GroupRecord, ParticipantRecord, SceneRecord};

use crate::entities::{Control, Group, Participant, ParticipantState, Scene};

/// Authoritative, server-synchronized entity collections.
#[derive(Debug, Default, Clone)]
pub struct EntityCache {
    participants: Vec<Participant>,
    groups: Vec<Group>,
    scenes: Vec<Scene>,
    controls: Vec<Control>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // -----------------------------------------------------------------------
    // Participants
    // -----------------------------------------------------------------------

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, user_id: u32) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn participant_by_session(&self, session_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.session_id == session_id)
    }

    pub(crate) fn participant_by_session_mut(&mut self, session_id: &str) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.session_id == session_id)
    }

    /// Insert or update by user id. Returns the stored participant and the
    /// state it had before, if it was already known.
    pub(crate) fn upsert_participant(
        &mut self,
        record: &ParticipantRecord,
        state: ParticipantState,
    ) -> (Participant, Option<ParticipantState>) {
        match self
            .participants
            .iter_mut()
            .find(|p| p.user_id == record.user_id)
        {
            Some(existing) => {
                let previous = existing.state;
                existing.apply_record(record, state);
                (existing.clone(), Some(previous))
            }
            None => {
                let participant = Participant::from_record(record, state);
                self.participants.push(participant.clone());
                (participant, None)
            }
        }
    }

    /// Mark the participant a leave record refers to as `Left`. Participants
    /// are never purged. Unknown ids return `None`.
    pub(crate) fn mark_left(&mut self, record: &ParticipantRecord) -> Option<Participant> {
        let participant = self.participants.iter_mut().find(|p| {
            (!record.session_id.is_empty() && p.session_id == record.session_id)
                || (record.user_id != 0 && p.user_id == record.user_id)
        })?;
        participant.state = ParticipantState::Left;
        Some(participant.clone())
    }

    pub fn participants_in_group(&self, group_id: &str) -> Vec<&Participant> {
        self.participants
            .iter()
            .filter(|p| p.group_id == group_id)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.group_id == group_id)
    }

    pub(crate) fn upsert_group(&mut self, record: &GroupRecord) {
        let group = Group::from(record);
        match self.groups.iter_mut().find(|g| g.group_id == group.group_id) {
            Some(existing) => *existing = group,
            None => self.groups.push(group),
        }
    }

    pub fn groups_for_scene(&self, scene_id: &str) -> Vec<&Group> {
        self.groups.iter().filter(|g| g.scene_id == scene_id).collect()
    }

    // -----------------------------------------------------------------------
    // Scenes and controls
    // -----------------------------------------------------------------------

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene(&self, scene_id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.scene_id == scene_id)
    }

    /// Insert or update a scene. A record that lists controls replaces the
    /// scene's controls; one without controls only refreshes the etag.
    pub(crate) fn upsert_scene(&mut self, record: &SceneRecord) {
        let index = match self.scenes.iter().position(|s| s.scene_id == record.scene_id) {
            Some(index) => {
                self.scenes[index].etag.clone_from(&record.etag);
                if record.controls.is_empty() {
                    return;
                }
                index
            }
            None => {
                self.scenes.push(Scene::from_record(record));
                self.scenes.len() - 1
            }
        };

        self.controls.retain(|c| c.scene_id != record.scene_id);
        let mut control_ids = Vec::with_capacity(record.controls.len());
        for control_record in &record.controls {
            match Control::from_record(&record.scene_id, control_record) {
                Some(control) => {
                    control_ids.push(control.control_id.clone());
                    self.controls.push(control);
                }
                None => tracing::debug!(
                    control_id = %control_record.control_id,
                    kind = %control_record.kind,
                    "skipping control of unsupported kind"
                ),
            }
        }
        self.scenes[index].control_ids = control_ids;
    }

    /// Replace every scene and control with a full fetch.
    pub(crate) fn replace_scenes(&mut self, records: &[SceneRecord]) {
        self.scenes.clear();
        self.controls.clear();
        for record in records {
            self.upsert_scene(record);
        }
    }

    /// Apply a control update push. Unknown controls of a known kind are
    /// appended to their scene.
    pub(crate) fn update_controls(&mut self, scene_id: &str, records: &[ControlRecord]) {
        for record in records {
            if let Some(control) = self.control_mut(&record.control_id) {
                control.apply_record(record);
                continue;
            }
            let Some(control) = Control::from_record(scene_id, record) else {
                continue;
            };
            if let Some(scene) = self.scenes.iter_mut().find(|s| s.scene_id == scene_id) {
                scene.control_ids.push(control.control_id.clone());
            }
            self.controls.push(control);
        }
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn control(&self, control_id: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.control_id == control_id)
    }

    pub(crate) fn control_mut(&mut self, control_id: &str) -> Option<&mut Control> {
        self.controls.iter_mut().find(|c| c.control_id == control_id)
    }

    pub fn button(&self, control_id: &str) -> Option<&Control> {
        self.control(control_id).filter(|c| c.is_button())
    }

    pub fn joystick(&self, control_id: &str) -> Option<&Control> {
        self.control(control_id).filter(|c| c.is_joystick())
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter().filter(|c| c.is_button())
    }

    pub fn joysticks(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter().filter(|c| c.is_joystick())
    }

    /// Controls of a scene in scene order.
    pub fn controls_in_scene(&self, scene_id: &str) -> Vec<&Control> {
        let Some(scene) = self.scene(scene_id) else {
            return Vec::new();
        };
        scene
            .control_ids
            .iter()
            .filter_map(|id| {
                self.controls
                    .iter()
                    .find(|c| &c.control_id == id && c.scene_id == scene_id)
            })
            .collect()
    }

    pub fn buttons_in_scene(&self, scene_id: &str) -> Vec<&Control> {
        let mut controls = self.controls_in_scene(scene_id);
        controls.retain(|c| c.is_button());
        controls
    }

    pub fn joysticks_in_scene(&self, scene_id: &str) -> Vec<&Control> {
        let mut controls = self.controls_in_scene(scene_id);
        controls.retain(|c| c.is_joystick());
        controls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowdplay_protocol::DEFAULT_GROUP_ID;

    fn participant(user_id: u32, session_id: &str) -> ParticipantRecord {
        ParticipantRecord {
            user_id,
            session_id: session_id.to_string(),
            username: format!("user{user_id}"),
            ..Default::default()
        }
    }

    fn control(id: &str, kind: &str) -> ControlRecord {
        ControlRecord {
            control_id: id.to_string(),
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    fn scene(id: &str, controls: Vec<ControlRecord>) -> SceneRecord {
        SceneRecord {
            scene_id: id.to_string(),
            etag: format!("{id}-1"),
            controls,
        }
    }

    #[test]
    fn test_upsert_participant_by_user_id() {
        let mut cache = EntityCache::new();
        let (_, previous) = cache.upsert_participant(&participant(1, "a"), ParticipantState::Joined);
        assert!(previous.is_none());
        let (stored, previous) =
            cache.upsert_participant(&participant(1, "b"), ParticipantState::InputDisabled);
        assert_eq!(previous, Some(ParticipantState::Joined));
        assert_eq!(stored.session_id, "b");
        assert_eq!(cache.participants().len(), 1);
        assert_eq!(cache.participant_by_session("b").unwrap().user_id, 1);
    }

    #[test]
    fn test_mark_left_keeps_entry() {
        let mut cache = EntityCache::new();
        cache.upsert_participant(&participant(1, "a"), ParticipantState::Joined);
        let left = cache.mark_left(&participant(1, "a")).unwrap();
        assert_eq!(left.state, ParticipantState::Left);
        assert_eq!(cache.participants().len(), 1);
    }

    #[test]
    fn test_mark_left_unknown_is_none() {
        let mut cache = EntityCache::new();
        cache.upsert_participant(&participant(1, "a"), ParticipantState::Joined);
        assert!(cache.mark_left(&participant(99, "zz")).is_none());
        assert_eq!(cache.participant(1).unwrap().state, ParticipantState::Joined);
    }

    #[test]
    fn test_participants_in_group() {
        let mut cache = EntityCache::new();
        cache.upsert_participant(&participant(1, "a"), ParticipantState::Joined);
        let mut red = participant(2, "b");
        red.group_id = "red".to_string();
        cache.upsert_participant(&red, ParticipantState::Joined);
        assert_eq!(cache.participants_in_group(DEFAULT_GROUP_ID).len(), 1);
        assert_eq!(cache.participants_in_group("red")[0].user_id, 2);
    }

    #[test]
    fn test_upsert_group_replaces() {
        let mut cache = EntityCache::new();
        let mut record = GroupRecord {
            group_id: "default".to_string(),
            scene_id: "lobby".to_string(),
            etag: "g1".to_string(),
        };
        cache.upsert_group(&record);
        record.scene_id = "boss".to_string();
        record.etag = "g2".to_string();
        cache.upsert_group(&record);
        assert_eq!(cache.groups().len(), 1);
        assert_eq!(cache.group("default").unwrap().scene_id, "boss");
        assert_eq!(cache.groups_for_scene("boss").len(), 1);
    }

    #[test]
    fn test_scene_controls_skip_unknown_kinds() {
        let mut cache = EntityCache::new();
        cache.upsert_scene(&scene(
            "lobby",
            vec![control("jump", "button"), control("slider", "slider"), control("aim", "joystick")],
        ));
        assert_eq!(cache.scene("lobby").unwrap().control_ids, ["jump", "aim"]);
        assert_eq!(cache.buttons().count(), 1);
        assert_eq!(cache.joysticks().count(), 1);
        assert!(cache.button("aim").is_none());
        assert!(cache.joystick("aim").is_some());
    }

    #[test]
    fn test_scene_update_without_controls_keeps_controls() {
        let mut cache = EntityCache::new();
        cache.upsert_scene(&scene("lobby", vec![control("jump", "button")]));
        let mut update = scene("lobby", Vec::new());
        update.etag = "lobby-2".to_string();
        cache.upsert_scene(&update);
        assert_eq!(cache.scene("lobby").unwrap().etag, "lobby-2");
        assert_eq!(cache.controls_in_scene("lobby").len(), 1);
    }

    #[test]
    fn test_replace_scenes_does_not_duplicate() {
        let mut cache = EntityCache::new();
        let scenes = vec![scene("lobby", vec![control("jump", "button")])];
        cache.replace_scenes(&scenes);
        cache.replace_scenes(&scenes);
        assert_eq!(cache.scenes().len(), 1);
        assert_eq!(cache.controls().len(), 1);
    }

    #[test]
    fn test_update_controls_applies_and_appends() {
        let mut cache = EntityCache::new();
        cache.upsert_scene(&scene("lobby", vec![control("jump", "button")]));
        let mut disabled = control("jump", "");
        disabled.disabled = Some(true);
        disabled.etag = "c9".to_string();
        cache.update_controls("lobby", &[disabled, control("fire", "button")]);
        let jump = cache.control("jump").unwrap();
        assert!(jump.disabled);
        assert_eq!(jump.etag, "c9");
        assert!(jump.is_button());
        assert_eq!(cache.scene("lobby").unwrap().control_ids, ["jump", "fire"]);
    }
}
