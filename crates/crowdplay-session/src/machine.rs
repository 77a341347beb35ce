//! Synchronous session core.
//!
//! [`SessionMachine`] owns the interactivity state, the entity cache, the
//! input aggregator, the outstanding-request table and the event queue. It
//! never performs I/O: every operation returns the encoded frames the caller
//! must hand to the transport. The async shell in [`crate::session`] wraps it
//! in a mutex and never holds that lock across an await.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crowdplay_input::InputAggregator;
use crowdplay_protocol::{
    ClientMethod, ControlUpdate, DEFAULT_GROUP_ID, DEFAULT_SCENE_ID, Frame, GiveInput,
    GroupAssignment, GroupUpdate, GroupsResult, InputKind, Method, ParticipantRecord,
    ParticipantUpdate, ParticipantsResult, SceneUpdate, ScenesResult, ServerMethod, decode_frame,
    encode_request, project,
};
use serde_json::Value;

use crate::cache::EntityCache;
use crate::entities::{ControlKind, Participant, ParticipantState};
use crate::error::SessionError;
use crate::event::{
    ButtonEvent, ErrorEvent, ErrorKind, JoystickEvent, ParticipantStateChange, SessionEvent,
};
use crate::reconnect::ReconnectPolicy;
use crate::requests::OutstandingRequests;
use crate::state::InteractivityState;

/// Wall-clock epoch milliseconds.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn participant_state(record: &ParticipantRecord) -> ParticipantState {
    if record.disabled {
        ParticipantState::InputDisabled
    } else {
        ParticipantState::Joined
    }
}

#[derive(Debug)]
pub(crate) struct SessionMachine {
    state: InteractivityState,
    /// Go interactive as soon as the session reaches `Initialized`.
    pending_interactive: bool,
    short_code: Option<String>,
    groups_loaded: bool,
    scenes_loaded: bool,
    /// The transport reported open and has not closed since.
    connected: bool,
    /// Bumped on every connect attempt; callbacks from older connections are dropped.
    generation: u64,
    pub(crate) connect_pending: bool,
    pub(crate) reconnect_scheduled: bool,
    pub(crate) reconnect: ReconnectPolicy,
    requests: OutstandingRequests,
    cache: EntityCache,
    input: InputAggregator,
    events: Vec<SessionEvent>,
    log_frames: bool,
}

impl SessionMachine {
    pub(crate) fn new(reconnect_interval: Duration, log_frames: bool) -> Self {
        Self {
            state: InteractivityState::NotInitialized,
            pending_interactive: false,
            short_code: None,
            groups_loaded: false,
            scenes_loaded: false,
            connected: false,
            generation: 0,
            connect_pending: false,
            reconnect_scheduled: false,
            reconnect: ReconnectPolicy::fixed(reconnect_interval),
            requests: OutstandingRequests::new(),
            cache: EntityCache::new(),
            input: InputAggregator::new(),
            events: Vec::new(),
            log_frames,
        }
    }

    /// Back to `NotInitialized` with everything forgotten. Queued events survive
    /// so the host still sees the final state change.
    pub(crate) fn reset(&mut self) {
        self.set_state(InteractivityState::NotInitialized);
        self.pending_interactive = false;
        self.short_code = None;
        self.groups_loaded = false;
        self.scenes_loaded = false;
        self.connected = false;
        self.generation += 1;
        self.connect_pending = false;
        self.reconnect_scheduled = false;
        self.reconnect.reset();
        self.requests.reset();
        self.cache.clear();
        self.input.clear();
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub(crate) fn state(&self) -> InteractivityState {
        self.state
    }

    pub(crate) fn short_code(&self) -> Option<&str> {
        self.short_code.as_deref()
    }

    pub(crate) fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub(crate) fn input(&self) -> &InputAggregator {
        &self.input
    }

    pub(crate) fn requests(&self) -> &OutstandingRequests {
        &self.requests
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(test)]
    pub(crate) fn pending_interactive(&self) -> bool {
        self.pending_interactive
    }

    // -----------------------------------------------------------------------
    // State and events
    // -----------------------------------------------------------------------

    pub(crate) fn set_state(&mut self, state: InteractivityState) {
        if self.state == state {
            return;
        }
        tracing::info!(from = %self.state, to = %state, "interactivity state changed");
        self.state = state;
        self.events.push(SessionEvent::InteractivityStateChanged(state));
    }

    pub(crate) fn push_error(&mut self, kind: ErrorKind, message: impl Into<String>) {
        let event = ErrorEvent::new(kind, message);
        tracing::warn!(kind = ?event.kind, code = event.code, "{}", event.message);
        self.events.push(SessionEvent::Error(event));
    }

    pub(crate) fn set_pending_interactive(&mut self, pending: bool) {
        self.pending_interactive = pending;
    }

    pub(crate) fn set_short_code(&mut self, code: Option<String>) {
        if let Some(code) = &code {
            tracing::info!(code = %code, "short code issued");
        }
        self.short_code = code;
    }

    /// Start of a host frame: rotate the input counters and hand over every
    /// queued event in arrival order.
    pub(crate) fn begin_frame(&mut self) -> Vec<SessionEvent> {
        self.input.rotate();
        std::mem::take(&mut self.events)
    }

    fn request(&mut self, method: ClientMethod) -> String {
        let id = self.requests.register(method.method());
        let frame = encode_request(id, &method);
        if self.log_frames {
            tracing::trace!(request_id = id, frame = %frame, "send");
        } else {
            tracing::debug!(request_id = id, method = %method.method(), "send");
        }
        frame
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Claim the single connect slot. Returns the generation the new
    /// connection's callbacks must carry, or `None` if a connect is already
    /// running or the session is not initialized.
    pub(crate) fn begin_connect(&mut self) -> Option<u64> {
        if self.connect_pending || self.state == InteractivityState::NotInitialized {
            return None;
        }
        self.connect_pending = true;
        self.generation += 1;
        Some(self.generation)
    }

    /// Connect attempt finished, successfully or not.
    pub(crate) fn end_connect(&mut self) {
        self.connect_pending = false;
    }

    /// Claim the single reconnect slot and return the delay to wait.
    pub(crate) fn begin_reconnect(&mut self) -> Option<Duration> {
        if self.reconnect_scheduled || self.state == InteractivityState::NotInitialized {
            return None;
        }
        self.reconnect_scheduled = true;
        Some(self.reconnect.next_delay())
    }

    /// Socket opened: fetch the groups, scenes and participant roster.
    pub(crate) fn on_open(&mut self) -> Vec<String> {
        if self.state == InteractivityState::NotInitialized {
            return Vec::new();
        }
        tracing::info!("connected");
        self.connected = true;
        self.connect_pending = false;
        self.reconnect_scheduled = false;
        self.groups_loaded = false;
        self.scenes_loaded = false;
        self.reconnect.reset();
        vec![
            self.request(ClientMethod::GetGroups),
            self.request(ClientMethod::GetScenes),
            self.request(ClientMethod::GetAllParticipants),
        ]
    }

    /// Socket closed. Returns whether a reconnect should be scheduled.
    pub(crate) fn on_close(&mut self, reason: Option<&str>) -> bool {
        if self.state == InteractivityState::NotInitialized {
            return false;
        }
        self.connected = false;
        if matches!(
            self.state,
            InteractivityState::InteractivityPending | InteractivityState::InteractivityEnabled
        ) {
            self.pending_interactive = true;
        }
        if self.state.is_connected() {
            self.set_state(InteractivityState::InteractivityDisabled);
        }
        let message = match reason {
            Some(reason) if !reason.is_empty() => format!("connection closed: {reason}"),
            _ => "connection closed".to_string(),
        };
        self.push_error(ErrorKind::Transport, message);
        true
    }

    fn check_initialized(&mut self) -> Vec<String> {
        if !(self.groups_loaded && self.scenes_loaded) {
            return Vec::new();
        }
        if !matches!(
            self.state,
            InteractivityState::Initializing | InteractivityState::InteractivityDisabled
        ) {
            return Vec::new();
        }
        self.set_state(InteractivityState::Initialized);
        if !self.pending_interactive {
            return Vec::new();
        }
        self.pending_interactive = false;
        let frame = self.request(ClientMethod::Ready { is_ready: true });
        self.set_state(InteractivityState::InteractivityPending);
        vec![frame]
    }

    // -----------------------------------------------------------------------
    // Inbound frames
    // -----------------------------------------------------------------------

    /// Decode and apply one text frame; returns frames to send in response.
    pub(crate) fn handle_frame(&mut self, text: &str, now_ms: u64) -> Vec<String> {
        if self.state == InteractivityState::NotInitialized {
            return Vec::new();
        }
        if self.log_frames {
            tracing::trace!(frame = %text, "recv");
        }
        let frame = match decode_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                self.push_error(ErrorKind::Protocol, format!("malformed frame: {e}"));
                return Vec::new();
            }
        };
        match frame {
            Frame::Method { method, params, .. } => {
                match ServerMethod::from_frame(&method, &params) {
                    Ok(parsed) => self.handle_method(parsed, now_ms),
                    Err(e) => {
                        self.push_error(ErrorKind::Protocol, e.to_string());
                        Vec::new()
                    }
                }
            }
            Frame::Reply { id, result, error } => self.handle_reply(id, &result, error),
            Frame::Other { kind } => {
                tracing::debug!(kind = %kind, "ignoring frame of unknown type");
                Vec::new()
            }
        }
    }

    fn handle_method(&mut self, method: ServerMethod, now_ms: u64) -> Vec<String> {
        match method {
            ServerMethod::ParticipantJoin(records) => {
                for record in &records {
                    let (participant, _) =
                        self.cache.upsert_participant(record, participant_state(record));
                    self.participant_changed(participant);
                }
            }
            ServerMethod::ParticipantLeave(records) => {
                for record in &records {
                    match self.cache.mark_left(record) {
                        Some(participant) => self.participant_changed(participant),
                        None => tracing::debug!(
                            user_id = record.user_id,
                            "leave for unknown participant"
                        ),
                    }
                }
            }
            ServerMethod::ParticipantUpdate(records) => {
                for record in &records {
                    self.apply_participant_update(record);
                }
            }
            ServerMethod::GiveInput(input) => self.give_input(input, now_ms),
            ServerMethod::Ready(is_ready) => self.on_ready(is_ready),
            ServerMethod::GroupCreate(records) | ServerMethod::GroupUpdate(records) => {
                for record in &records {
                    self.cache.upsert_group(record);
                }
            }
            ServerMethod::SceneCreate(records) | ServerMethod::SceneUpdate(records) => {
                for record in &records {
                    self.cache.upsert_scene(record);
                }
            }
            ServerMethod::ControlUpdate { scene_id, controls } => {
                self.cache.update_controls(&scene_id, &controls);
            }
            ServerMethod::Unsupported(name) => {
                tracing::debug!(method = %name, "ignoring unsupported method");
            }
        }
        Vec::new()
    }

    fn participant_changed(&mut self, participant: Participant) {
        let state = participant.state;
        tracing::debug!(user_id = participant.user_id, ?state, "participant state changed");
        self.events
            .push(SessionEvent::ParticipantStateChanged(ParticipantStateChange {
                participant,
                state,
            }));
    }

    /// Update a participant in place; emits an event only when their state moved.
    fn apply_participant_update(&mut self, record: &ParticipantRecord) {
        let (participant, previous) =
            self.cache.upsert_participant(record, participant_state(record));
        if previous != Some(participant.state) {
            self.participant_changed(participant);
        }
    }

    fn on_ready(&mut self, is_ready: bool) {
        if is_ready {
            self.pending_interactive = false;
            self.set_state(InteractivityState::InteractivityEnabled);
        } else if matches!(
            self.state,
            InteractivityState::InteractivityPending | InteractivityState::InteractivityEnabled
        ) {
            self.set_state(InteractivityState::InteractivityDisabled);
        }
    }

    fn give_input(&mut self, input: GiveInput, now_ms: u64) {
        let participant = match self.cache.participant_by_session_mut(&input.participant_session) {
            Some(participant) => {
                participant.last_input_at = Some(now_ms);
                Some(participant.clone())
            }
            None => {
                tracing::debug!(
                    session_id = %input.participant_session,
                    "input from unknown participant"
                );
                None
            }
        };
        let user_id = participant.as_ref().map(|p| p.user_id);

        for record in input.inputs {
            match record.kind() {
                Some(kind @ (InputKind::Press | InputKind::Release)) => {
                    let is_pressed = kind == InputKind::Press;
                    self.input
                        .apply_button(user_id, &record.control_id, is_pressed);
                    self.events.push(SessionEvent::Button(ButtonEvent {
                        control_id: record.control_id,
                        participant: participant.clone(),
                        is_pressed,
                    }));
                }
                Some(InputKind::Move) => {
                    // Up is positive for the host.
                    let y = -record.y;
                    self.input.apply_move(user_id, &record.control_id, record.x, y);
                    self.events.push(SessionEvent::Joystick(JoystickEvent {
                        control_id: record.control_id,
                        participant: participant.clone(),
                        x: record.x,
                        y,
                    }));
                }
                None => tracing::debug!(event = %record.event, "ignoring unknown input event"),
            }
        }
    }

    fn handle_reply(&mut self, id: u64, result: &Value, error: Option<Value>) -> Vec<String> {
        let Some(method) = self.requests.resolve(id) else {
            tracing::debug!(request_id = id, "reply for unknown request");
            return Vec::new();
        };
        if let Some(error) = error {
            tracing::warn!(request_id = id, %method, %error, "request rejected");
            return Vec::new();
        }
        if let Err(e) = self.apply_reply(method, result) {
            self.push_error(ErrorKind::Protocol, e.to_string());
            return Vec::new();
        }
        match method {
            Method::GetGroups | Method::GetScenes => self.check_initialized(),
            _ => Vec::new(),
        }
    }

    fn apply_reply(
        &mut self,
        method: Method,
        result: &Value,
    ) -> Result<(), crowdplay_protocol::CodecError> {
        let name = method.as_str();
        match method {
            Method::GetGroups => {
                let groups: GroupsResult = project(name, result)?;
                for record in &groups.groups {
                    self.cache.upsert_group(record);
                }
                self.groups_loaded = true;
            }
            Method::CreateGroups | Method::UpdateGroups => {
                let groups: GroupsResult = project(name, result)?;
                for record in &groups.groups {
                    self.cache.upsert_group(record);
                }
            }
            Method::GetScenes => {
                let scenes: ScenesResult = project(name, result)?;
                self.cache.replace_scenes(&scenes.scenes);
                self.scenes_loaded = true;
            }
            Method::UpdateScenes => {
                let scenes: ScenesResult = project(name, result)?;
                for record in &scenes.scenes {
                    self.cache.upsert_scene(record);
                }
            }
            Method::GetAllParticipants => {
                let roster: ParticipantsResult = project(name, result)?;
                for record in &roster.participants {
                    let (participant, previous) =
                        self.cache.upsert_participant(record, participant_state(record));
                    if matches!(previous, None | Some(ParticipantState::Left)) {
                        self.participant_changed(participant);
                    }
                }
            }
            Method::UpdateParticipants => {
                let participants: ParticipantsResult = project(name, result)?;
                for record in &participants.participants {
                    self.apply_participant_update(record);
                }
            }
            Method::Ready | Method::UpdateControls | Method::SetCompression => {
                tracing::trace!(%method, "acknowledged");
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Host operations
    // -----------------------------------------------------------------------

    fn require(
        &self,
        operation: &'static str,
        allowed: impl Fn(InteractivityState) -> bool,
    ) -> Result<(), SessionError> {
        if self.state == InteractivityState::NotInitialized {
            return Err(SessionError::NotInitialized(operation));
        }
        if !allowed(self.state) {
            return Err(SessionError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Server operations need a session that is initialized or was before a drop.
    fn require_synced(&self, operation: &'static str) -> Result<(), SessionError> {
        self.require(operation, |state| {
            state.is_connected() || state == InteractivityState::InteractivityDisabled
        })
    }

    /// Returns `Ok(None)` when nothing needs to be sent yet.
    pub(crate) fn start_interactive(&mut self) -> Result<Option<String>, SessionError> {
        self.require("start_interactive", |_| true)?;
        match self.state {
            InteractivityState::InteractivityEnabled | InteractivityState::InteractivityPending => {
                Ok(None)
            }
            InteractivityState::Initialized => Ok(Some(self.go_ready())),
            InteractivityState::InteractivityDisabled if self.connected => Ok(Some(self.go_ready())),
            _ => {
                tracing::debug!(state = %self.state, "deferring interactivity until initialized");
                self.pending_interactive = true;
                Ok(None)
            }
        }
    }

    fn go_ready(&mut self) -> String {
        self.pending_interactive = false;
        let frame = self.request(ClientMethod::Ready { is_ready: true });
        self.set_state(InteractivityState::InteractivityPending);
        frame
    }

    pub(crate) fn stop_interactive(&mut self) -> Option<String> {
        self.pending_interactive = false;
        if !self.connected
            || matches!(
                self.state,
                InteractivityState::NotInitialized | InteractivityState::InteractivityDisabled
            )
        {
            return None;
        }
        let frame = self.request(ClientMethod::Ready { is_ready: false });
        self.set_state(InteractivityState::InteractivityDisabled);
        Some(frame)
    }

    pub(crate) fn create_group(
        &mut self,
        group_id: &str,
        scene_id: &str,
    ) -> Result<String, SessionError> {
        self.require("create_group", |state| {
            matches!(
                state,
                InteractivityState::Initialized | InteractivityState::InteractivityEnabled
            )
        })?;
        Ok(self.request(ClientMethod::CreateGroups(vec![GroupAssignment {
            group_id: group_id.to_string(),
            scene_id: scene_id.to_string(),
        }])))
    }

    pub(crate) fn set_group_scene(
        &mut self,
        group_id: &str,
        scene_id: &str,
    ) -> Result<String, SessionError> {
        self.require_synced("set_group_scene")?;
        let etag = self
            .cache
            .group(group_id)
            .map(|g| g.etag.clone())
            .unwrap_or_default();
        Ok(self.request(ClientMethod::UpdateGroups(vec![GroupUpdate {
            group_id: group_id.to_string(),
            scene_id: scene_id.to_string(),
            etag,
        }])))
    }

    /// Scene shown to the default group.
    pub(crate) fn current_scene(&self) -> String {
        self.cache
            .group(DEFAULT_GROUP_ID)
            .map_or_else(|| DEFAULT_SCENE_ID.to_string(), |g| g.scene_id.clone())
    }

    pub(crate) fn set_participant_group(
        &mut self,
        user_id: u32,
        group_id: &str,
    ) -> Result<String, SessionError> {
        self.require_synced("set_participant_group")?;
        let participant = self
            .cache
            .participant(user_id)
            .ok_or(SessionError::UnknownParticipant(user_id))?;
        let update = ParticipantUpdate {
            session_id: participant.session_id.clone(),
            etag: participant.etag.clone(),
            group_id: group_id.to_string(),
        };
        Ok(self.request(ClientMethod::UpdateParticipants(vec![update])))
    }

    pub(crate) fn update_scene(&mut self, scene_id: &str) -> Result<String, SessionError> {
        self.require_synced("update_scene")?;
        let scene = self
            .cache
            .scene(scene_id)
            .ok_or_else(|| SessionError::UnknownScene(scene_id.to_string()))?;
        let update = SceneUpdate {
            scene_id: scene.scene_id.clone(),
            etag: scene.etag.clone(),
        };
        Ok(self.request(ClientMethod::UpdateScenes(vec![update])))
    }

    fn control_update(
        &mut self,
        control_id: &str,
        build: impl FnOnce(&mut ControlUpdate),
    ) -> Result<String, SessionError> {
        let control = self
            .cache
            .control(control_id)
            .ok_or_else(|| SessionError::UnknownControl(control_id.to_string()))?;
        let mut update = ControlUpdate::new(&control.control_id, &control.etag);
        let scene_id = control.scene_id.clone();
        build(&mut update);
        Ok(self.request(ClientMethod::UpdateControls {
            scene_id,
            controls: vec![update],
        }))
    }

    pub(crate) fn set_control_disabled(
        &mut self,
        control_id: &str,
        disabled: bool,
    ) -> Result<String, SessionError> {
        self.require_synced("set_control_disabled")?;
        let frame = self.control_update(control_id, |u| u.disabled = Some(disabled))?;
        if let Some(control) = self.cache.control_mut(control_id) {
            control.disabled = disabled;
        }
        Ok(frame)
    }

    pub(crate) fn trigger_cooldown(
        &mut self,
        control_id: &str,
        cooldown: Duration,
        now_ms: u64,
    ) -> Result<String, SessionError> {
        self.require("trigger_cooldown", |state| {
            state == InteractivityState::InteractivityEnabled
        })?;
        self.require_button(control_id)?;
        let millis = u64::try_from(cooldown.as_millis()).unwrap_or(u64::MAX);
        let until = now_ms.saturating_add(millis);
        let frame = self.control_update(control_id, |u| u.cooldown = Some(until))?;
        if let Some(control) = self.cache.control_mut(control_id)
            && let ControlKind::Button {
                cooldown_expires_at,
            } = &mut control.kind
        {
            *cooldown_expires_at = Some(until);
        }
        Ok(frame)
    }

    pub(crate) fn set_control_progress(
        &mut self,
        control_id: &str,
        progress: f32,
    ) -> Result<String, SessionError> {
        self.require_synced("set_control_progress")?;
        self.require_button(control_id)?;
        self.control_update(control_id, |u| u.progress = Some(progress.clamp(0.0, 1.0)))
    }

    pub(crate) fn set_joystick_coordinates(
        &mut self,
        control_id: &str,
        x: f64,
        y: f64,
    ) -> Result<String, SessionError> {
        self.require_synced("set_joystick_coordinates")?;
        let control = self
            .cache
            .control(control_id)
            .ok_or_else(|| SessionError::UnknownControl(control_id.to_string()))?;
        if !control.is_joystick() {
            return Err(SessionError::NotAJoystick(control_id.to_string()));
        }
        self.control_update(control_id, |u| {
            u.x = Some(x);
            u.y = Some(y);
        })
    }

    fn require_button(&self, control_id: &str) -> Result<(), SessionError> {
        let control = self
            .cache
            .control(control_id)
            .ok_or_else(|| SessionError::UnknownControl(control_id.to_string()))?;
        if control.is_button() {
            Ok(())
        } else {
            Err(SessionError::NotAButton(control_id.to_string()))
        }
    }

    pub(crate) fn request_compression(&mut self, schemes: &[&str]) -> Result<String, SessionError> {
        self.require_synced("request_compression")?;
        Ok(self.request(ClientMethod::SetCompression {
            schemes: schemes.iter().map(|s| (*s).to_string()).collect(),
        }))
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
