//! Global and per-participant input tables.

use std::collections::HashMap;

use crate::button::{ButtonCounters, ButtonEdge};
use crate::joystick::JoystickAverage;

/// Which aggregate a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// All participants combined.
    Global,
    /// One participant, by user id.
    Participant(u32),
}

#[derive(Debug, Default)]
struct ControlTable {
    buttons: HashMap<String, ButtonCounters>,
    joysticks: HashMap<String, JoystickAverage>,
}

impl ControlTable {
    fn button(&mut self, control_id: &str) -> &mut ButtonCounters {
        self.buttons.entry(control_id.to_string()).or_default()
    }

    fn joystick(&mut self, control_id: &str) -> &mut JoystickAverage {
        self.joysticks.entry(control_id.to_string()).or_default()
    }

    fn rotate(&mut self) {
        for counters in self.buttons.values_mut() {
            counters.rotate();
        }
    }
}

/// Aggregates raw input into frame-stable button state and joystick averages.
///
/// # Usage
///
/// 1. Feed events with [`apply_button`](Self::apply_button) and
///    [`apply_move`](Self::apply_move) from the network side.
/// 2. Call [`rotate`](Self::rotate) once at the start of each poll.
/// 3. Query with [`button_down`](Self::button_down) and friends; answers stay
///    fixed until the next rotation.
#[derive(Debug, Default)]
pub struct InputAggregator {
    global: ControlTable,
    participants: HashMap<u32, ControlTable>,
}

impl InputAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a press/release event. With no participant only the global
    /// counters change. Returns the edge seen by the global counters.
    pub fn apply_button(
        &mut self,
        participant: Option<u32>,
        control_id: &str,
        is_pressed: bool,
    ) -> ButtonEdge {
        if let Some(user_id) = participant {
            let edge = self
                .participants
                .entry(user_id)
                .or_default()
                .button(control_id)
                .apply(is_pressed);
            tracing::trace!(user_id, control_id, ?edge, "participant button");
        }
        self.global.button(control_id).apply(is_pressed)
    }

    /// Fold a move sample into the joystick averages.
    pub fn apply_move(&mut self, participant: Option<u32>, control_id: &str, x: f64, y: f64) {
        if let Some(user_id) = participant {
            self.participants
                .entry(user_id)
                .or_default()
                .joystick(control_id)
                .add_sample(x, y);
        }
        self.global.joystick(control_id).add_sample(x, y);
    }

    /// Rotate every button counter. Joystick averages are untouched.
    pub fn rotate(&mut self) {
        self.global.rotate();
        for table in self.participants.values_mut() {
            table.rotate();
        }
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.global = ControlTable::default();
        self.participants.clear();
    }

    fn table(&self, scope: Scope) -> Option<&ControlTable> {
        match scope {
            Scope::Global => Some(&self.global),
            Scope::Participant(user_id) => self.participants.get(&user_id),
        }
    }

    fn counters(&self, control_id: &str, scope: Scope) -> Option<&ButtonCounters> {
        self.table(scope)?.buttons.get(control_id)
    }

    /// The button went down during the frame just ended.
    #[must_use]
    pub fn button_down(&self, control_id: &str, scope: Scope) -> bool {
        self.count_of_button_downs(control_id, scope) > 0
    }

    /// The button saw at least one press during the frame just ended.
    #[must_use]
    pub fn button_pressed(&self, control_id: &str, scope: Scope) -> bool {
        self.count_of_button_presses(control_id, scope) > 0
    }

    /// The button was released during the frame just ended.
    #[must_use]
    pub fn button_up(&self, control_id: &str, scope: Scope) -> bool {
        self.count_of_button_ups(control_id, scope) > 0
    }

    #[must_use]
    pub fn count_of_button_downs(&self, control_id: &str, scope: Scope) -> u32 {
        self.counters(control_id, scope).map_or(0, |c| c.down.current)
    }

    #[must_use]
    pub fn count_of_button_presses(&self, control_id: &str, scope: Scope) -> u32 {
        self.counters(control_id, scope).map_or(0, |c| c.pressed.current)
    }

    #[must_use]
    pub fn count_of_button_ups(&self, control_id: &str, scope: Scope) -> u32 {
        self.counters(control_id, scope).map_or(0, |c| c.up.current)
    }

    /// Running average for a joystick, if it has seen any sample in this scope.
    #[must_use]
    pub fn joystick(&self, control_id: &str, scope: Scope) -> Option<JoystickAverage> {
        self.table(scope)?.joysticks.get(control_id).copied()
    }

    /// Averaged X, `0.0` when unknown.
    #[must_use]
    pub fn joystick_x(&self, control_id: &str, scope: Scope) -> f64 {
        self.joystick(control_id, scope).map_or(0.0, |j| j.x)
    }

    /// Averaged Y (up is positive), `0.0` when unknown.
    #[must_use]
    pub fn joystick_y(&self, control_id: &str, scope: Scope) -> f64 {
        self.joystick(control_id, scope).map_or(0.0, |j| j.y)
    }

    /// Controls a participant has produced input on, sorted by id.
    #[must_use]
    pub fn controls_for_participant(&self, user_id: u32) -> Vec<&str> {
        let Some(table) = self.participants.get(&user_id) else {
            return Vec::new();
        };
        let mut ids: Vec<&str> = table
            .buttons
            .keys()
            .chain(table.joysticks.keys())
            .map(String::as_str)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JUMP: &str = "jump";

    /// One host frame: rotate, as `poll` does before dispatching.
    fn frame(input: &mut InputAggregator) {
        input.rotate();
    }

    #[test]
    fn test_nothing_is_set_initially() {
        let input = InputAggregator::new();
        assert!(!input.button_down(JUMP, Scope::Global));
        assert!(!input.button_pressed(JUMP, Scope::Participant(1)));
        assert!(!input.button_up(JUMP, Scope::Global));
        assert!(input.joystick("stick", Scope::Global).is_none());
    }

    #[test]
    fn test_events_invisible_until_rotation() {
        let mut input = InputAggregator::new();
        input.apply_button(Some(1), JUMP, true);
        assert!(!input.button_down(JUMP, Scope::Global));
        frame(&mut input);
        assert!(input.button_down(JUMP, Scope::Global));
        assert!(input.button_down(JUMP, Scope::Participant(1)));
        assert!(input.button_pressed(JUMP, Scope::Participant(1)));
        assert!(!input.button_up(JUMP, Scope::Participant(1)));
    }

    #[test]
    fn test_down_only_on_first_frame_while_held() {
        let mut input = InputAggregator::new();
        input.apply_button(Some(1), JUMP, true);
        frame(&mut input);
        assert!(input.button_down(JUMP, Scope::Participant(1)));

        input.apply_button(Some(1), JUMP, true);
        frame(&mut input);
        assert!(!input.button_down(JUMP, Scope::Participant(1)));
        assert!(input.button_pressed(JUMP, Scope::Participant(1)));

        frame(&mut input);
        assert!(!input.button_down(JUMP, Scope::Participant(1)));
        assert!(!input.button_pressed(JUMP, Scope::Participant(1)));
    }

    #[test]
    fn test_up_only_on_release_frame() {
        let mut input = InputAggregator::new();
        input.apply_button(Some(1), JUMP, true);
        frame(&mut input);
        input.apply_button(Some(1), JUMP, false);
        frame(&mut input);
        assert!(input.button_up(JUMP, Scope::Participant(1)));
        assert!(!input.button_pressed(JUMP, Scope::Participant(1)));
        frame(&mut input);
        assert!(!input.button_up(JUMP, Scope::Participant(1)));
    }

    #[test]
    fn test_rotation_idempotent_without_events() {
        let mut input = InputAggregator::new();
        input.apply_button(Some(1), JUMP, true);
        frame(&mut input);
        frame(&mut input);
        let before = input.count_of_button_presses(JUMP, Scope::Global);
        frame(&mut input);
        assert_eq!(input.count_of_button_presses(JUMP, Scope::Global), before);
        assert_eq!(before, 0);
    }

    #[test]
    fn test_counts_per_frame() {
        let mut input = InputAggregator::new();
        input.apply_button(Some(1), JUMP, true);
        input.apply_button(Some(1), JUMP, false);
        input.apply_button(Some(1), JUMP, true);
        frame(&mut input);
        assert_eq!(input.count_of_button_downs(JUMP, Scope::Participant(1)), 1);
        assert_eq!(input.count_of_button_presses(JUMP, Scope::Participant(1)), 2);
        assert_eq!(input.count_of_button_ups(JUMP, Scope::Participant(1)), 1);
    }

    #[test]
    fn test_global_counters_span_participants() {
        let mut input = InputAggregator::new();
        input.apply_button(Some(1), JUMP, true);
        input.apply_button(Some(2), JUMP, true);
        frame(&mut input);
        assert_eq!(input.count_of_button_presses(JUMP, Scope::Global), 2);
        assert_eq!(input.count_of_button_downs(JUMP, Scope::Global), 1);
        assert_eq!(input.count_of_button_downs(JUMP, Scope::Participant(2)), 1);
    }

    #[test]
    fn test_anonymous_input_is_global_only() {
        let mut input = InputAggregator::new();
        input.apply_button(None, JUMP, true);
        frame(&mut input);
        assert!(input.button_down(JUMP, Scope::Global));
        assert!(input.controls_for_participant(1).is_empty());
    }

    #[test]
    fn test_joystick_scopes() {
        let mut input = InputAggregator::new();
        input.apply_move(Some(1), "stick", 0.0, 0.0);
        input.apply_move(Some(1), "stick", 1.0, 1.0);
        input.apply_move(Some(2), "stick", 1.0, -1.0);
        assert_eq!(input.joystick_x("stick", Scope::Participant(1)), 0.5);
        assert_eq!(input.joystick_y("stick", Scope::Participant(2)), -1.0);
        let global = input.joystick("stick", Scope::Global).unwrap();
        assert_eq!(global.samples, 3);
        assert!((global.x - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_joystick_survives_rotation() {
        let mut input = InputAggregator::new();
        input.apply_move(Some(1), "stick", 1.0, 0.0);
        frame(&mut input);
        frame(&mut input);
        assert_eq!(input.joystick_x("stick", Scope::Global), 1.0);
    }

    #[test]
    fn test_controls_for_participant() {
        let mut input = InputAggregator::new();
        input.apply_move(Some(4), "stick", 0.1, 0.1);
        input.apply_button(Some(4), JUMP, true);
        input.apply_button(Some(4), "fire", true);
        assert_eq!(input.controls_for_participant(4), ["fire", JUMP, "stick"]);
    }

    #[test]
    fn test_clear_forgets_everything() {
        let mut input = InputAggregator::new();
        input.apply_button(Some(1), JUMP, true);
        input.apply_move(Some(1), "stick", 1.0, 1.0);
        frame(&mut input);
        input.clear();
        assert!(!input.button_down(JUMP, Scope::Global));
        assert!(input.joystick("stick", Scope::Participant(1)).is_none());
    }
}
