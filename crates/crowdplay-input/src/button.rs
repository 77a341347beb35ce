//! Triple-buffered button counters with edge detection.

/// One counter with `previous`, `current` and `next` generations.
///
/// Writers only touch `next`; readers only look at `current`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterBuffer {
    pub previous: u32,
    pub current: u32,
    pub next: u32,
}

impl CounterBuffer {
    /// Count one event into the generation that becomes visible next frame.
    pub fn record(&mut self) {
        self.next = self.next.saturating_add(1);
    }

    /// `previous <- current`, `current <- next`, `next <- 0`.
    pub fn rotate(&mut self) {
        self.previous = self.current;
        self.current = self.next;
        self.next = 0;
    }

    /// Whether the frame just ended saw at least one event.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.current > 0
    }
}

/// How a press/release event was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdge {
    /// First press of the frame on a button that was up.
    Down,
    /// Another press while one is already counted or the button is held.
    Repeat,
    /// Release.
    Up,
}

/// Down/pressed/up counters for one button in one scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonCounters {
    pub down: CounterBuffer,
    pub pressed: CounterBuffer,
    pub up: CounterBuffer,
    /// Level state: the last event seen was a press.
    held: bool,
}

impl ButtonCounters {
    /// Apply one press (`true`) or release (`false`) event.
    ///
    /// - Press with nothing counted in `pressed.next` and the button up: down-edge,
    ///   counts `down` and `pressed`.
    /// - Any other press: counts `pressed` only.
    /// - Release: counts `up` only and lets the next press be a down-edge.
    pub fn apply(&mut self, is_pressed: bool) -> ButtonEdge {
        if is_pressed {
            let edge = if self.pressed.next == 0 && !self.held {
                self.down.record();
                ButtonEdge::Down
            } else {
                ButtonEdge::Repeat
            };
            self.pressed.record();
            self.held = true;
            edge
        } else {
            self.up.record();
            self.held = false;
            ButtonEdge::Up
        }
    }

    /// Rotate all three counters.
    pub fn rotate(&mut self) {
        self.down.rotate();
        self.pressed.rotate();
        self.up.rotate();
    }

    /// Whether the last event seen was a press.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_only_touches_next() {
        let mut counter = CounterBuffer::default();
        counter.record();
        counter.record();
        assert_eq!(counter.next, 2);
        assert!(!counter.is_set());
        counter.rotate();
        assert_eq!(counter.current, 2);
        assert_eq!(counter.next, 0);
        assert!(counter.is_set());
        counter.rotate();
        assert_eq!(counter.previous, 2);
        assert_eq!(counter.current, 0);
    }

    #[test]
    fn test_first_press_is_down_edge() {
        let mut button = ButtonCounters::default();
        assert_eq!(button.apply(true), ButtonEdge::Down);
        assert_eq!(button.down.next, 1);
        assert_eq!(button.pressed.next, 1);
        assert_eq!(button.up.next, 0);
    }

    #[test]
    fn test_second_press_in_frame_is_repeat() {
        let mut button = ButtonCounters::default();
        button.apply(true);
        button.apply(false);
        assert_eq!(button.apply(true), ButtonEdge::Repeat);
        assert_eq!(button.down.next, 1);
        assert_eq!(button.pressed.next, 2);
        assert_eq!(button.up.next, 1);
    }

    #[test]
    fn test_press_while_held_is_repeat_next_frame() {
        let mut button = ButtonCounters::default();
        button.apply(true);
        button.rotate();
        assert_eq!(button.apply(true), ButtonEdge::Repeat);
        assert_eq!(button.down.next, 0);
        assert_eq!(button.pressed.next, 1);
    }

    #[test]
    fn test_press_after_release_is_down_again() {
        let mut button = ButtonCounters::default();
        button.apply(true);
        button.rotate();
        assert_eq!(button.apply(false), ButtonEdge::Up);
        button.rotate();
        assert!(!button.is_held());
        assert_eq!(button.apply(true), ButtonEdge::Down);
    }
}
