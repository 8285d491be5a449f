//! Scripted input for the Game Boy.
//!
//! Two layers:
//! 1. `GbButton` - logical button names mapped to joypad bits.
//! 2. `InputQueue` - timed button events applied at frame start.

use std::collections::VecDeque;

use crate::joypad::{Buttons, InputLatch};

/// Logical button on the DMG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GbButton {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl GbButton {
    #[must_use]
    pub const fn mask(self) -> Buttons {
        match self {
            Self::Right => Buttons::RIGHT,
            Self::Left => Buttons::LEFT,
            Self::Up => Buttons::UP,
            Self::Down => Buttons::DOWN,
            Self::A => Buttons::A,
            Self::B => Buttons::B,
            Self::Select => Buttons::SELECT,
            Self::Start => Buttons::START,
        }
    }

    /// Parse a case-insensitive button name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "right" => Some(Self::Right),
            "left" => Some(Self::Left),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "a" => Some(Self::A),
            "b" => Some(Self::B),
            "select" => Some(Self::Select),
            "start" => Some(Self::Start),
            _ => None,
        }
    }
}

/// A timed button event.
#[derive(Debug, Clone)]
pub struct InputEvent {
    /// Frame number at which this event fires.
    pub frame: u64,
    pub button: GbButton,
    /// True = press, false = release.
    pub pressed: bool,
}

/// Timed input queue for scripted button sequences.
///
/// Events are kept sorted by frame and applied to the input latch at the
/// start of each frame.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a raw input event after any events for the same frame.
    pub fn push(&mut self, event: InputEvent) {
        let pos = self
            .events
            .iter()
            .position(|e| e.frame > event.frame)
            .unwrap_or(self.events.len());
        self.events.insert(pos, event);
    }

    /// Enqueue a button press and its release `hold_frames` later.
    pub fn enqueue_button(&mut self, button: GbButton, at_frame: u64, hold_frames: u64) {
        self.push(InputEvent {
            frame: at_frame,
            button,
            pressed: true,
        });
        self.push(InputEvent {
            frame: at_frame + hold_frames,
            button,
            pressed: false,
        });
    }

    /// Apply every event due at or before `frame`.
    pub fn process(&mut self, frame: u64, latch: &InputLatch) {
        while self.events.front().is_some_and(|e| e.frame <= frame) {
            let Some(event) = self.events.pop_front() else {
                break;
            };
            if event.pressed {
                latch.press(event.button.mask());
            } else {
                latch.release(event.button.mask());
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_button_creates_press_and_release() {
        let mut queue = InputQueue::new();
        queue.enqueue_button(GbButton::A, 10, 3);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn process_applies_events() {
        let mut queue = InputQueue::new();
        let latch = InputLatch::new();
        queue.enqueue_button(GbButton::Start, 5, 3);

        queue.process(4, &latch);
        assert!(!latch.get().contains(Buttons::START));

        queue.process(5, &latch);
        assert!(latch.get().contains(Buttons::START));

        queue.process(8, &latch);
        assert!(!latch.get().contains(Buttons::START));
        assert!(queue.is_empty());
    }

    #[test]
    fn events_stay_sorted() {
        let mut queue = InputQueue::new();
        queue.enqueue_button(GbButton::B, 20, 1);
        queue.enqueue_button(GbButton::Up, 2, 1);
        let latch = InputLatch::new();
        queue.process(2, &latch);
        assert_eq!(latch.get(), Buttons::UP);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn button_names() {
        assert_eq!(GbButton::from_name("Start"), Some(GbButton::Start));
        assert_eq!(GbButton::from_name("select"), Some(GbButton::Select));
        assert_eq!(GbButton::from_name("turbo"), None);
    }
}
