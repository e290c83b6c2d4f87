//! Input normalization
//!
//! Key events (from the OS listener or the terminal) and button events
//! (mouse clicks on the grid) are reduced to one event type, then routed to
//! note actions through the key layout.

use crate::layout::{KeyLayout, NoteIndex};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default note release timeout in milliseconds.
/// Must be longer than the OS key repeat delay (typically 300-500ms)
pub const DEFAULT_NOTE_RELEASE_MS: u64 = 400;

/// A normalized input event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Key pressed; may carry several symbols for composed input
    KeyDown(String),
    /// Key auto-repeat while held
    KeyRepeat(String),
    /// Key released
    KeyUp(String),
    /// Grid button clicked: releases a held note, presses an idle one
    ButtonClick { row: usize, column: usize },
}

/// What the note controller should do with a note index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteAction {
    Press(NoteIndex),
    Release(NoteIndex),
    Toggle(NoteIndex),
    /// Held key repeated, keep it alive
    Touch(NoteIndex),
}

/// Routes input events to note actions using a key layout
#[derive(Debug, Clone, Default)]
pub struct KeyRouter {
    layout: KeyLayout,
}

impl KeyRouter {
    pub fn new(layout: KeyLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    /// Note actions for an event, in symbol order. Unmapped symbols and
    /// out-of-range buttons produce nothing.
    pub fn route(&self, event: &InputEvent) -> Vec<NoteAction> {
        match event {
            InputEvent::KeyDown(symbols) => self.symbols(symbols).map(NoteAction::Press).collect(),
            InputEvent::KeyRepeat(symbols) => self.symbols(symbols).map(NoteAction::Touch).collect(),
            InputEvent::KeyUp(symbols) => self.symbols(symbols).map(NoteAction::Release).collect(),
            InputEvent::ButtonClick { row, column } => {
                self.button(*row, *column).map(NoteAction::Toggle).into_iter().collect()
            }
        }
    }

    fn symbols<'a>(&'a self, symbols: &'a str) -> impl Iterator<Item = NoteIndex> + 'a {
        symbols
            .chars()
            .flat_map(char::to_lowercase)
            .filter_map(move |c| self.layout.index_for_symbol(c))
    }

    fn button(&self, row: usize, column: usize) -> Option<NoteIndex> {
        match self.layout.note_index(row, column) {
            Ok(index) => Some(index),
            Err(e) => {
                log::warn!("Ignoring button event: {}", e);
                None
            }
        }
    }
}

/// Releases held keys that stopped repeating.
///
/// Used when the terminal cannot report key releases: a held key keeps
/// sending repeats, so a key that has been quiet for longer than the
/// timeout has been let go.
#[derive(Debug, Clone)]
pub struct AutoRelease {
    timeout: Duration,
    held: HashMap<NoteIndex, Instant>,
}

impl AutoRelease {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            held: HashMap::new(),
        }
    }

    /// Start or refresh the timer for a held index
    pub fn touch(&mut self, index: NoteIndex, now: Instant) {
        self.held.insert(index, now);
    }

    /// Stop tracking an index that was released explicitly
    pub fn forget(&mut self, index: NoteIndex) {
        self.held.remove(&index);
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }

    /// Indices whose timer ran out; they are no longer tracked afterwards
    pub fn expired(&mut self, now: Instant) -> Vec<NoteIndex> {
        let timeout = self.timeout;
        let mut expired: Vec<NoteIndex> = self
            .held
            .iter()
            .filter(|(_, &touched)| now.saturating_duration_since(touched) > timeout)
            .map(|(&index, _)| index)
            .collect();
        expired.sort_unstable();

        for index in &expired {
            self.held.remove(index);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_events() {
        let router = KeyRouter::default();

        assert_eq!(
            router.route(&InputEvent::KeyDown("3".to_string())),
            vec![NoteAction::Press(6)]
        );
        assert_eq!(
            router.route(&InputEvent::KeyUp("Q".to_string())),
            vec![NoteAction::Release(2)]
        );
        assert_eq!(
            router.route(&InputEvent::KeyRepeat("a".to_string())),
            vec![NoteAction::Touch(4)]
        );
    }

    #[test]
    fn test_multiple_symbols() {
        let router = KeyRouter::default();
        let actions = router.route(&InputEvent::KeyDown("1`w".to_string()));
        assert_eq!(actions, vec![NoteAction::Press(0), NoteAction::Press(5)]);
    }

    #[test]
    fn test_unmapped_symbols_ignored() {
        let router = KeyRouter::default();
        assert!(router.route(&InputEvent::KeyDown("`~ ".to_string())).is_empty());
        assert!(router.route(&InputEvent::KeyUp(String::new())).is_empty());
    }

    #[test]
    fn test_button_events() {
        let router = KeyRouter::default();

        assert_eq!(
            router.route(&InputEvent::ButtonClick { row: 3, column: 1 }),
            vec![NoteAction::Toggle(9)]
        );
        assert_eq!(
            router.route(&InputEvent::ButtonClick { row: 1, column: 0 }),
            vec![NoteAction::Toggle(2)]
        );
        assert!(router.route(&InputEvent::ButtonClick { row: 9, column: 0 }).is_empty());
    }

    #[test]
    fn test_auto_release() {
        let start = Instant::now();
        let mut auto = AutoRelease::new(Duration::from_millis(400));

        auto.touch(3, start);
        auto.touch(7, start);
        auto.touch(1, start);
        auto.forget(1);

        // Key 7 keeps repeating
        auto.touch(7, start + Duration::from_millis(300));

        let expired = auto.expired(start + Duration::from_millis(500));
        assert_eq!(expired, vec![3]);

        // Already expired indices are not reported twice
        assert!(auto.expired(start + Duration::from_millis(600)).is_empty());
        assert_eq!(auto.expired(start + Duration::from_millis(800)), vec![7]);
    }
}
