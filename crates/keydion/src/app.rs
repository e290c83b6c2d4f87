//! Application state
//!
//! `App` is everything the screen shows and every input can change: the
//! note controller, the playback parameters, the key router and the help
//! toggle. The terminal loop feeds it events and redraws from it.

use crate::controller::{NoteController, PlaybackConfig};
use crate::error::TransportError;
use crate::input::{AutoRelease, InputEvent, KeyRouter, NoteAction};
use crate::layout::{KeyLayout, NoteIndex};
use crate::midi::{MidiEvent, MidiTransport};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Instant;

/// User controls that do not play notes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    BaseNoteUp,
    BaseNoteDown,
    ChannelUp,
    ChannelDown,
    VelocityUp,
    VelocityDown,
    AllNotesOff,
    ToggleHelp,
    Quit,
}

impl Control {
    /// Control bound to a terminal key, if any
    pub fn for_key(key: &KeyEvent) -> Option<Self> {
        match key.code {
            KeyCode::Esc => Some(Control::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Control::Quit),
            KeyCode::Up => Some(Control::BaseNoteUp),
            KeyCode::Down => Some(Control::BaseNoteDown),
            KeyCode::Right => Some(Control::ChannelUp),
            KeyCode::Left => Some(Control::ChannelDown),
            KeyCode::PageUp => Some(Control::VelocityUp),
            KeyCode::PageDown => Some(Control::VelocityDown),
            KeyCode::Char(' ') => Some(Control::AllNotesOff),
            KeyCode::Tab => Some(Control::ToggleHelp),
            _ => None,
        }
    }
}

pub struct App<T: MidiTransport> {
    router: KeyRouter,
    controller: NoteController<T>,
    playback: PlaybackConfig,
    auto_release: Option<AutoRelease>,
    show_help: bool,
    should_quit: bool,
}

impl<T: MidiTransport> App<T> {
    pub fn new(layout: KeyLayout, transport: T, playback: PlaybackConfig) -> Self {
        Self {
            router: KeyRouter::new(layout),
            controller: NoteController::new(transport),
            playback,
            auto_release: None,
            show_help: true,
            should_quit: false,
        }
    }

    /// Release held keys after a quiet period (for terminals without key-up events)
    pub fn with_auto_release(mut self, auto_release: AutoRelease) -> Self {
        self.auto_release = Some(auto_release);
        self
    }

    pub fn with_help(mut self, show_help: bool) -> Self {
        self.show_help = show_help;
        self
    }

    /// Record a failure to open the MIDI endpoint in the status line
    pub fn report_transport_error(&mut self, error: &TransportError) {
        self.controller.set_status(format!("Failed to create MIDI source ({})", error));
    }

    /// Apply a key or button event; returns the messages it produced
    pub fn handle_input(&mut self, event: &InputEvent, now: Instant) -> Vec<MidiEvent> {
        let mut events = Vec::new();
        for action in self.router.route(event) {
            match action {
                NoteAction::Press(index) => {
                    if let Some(auto) = self.auto_release.as_mut() {
                        auto.touch(index, now);
                    }
                    events.extend(self.controller.press(index, &self.playback));
                }
                NoteAction::Touch(index) => {
                    if let Some(auto) = self.auto_release.as_mut() {
                        if self.controller.is_active(index) {
                            auto.touch(index, now);
                        }
                    }
                }
                NoteAction::Release(index) => {
                    if let Some(auto) = self.auto_release.as_mut() {
                        auto.forget(index);
                    }
                    events.extend(self.controller.release(index, &self.playback));
                }
                // Clicked buttons stay on until clicked again
                NoteAction::Toggle(index) => {
                    if let Some(auto) = self.auto_release.as_mut() {
                        auto.forget(index);
                    }
                    events.extend(self.controller.toggle(index, &self.playback));
                }
            }
        }
        events
    }

    /// Apply a terminal key event.
    ///
    /// Controls fire on press only. Character keys play notes only when
    /// `terminal_notes` is set, i.e. when no OS listener delivers them.
    pub fn handle_key(&mut self, key: &KeyEvent, terminal_notes: bool, now: Instant) -> Vec<MidiEvent> {
        let symbol = match key.code {
            KeyCode::Char(c) if terminal_notes => Some(c.to_string()),
            _ => None,
        };

        match key.kind {
            KeyEventKind::Press => match Control::for_key(key) {
                Some(control) => self.handle_control(control),
                None => symbol.map_or_else(Vec::new, |s| self.handle_input(&InputEvent::KeyDown(s), now)),
            },
            KeyEventKind::Repeat => {
                symbol.map_or_else(Vec::new, |s| self.handle_input(&InputEvent::KeyRepeat(s), now))
            }
            KeyEventKind::Release => {
                symbol.map_or_else(Vec::new, |s| self.handle_input(&InputEvent::KeyUp(s), now))
            }
        }
    }

    /// Apply a control
    pub fn handle_control(&mut self, control: Control) -> Vec<MidiEvent> {
        match control {
            Control::BaseNoteUp => self.change_playback(|p| p.step_base_note(1)),
            Control::BaseNoteDown => self.change_playback(|p| p.step_base_note(-1)),
            Control::ChannelUp => self.change_playback(|p| p.step_channel(1)),
            Control::ChannelDown => self.change_playback(|p| p.step_channel(-1)),
            Control::VelocityUp => {
                self.playback.step_velocity(1);
                Vec::new()
            }
            Control::VelocityDown => {
                self.playback.step_velocity(-1);
                Vec::new()
            }
            Control::AllNotesOff => self.all_notes_off(),
            Control::ToggleHelp => {
                self.show_help = !self.show_help;
                Vec::new()
            }
            Control::Quit => {
                self.should_quit = true;
                self.all_notes_off()
            }
        }
    }

    /// Release keys whose auto-release timer ran out
    pub fn tick(&mut self, now: Instant) -> Vec<MidiEvent> {
        let expired = match self.auto_release.as_mut() {
            Some(auto) => auto.expired(now),
            None => return Vec::new(),
        };
        expired
            .into_iter()
            .filter_map(|index| self.controller.release(index, &self.playback))
            .collect()
    }

    pub fn all_notes_off(&mut self) -> Vec<MidiEvent> {
        if let Some(auto) = self.auto_release.as_mut() {
            auto.clear();
        }
        self.controller.release_all(&self.playback)
    }

    // Held notes are released first so every note-off matches its note-on.
    fn change_playback(&mut self, change: impl FnOnce(&mut PlaybackConfig)) -> Vec<MidiEvent> {
        let mut next = self.playback;
        change(&mut next);
        if next == self.playback {
            return Vec::new();
        }
        let released = self.all_notes_off();
        self.playback = next;
        released
    }

    pub fn layout(&self) -> &KeyLayout {
        self.router.layout()
    }

    pub fn playback(&self) -> &PlaybackConfig {
        &self.playback
    }

    pub fn controller(&self) -> &NoteController<T> {
        &self.controller
    }

    pub fn is_active(&self, index: NoteIndex) -> bool {
        self.controller.is_active(index)
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Whether the auto-release fallback is in use
    pub fn auto_release_active(&self) -> bool {
        self.auto_release.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::RecordingOutput;
    use std::time::Duration;

    fn app() -> App<RecordingOutput> {
        App::new(KeyLayout::c_griff(), RecordingOutput::default(), PlaybackConfig::default())
    }

    fn key_down(s: &str) -> InputEvent {
        InputEvent::KeyDown(s.to_string())
    }

    fn key_up(s: &str) -> InputEvent {
        InputEvent::KeyUp(s.to_string())
    }

    #[test]
    fn test_key_press_and_release() {
        let mut app = app();
        let now = Instant::now();

        let on = app.handle_input(&key_down("3"), now);
        assert_eq!(on, vec![MidiEvent::note_on(0, 54, 30)]);
        assert!(app.is_active(6));

        // Auto-repeat produces nothing
        assert!(app.handle_input(&key_down("3"), now).is_empty());

        let off = app.handle_input(&key_up("3"), now);
        assert_eq!(off, vec![MidiEvent::note_off(0, 54)]);
        assert_eq!(app.controller().transport().sent.len(), 2);
    }

    #[test]
    fn test_shared_index_between_rows() {
        let mut app = app();
        let now = Instant::now();

        // '3' and 'z' both map to index 6
        app.handle_input(&key_down("3"), now);
        assert!(app.handle_input(&key_down("z"), now).is_empty());
        assert_eq!(app.handle_input(&key_up("z"), now).len(), 1);
        assert!(app.handle_input(&key_up("3"), now).is_empty());
    }

    #[test]
    fn test_button_click_toggles() {
        let mut app = app();
        let now = Instant::now();
        let click = InputEvent::ButtonClick { row: 2, column: 1 };

        assert!(app.handle_input(&click, now)[0].is_note_on());
        assert!(app.is_active(7));
        assert!(app.handle_input(&click, now)[0].is_note_off());
        assert!(!app.is_active(7));
    }

    #[test]
    fn test_all_notes_off() {
        let mut app = app();
        let now = Instant::now();

        app.handle_input(&key_down("1"), now);
        app.handle_input(&key_down("2"), now);
        app.handle_input(&InputEvent::ButtonClick { row: 0, column: 2 }, now);

        let released = app.handle_control(Control::AllNotesOff);
        assert_eq!(released.len(), 3);
        assert!(app.controller().active().is_empty());
    }

    #[test]
    fn test_base_note_change_releases_held_notes() {
        let mut app = app();
        let now = Instant::now();

        app.handle_input(&key_down("1"), now);
        let released = app.handle_control(Control::BaseNoteUp);
        assert_eq!(released, vec![MidiEvent::note_off(0, 48)]);
        assert_eq!(app.playback().base_note, 49);

        let on = app.handle_input(&key_down("1"), now);
        assert_eq!(on, vec![MidiEvent::note_on(0, 49, 30)]);
    }

    #[test]
    fn test_channel_change_at_limit_keeps_notes() {
        let mut app = app();
        let now = Instant::now();

        app.handle_input(&key_down("1"), now);
        assert!(app.handle_control(Control::ChannelDown).is_empty());
        assert!(app.is_active(0));

        app.handle_control(Control::ChannelUp);
        assert_eq!(app.playback().channel, 1);
        assert!(!app.is_active(0));
    }

    #[test]
    fn test_velocity_change_keeps_notes() {
        let mut app = app();
        let now = Instant::now();

        app.handle_input(&key_down("q"), now);
        assert!(app.handle_control(Control::VelocityUp).is_empty());
        assert_eq!(app.playback().velocity, 31);
        assert!(app.is_active(2));
    }

    #[test]
    fn test_help_and_quit() {
        let mut app = app().with_help(false);
        assert!(!app.show_help());
        app.handle_control(Control::ToggleHelp);
        assert!(app.show_help());

        app.handle_input(&key_down("a"), Instant::now());
        let released = app.handle_control(Control::Quit);
        assert!(app.should_quit());
        assert_eq!(released.len(), 1);
    }

    #[test]
    fn test_auto_release() {
        let mut app = app().with_auto_release(AutoRelease::new(Duration::from_millis(400)));
        let start = Instant::now();

        app.handle_input(&key_down("w"), start);
        app.handle_input(&key_down("e"), start);
        app.handle_input(&InputEvent::KeyRepeat("e".to_string()), start + Duration::from_millis(300));

        let released = app.tick(start + Duration::from_millis(500));
        assert_eq!(released, vec![MidiEvent::note_off(0, 53)]);
        assert!(app.is_active(8));
        assert!(!app.is_active(5));
    }

    #[test]
    fn test_clicked_buttons_are_not_auto_released() {
        let mut app = app().with_auto_release(AutoRelease::new(Duration::from_millis(400)));
        let start = Instant::now();

        app.handle_input(&InputEvent::ButtonClick { row: 0, column: 0 }, start);
        assert!(app.tick(start + Duration::from_secs(5)).is_empty());
        assert!(app.is_active(0));
    }

    fn key(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, kind)
    }

    #[test]
    fn test_key_bindings() {
        let press = |code| Control::for_key(&KeyEvent::new(code, KeyModifiers::NONE));
        assert_eq!(press(KeyCode::Esc), Some(Control::Quit));
        assert_eq!(press(KeyCode::Up), Some(Control::BaseNoteUp));
        assert_eq!(press(KeyCode::Down), Some(Control::BaseNoteDown));
        assert_eq!(press(KeyCode::Right), Some(Control::ChannelUp));
        assert_eq!(press(KeyCode::Left), Some(Control::ChannelDown));
        assert_eq!(press(KeyCode::PageUp), Some(Control::VelocityUp));
        assert_eq!(press(KeyCode::PageDown), Some(Control::VelocityDown));
        assert_eq!(press(KeyCode::Char(' ')), Some(Control::AllNotesOff));
        assert_eq!(press(KeyCode::Tab), Some(Control::ToggleHelp));
        assert_eq!(press(KeyCode::Char('c')), None);
        assert_eq!(
            Control::for_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Control::Quit)
        );
    }

    #[test]
    fn test_terminal_keys_play_notes() {
        let mut app = app();
        let now = Instant::now();

        let on = app.handle_key(&key(KeyCode::Char('3'), KeyEventKind::Press), true, now);
        assert_eq!(on, vec![MidiEvent::note_on(0, 54, 30)]);
        assert!(app
            .handle_key(&key(KeyCode::Char('3'), KeyEventKind::Repeat), true, now)
            .is_empty());
        let off = app.handle_key(&key(KeyCode::Char('3'), KeyEventKind::Release), true, now);
        assert_eq!(off, vec![MidiEvent::note_off(0, 54)]);
    }

    #[test]
    fn test_space_releases_instead_of_playing() {
        let mut app = app();
        let now = Instant::now();

        app.handle_key(&key(KeyCode::Char('q'), KeyEventKind::Press), true, now);
        let released = app.handle_key(&key(KeyCode::Char(' '), KeyEventKind::Press), true, now);
        assert_eq!(released, vec![MidiEvent::note_off(0, 50)]);
        assert!(app.controller().active().is_empty());
    }

    #[test]
    fn test_ctrl_c_quits() {
        let mut app = app();
        let now = Instant::now();

        app.handle_key(&key(KeyCode::Char('a'), KeyEventKind::Press), true, now);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let released = app.handle_key(&ctrl_c, true, now);
        assert!(app.should_quit());
        assert_eq!(released.len(), 1);
        // Note on for 'a' and its note off; 'c' itself never sounded
        assert_eq!(app.controller().transport().sent.len(), 2);
    }

    #[test]
    fn test_terminal_keys_ignored_with_os_listener() {
        let mut app = app();
        let now = Instant::now();

        for kind in [KeyEventKind::Press, KeyEventKind::Repeat, KeyEventKind::Release] {
            assert!(app.handle_key(&key(KeyCode::Char('w'), kind), false, now).is_empty());
        }
        assert!(app.controller().active().is_empty());

        // Controls still work
        app.handle_key(&key(KeyCode::Up, KeyEventKind::Press), false, now);
        assert_eq!(app.playback().base_note, 49);
        // but not on release
        app.handle_key(&key(KeyCode::Up, KeyEventKind::Release), false, now);
        assert_eq!(app.playback().base_note, 49);
    }

    #[test]
    fn test_transport_error_status() {
        let mut app = app();
        app.report_transport_error(&TransportError::Unavailable("no ALSA".to_string()));
        assert_eq!(
            app.controller().status(),
            "Failed to create MIDI source (MIDI endpoint unavailable: no ALSA)"
        );
    }
}
