//! Note on/off lifecycle
//!
//! The controller owns the set of sounding note indices and is the only
//! place that turns a note index into MIDI bytes. Pressing an index that is
//! already held, or releasing one that is not, produces no message, so key
//! auto-repeat and stray key-ups are harmless.

use crate::layout::NoteIndex;
use crate::midi::{MidiEvent, MidiTransport};
use std::collections::BTreeSet;

/// MIDI note number for C3
pub const C3_MIDI: u8 = 48;

/// Default velocity for key presses
pub const DEFAULT_VELOCITY: u8 = 30;

/// Highest base note reachable from the base note control
pub const BASE_NOTE_MAX: u8 = 100;

/// Playback parameters read at the moment of each note event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// MIDI note played by note index 0
    pub base_note: u8,
    /// MIDI channel (0-15)
    pub channel: u8,
    /// Note-on velocity (1-127)
    pub velocity: u8,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_note: C3_MIDI,
            channel: 0,
            velocity: DEFAULT_VELOCITY,
        }
    }
}

impl PlaybackConfig {
    /// Build a config with every field clamped to its control range
    pub fn new(base_note: u8, channel: u8, velocity: u8) -> Self {
        Self {
            base_note: base_note.min(BASE_NOTE_MAX),
            channel: channel.min(15),
            velocity: velocity.clamp(1, 127),
        }
    }

    /// MIDI note for a note index, saturated to 0..=127
    pub fn midi_note(&self, index: NoteIndex) -> u8 {
        (index as u32 + self.base_note as u32).min(127) as u8
    }

    /// Move the base note, staying within 0..=BASE_NOTE_MAX
    pub fn step_base_note(&mut self, delta: i16) {
        self.base_note = step(self.base_note, delta, 0, BASE_NOTE_MAX);
    }

    /// Move the channel, staying within 0..=15
    pub fn step_channel(&mut self, delta: i16) {
        self.channel = step(self.channel, delta, 0, 15);
    }

    /// Move the velocity, staying within 1..=127
    pub fn step_velocity(&mut self, delta: i16) {
        self.velocity = step(self.velocity, delta, 1, 127);
    }
}

fn step(value: u8, delta: i16, min: u8, max: u8) -> u8 {
    (value as i16 + delta).clamp(min as i16, max as i16) as u8
}

/// Note indices that are currently sounding
#[derive(Debug, Clone, Default)]
pub struct ActiveNotes {
    notes: BTreeSet<NoteIndex>,
}

impl ActiveNotes {
    pub fn contains(&self, index: NoteIndex) -> bool {
        self.notes.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Indices in ascending order
    pub fn iter(&self) -> impl Iterator<Item = NoteIndex> + '_ {
        self.notes.iter().copied()
    }
}

/// Turns press/release requests into note-on/note-off messages
pub struct NoteController<T: MidiTransport> {
    transport: T,
    active: ActiveNotes,
    status: String,
}

impl<T: MidiTransport> NoteController<T> {
    pub fn new(transport: T) -> Self {
        let status = if transport.is_ready() {
            format!("Virtual source created: {}", transport.port_name())
        } else {
            "MIDI output not ready".to_string()
        };
        Self {
            transport,
            active: ActiveNotes::default(),
            status,
        }
    }

    /// Start sounding a note index.
    ///
    /// Returns the note-on message, or `None` if the index was already held.
    /// The index is marked active even when the transport cannot deliver.
    pub fn press(&mut self, index: NoteIndex, config: &PlaybackConfig) -> Option<MidiEvent> {
        if !self.active.notes.insert(index) {
            return None;
        }
        let event = MidiEvent::note_on(config.channel, config.midi_note(index), config.velocity);
        self.transmit(event);
        Some(event)
    }

    /// Stop sounding a note index.
    ///
    /// Returns the note-off message, or `None` if the index was not held.
    pub fn release(&mut self, index: NoteIndex, config: &PlaybackConfig) -> Option<MidiEvent> {
        if !self.active.notes.remove(&index) {
            return None;
        }
        let event = MidiEvent::note_off(config.channel, config.midi_note(index));
        self.transmit(event);
        Some(event)
    }

    /// Release every held index, lowest first
    pub fn release_all(&mut self, config: &PlaybackConfig) -> Vec<MidiEvent> {
        let held: Vec<NoteIndex> = self.active.iter().collect();
        held.into_iter()
            .filter_map(|index| self.release(index, config))
            .collect()
    }

    /// Press if idle, release if held
    pub fn toggle(&mut self, index: NoteIndex, config: &PlaybackConfig) -> Option<MidiEvent> {
        if self.active.contains(index) {
            self.release(index, config)
        } else {
            self.press(index, config)
        }
    }

    pub fn is_active(&self, index: NoteIndex) -> bool {
        self.active.contains(index)
    }

    pub fn active(&self) -> &ActiveNotes {
        &self.active
    }

    /// Last sent message or last transport problem, for the status line
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn transmit(&mut self, event: MidiEvent) {
        log::debug!("{}", event);
        if !self.transport.is_ready() {
            self.status = format!("{} (not sent: MIDI output not ready)", event);
            return;
        }
        match self.transport.send(event) {
            Ok(()) => self.status = event.to_string(),
            Err(e) => {
                log::warn!("{}: {}", event, e);
                self.status = e.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::RecordingOutput;

    fn controller() -> NoteController<RecordingOutput> {
        NoteController::new(RecordingOutput::default())
    }

    #[test]
    fn test_press_scenario() {
        let mut controller = controller();
        let config = PlaybackConfig { base_note: 48, channel: 0, velocity: 30 };

        let event = controller.press(6, &config);
        assert_eq!(event, Some(MidiEvent { status: 0x90, data1: 54, data2: 30 }));
        assert_eq!(controller.transport().sent, vec![MidiEvent::note_on(0, 54, 30)]);
        assert!(controller.is_active(6));
    }

    #[test]
    fn test_press_is_idempotent() {
        let mut controller = controller();
        let config = PlaybackConfig::default();

        assert!(controller.press(3, &config).is_some());
        assert!(controller.press(3, &config).is_none());
        assert_eq!(controller.transport().sent.len(), 1);
    }

    #[test]
    fn test_release_unheld_is_silent() {
        let mut controller = controller();
        let config = PlaybackConfig::default();

        assert!(controller.release(9, &config).is_none());
        assert!(controller.transport().sent.is_empty());

        controller.press(9, &config);
        controller.release(9, &config);
        assert!(controller.release(9, &config).is_none());
        assert_eq!(controller.transport().sent.len(), 2);
    }

    #[test]
    fn test_press_then_release_order() {
        let mut controller = controller();
        let config = PlaybackConfig::default();

        controller.press(12, &config);
        controller.release(12, &config);

        let sent = &controller.transport().sent;
        assert_eq!(sent.len(), 2);
        assert!(sent[0].is_note_on());
        assert!(sent[1].is_note_off());
        assert_eq!(sent[0].data1, sent[1].data1);
        assert_eq!(sent[1].data2, 0);
    }

    #[test]
    fn test_channel_is_masked() {
        let mut controller = controller();
        let config = PlaybackConfig { base_note: 48, channel: 17, velocity: 100 };

        let event = controller.press(0, &config).unwrap();
        assert_eq!(event.status & 0x0F, 1);
        assert_eq!(event.status & 0xF0, 0x90);
    }

    #[test]
    fn test_note_is_clamped() {
        let mut controller = controller();
        let config = PlaybackConfig { base_note: 120, channel: 0, velocity: 100 };

        let event = controller.press(20, &config).unwrap();
        assert_eq!(event.data1, 127);
    }

    #[test]
    fn test_release_all() {
        let mut controller = controller();
        let config = PlaybackConfig::default();

        for index in [8, 0, 3] {
            controller.press(index, &config);
        }
        let released = controller.release_all(&config);

        assert_eq!(released.len(), 3);
        assert!(released.iter().all(MidiEvent::is_note_off));
        assert_eq!(
            released.iter().map(|e| e.data1).collect::<Vec<_>>(),
            vec![48, 51, 56]
        );
        assert!(controller.active().is_empty());
        assert_eq!(controller.transport().sent.len(), 6);
    }

    #[test]
    fn test_toggle() {
        let mut controller = controller();
        let config = PlaybackConfig::default();

        assert!(controller.toggle(5, &config).unwrap().is_note_on());
        assert!(controller.toggle(5, &config).unwrap().is_note_off());
        assert!(!controller.is_active(5));
    }

    #[test]
    fn test_not_ready_keeps_state() {
        let mut controller = NoteController::new(RecordingOutput {
            not_ready: true,
            ..Default::default()
        });
        let config = PlaybackConfig::default();

        assert!(controller.press(4, &config).is_some());
        assert!(controller.is_active(4));
        assert!(controller.transport().sent.is_empty());
        assert!(controller.status().contains("not ready"));

        assert!(controller.release(4, &config).is_some());
        assert!(controller.active().is_empty());
    }

    #[test]
    fn test_send_failure_is_reported() {
        let mut controller = NoteController::new(RecordingOutput {
            fail_sends: true,
            ..Default::default()
        });
        let config = PlaybackConfig::default();

        controller.press(1, &config);
        assert!(controller.is_active(1));
        assert_eq!(controller.status(), "MIDI send failed: test failure");
    }

    #[test]
    fn test_status_tracks_last_event() {
        let mut controller = controller();
        assert_eq!(controller.status(), "Virtual source created: recording");

        controller.press(6, &PlaybackConfig::default());
        assert_eq!(controller.status(), "Note ON ch:1 note:54 vel:30");
    }

    #[test]
    fn test_config_steps() {
        let mut config = PlaybackConfig::new(99, 15, 127);
        config.step_base_note(5);
        assert_eq!(config.base_note, BASE_NOTE_MAX);
        config.step_channel(1);
        assert_eq!(config.channel, 15);
        config.step_velocity(1);
        assert_eq!(config.velocity, 127);

        config.step_velocity(-200);
        assert_eq!(config.velocity, 1);
        config.step_base_note(-200);
        assert_eq!(config.base_note, 0);
    }

    #[test]
    fn test_config_new_clamps() {
        let config = PlaybackConfig::new(127, 20, 0);
        assert_eq!(config, PlaybackConfig { base_note: 100, channel: 15, velocity: 1 });
    }
}
