//! keydion - Chromatic Button Accordion MIDI Controller
//!
//! Turns the computer keyboard into a C-griff button accordion and plays
//! through a virtual MIDI source other applications can subscribe to.
//! Features include:
//!
//! - C-griff layout over the four main keyboard rows, or a custom layout
//! - Virtual MIDI source (midir) or JACK MIDI output
//! - OS-level key detection for reliable key release handling
//! - Clickable button grid in the terminal
//! - Configurable via TOML file
//!
//! # Usage as a Library
//!
//! ```no_run
//! use keydion::{KeyLayout, NoteController, PlaybackConfig, DummyMidiOutput};
//!
//! let layout = KeyLayout::c_griff();
//! let mut controller = NoteController::new(DummyMidiOutput);
//! let config = PlaybackConfig::default();
//!
//! if let Some(index) = layout.index_for_symbol('3') {
//!     let event = controller.press(index, &config);
//!     println!("{:?}", event);
//!     controller.release(index, &config);
//! }
//! ```

pub mod app;
pub mod config;
pub mod controller;
pub mod error;
pub mod input;
pub mod layout;
pub mod midi;
pub mod os_keyboard;
pub mod ui;

// Re-export main types
pub use app::{App, Control};
pub use config::{Config, LayoutPreset, Theme};
pub use controller::{ActiveNotes, NoteController, PlaybackConfig, C3_MIDI, DEFAULT_VELOCITY};
pub use error::{Error, LayoutError, Result, TransportError};
pub use input::{AutoRelease, InputEvent, KeyRouter, NoteAction};
pub use layout::{note_name, KeyLayout, NoteIndex};
pub use midi::{open_output, DummyMidiOutput, MidiBackend, MidiEvent, MidiTransport};
pub use os_keyboard::{is_available as os_keyboard_available, OsKeyEvent, OsKeyboardListener};
pub use ui::{render_app, ButtonGrid};
