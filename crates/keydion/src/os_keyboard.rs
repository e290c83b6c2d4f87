//! OS-level keyboard input using rdev
//!
//! Terminals report key presses but usually not releases. Listening at the
//! OS level gives reliable press and release events, which a held accordion
//! button needs.

use crate::input::InputEvent;
use crossbeam_channel::{unbounded, Receiver, Sender};
use rdev::{listen, Event, EventType, Key};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Symbol reported for the Escape key
pub const ESCAPE: char = '\x1b';

/// Keyboard events from the OS-level listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsKeyEvent {
    /// A key was pressed
    Press(char),
    /// A key was released
    Release(char),
}

impl OsKeyEvent {
    /// The normalized input event, or `None` for control keys
    pub fn to_input(self) -> Option<InputEvent> {
        match self {
            OsKeyEvent::Press(ESCAPE) | OsKeyEvent::Release(ESCAPE) => None,
            OsKeyEvent::Press(c) => Some(InputEvent::KeyDown(c.to_string())),
            OsKeyEvent::Release(c) => Some(InputEvent::KeyUp(c.to_string())),
        }
    }
}

/// OS-level keyboard listener that captures key press and release events
pub struct OsKeyboardListener {
    /// Channel receiver for keyboard events
    event_rx: Receiver<OsKeyEvent>,
    /// Shutdown flag
    shutdown: Arc<AtomicBool>,
    /// Listener thread handle
    _thread: JoinHandle<()>,
}

impl OsKeyboardListener {
    /// Start the OS keyboard listener
    ///
    /// Returns None if the listener couldn't be started (e.g., on systems without X11)
    pub fn new() -> Option<Self> {
        if !is_available() {
            return None;
        }

        let (tx, rx) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let thread = thread::spawn(move || {
            run_listener(tx, shutdown_clone);
        });

        // Give the thread a moment to start
        thread::sleep(std::time::Duration::from_millis(100));

        Some(Self {
            event_rx: rx,
            shutdown,
            _thread: thread,
        })
    }

    /// Try to receive a keyboard event (non-blocking)
    pub fn try_recv(&self) -> Option<OsKeyEvent> {
        self.event_rx.try_recv().ok()
    }
}

impl Drop for OsKeyboardListener {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Map a physical key to its C-griff symbol.
///
/// rdev reports physical key positions, so the symbols are those printed on
/// a US QWERTY keyboard regardless of the active keymap.
pub fn key_to_char(key: Key) -> Option<char> {
    match key {
        // Row 0: number row
        Key::Num1 => Some('1'),
        Key::Num2 => Some('2'),
        Key::Num3 => Some('3'),
        Key::Num4 => Some('4'),
        Key::Num5 => Some('5'),
        Key::Num6 => Some('6'),
        Key::Num7 => Some('7'),
        Key::Num8 => Some('8'),
        Key::Num9 => Some('9'),
        Key::Num0 => Some('0'),
        Key::Minus => Some('-'),
        Key::Equal => Some('='),

        // Row 1
        Key::KeyQ => Some('q'),
        Key::KeyW => Some('w'),
        Key::KeyE => Some('e'),
        Key::KeyR => Some('r'),
        Key::KeyT => Some('t'),
        Key::KeyY => Some('y'),
        Key::KeyU => Some('u'),
        Key::KeyI => Some('i'),
        Key::KeyO => Some('o'),
        Key::KeyP => Some('p'),
        Key::LeftBracket => Some('['),
        Key::RightBracket => Some(']'),

        // Row 2
        Key::KeyA => Some('a'),
        Key::KeyS => Some('s'),
        Key::KeyD => Some('d'),
        Key::KeyF => Some('f'),
        Key::KeyG => Some('g'),
        Key::KeyH => Some('h'),
        Key::KeyJ => Some('j'),
        Key::KeyK => Some('k'),
        Key::KeyL => Some('l'),
        Key::SemiColon => Some(';'),
        Key::Quote => Some('\''),
        Key::BackSlash | Key::IntlBackslash => Some('\\'),

        // Row 3
        Key::KeyZ => Some('z'),
        Key::KeyX => Some('x'),
        Key::KeyC => Some('c'),
        Key::KeyV => Some('v'),
        Key::KeyB => Some('b'),
        Key::KeyN => Some('n'),
        Key::KeyM => Some('m'),
        Key::Comma => Some(','),
        Key::Dot => Some('.'),
        Key::Slash => Some('/'),

        Key::Escape => Some(ESCAPE),

        _ => None,
    }
}

/// Run the rdev listener (blocking - runs in its own thread)
fn run_listener(tx: Sender<OsKeyEvent>, shutdown: Arc<AtomicBool>) {
    let callback = move |event: Event| {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }

        match event.event_type {
            EventType::KeyPress(key) => {
                if let Some(c) = key_to_char(key) {
                    let _ = tx.send(OsKeyEvent::Press(c));
                }
            }
            EventType::KeyRelease(key) => {
                if let Some(c) = key_to_char(key) {
                    let _ = tx.send(OsKeyEvent::Release(c));
                }
            }
            _ => {}
        }
    };

    // This blocks until an error occurs
    if let Err(e) = listen(callback) {
        log::error!("OS keyboard listener error: {:?}", e);
    }
}

/// Check if the OS keyboard listener is likely to work on this system
pub fn is_available() -> bool {
    // On Linux, rdev requires X11 or Wayland
    #[cfg(target_os = "linux")]
    {
        std::env::var("DISPLAY").is_ok() || std::env::var("WAYLAND_DISPLAY").is_ok()
    }

    #[cfg(not(target_os = "linux"))]
    {
        true
    }
}
