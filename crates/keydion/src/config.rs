//! Configuration file support for keydion
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/keydion/config.toml`
//! - macOS: `~/Library/Application Support/keydion/config.toml`
//! - Windows: `%APPDATA%\keydion\config.toml`
//!
//! The file only provides startup values. Changes made with the controls
//! while playing are not written back.

use crate::controller::{PlaybackConfig, C3_MIDI, DEFAULT_VELOCITY};
use crate::error::{Error, Result};
use crate::input::DEFAULT_NOTE_RELEASE_MS;
use crate::layout::{KeyLayout, NoteIndex};
use crate::midi::MidiBackend;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG: &str = r#"# keydion configuration file

[keyboard]
# Key layout: "cgriff" or "custom"
layout = "cgriff"

# Custom layout rows, one string of key symbols per row (layout = "custom")
# rows = ["1234567890-=", "qwertyuiop[]", "asdfghjkl;'\\", "zxcvbnm,./"]
# row_offsets = [0, 2, 4, 6]

# MIDI note played by the first button (0-100, 48 = C3)
base_note = 48

# MIDI channel (0-15, shown as 1-16)
channel = 0

# Note-on velocity (1-127)
velocity = 30

# Auto-release timeout in milliseconds
# Only used when key releases cannot be detected
note_release_ms = 400

[midi]
# Output backend: "virtual", "jack" or "none"
backend = "virtual"

# Client name of the MIDI source
client_name = "keydion"

# Port name of the MIDI source
port_name = "accordion"

# Auto-connect to these JACK MIDI inputs (jack backend only)
# auto_connect = ["fluidsynth:midi_00"]

[theme]
button_color = "dark_gray"
active_color = "cyan"
border_color = "cyan"

# Show MIDI note numbers under the key symbols
show_note_numbers = true

# Show the help panel on startup
show_help = true
"#;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Keyboard configuration
    pub keyboard: KeyboardSettings,
    /// MIDI configuration
    pub midi: MidiSettings,
    /// UI/Theme configuration
    pub theme: Theme,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Using default configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "keydion") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        Self::write_default_config(&path)?;
        Ok(path)
    }

    /// Write the commented default config to `path`
    pub fn write_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG)?;
        Ok(())
    }

    /// Build the key layout selected by the keyboard settings
    pub fn to_layout(&self) -> Result<KeyLayout> {
        match self.keyboard.layout {
            LayoutPreset::CGriff => Ok(KeyLayout::c_griff()),
            LayoutPreset::Custom => {
                let rows = self.keyboard.rows.as_ref().ok_or_else(|| {
                    Error::Config("layout = \"custom\" requires keyboard.rows".to_string())
                })?;
                let offsets = match &self.keyboard.row_offsets {
                    Some(offsets) => offsets.clone(),
                    // Whole-tone steps between rows, as in C-griff
                    None => (0..rows.len() as NoteIndex).map(|row| row.saturating_mul(2)).collect(),
                };
                Ok(KeyLayout::from_strs(rows.as_slice(), offsets)?)
            }
        }
    }

    /// Initial playback parameters, clamped to the control ranges
    pub fn playback(&self) -> PlaybackConfig {
        PlaybackConfig::new(self.keyboard.base_note, self.keyboard.channel, self.keyboard.velocity)
    }

    pub fn note_release_duration(&self) -> Duration {
        Duration::from_millis(self.keyboard.note_release_ms)
    }
}

/// Keyboard layout preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutPreset {
    /// Chromatic C-griff on a US QWERTY keyboard
    #[default]
    CGriff,
    /// Rows and offsets from the config file
    Custom,
}

/// Keyboard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardSettings {
    /// Layout preset
    pub layout: LayoutPreset,
    /// Custom rows of key symbols (only used when layout = "custom")
    pub rows: Option<Vec<String>>,
    /// Custom row offsets, one per row
    pub row_offsets: Option<Vec<NoteIndex>>,
    /// Base MIDI note (48 = C3)
    pub base_note: u8,
    /// MIDI channel (0-15)
    pub channel: u8,
    /// Default velocity (1-127)
    pub velocity: u8,
    /// Auto-release timeout in milliseconds
    pub note_release_ms: u64,
}

impl Default for KeyboardSettings {
    fn default() -> Self {
        Self {
            layout: LayoutPreset::CGriff,
            rows: None,
            row_offsets: None,
            base_note: C3_MIDI,
            channel: 0,
            velocity: DEFAULT_VELOCITY,
            note_release_ms: DEFAULT_NOTE_RELEASE_MS,
        }
    }
}

/// MIDI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiSettings {
    /// Output backend
    pub backend: MidiBackend,
    /// MIDI client name
    pub client_name: String,
    /// MIDI source port name
    pub port_name: String,
    /// Auto-connect to these JACK MIDI inputs
    pub auto_connect: Option<Vec<String>>,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            backend: MidiBackend::Virtual,
            client_name: "keydion".to_string(),
            port_name: "accordion".to_string(),
            auto_connect: None,
        }
    }
}

/// Theme/UI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    /// Idle button color
    pub button_color: String,
    /// Sounding button color
    pub active_color: String,
    /// Border color
    pub border_color: String,
    /// Show MIDI note numbers on buttons
    pub show_note_numbers: bool,
    /// Show help panel on startup
    pub show_help: bool,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            button_color: "dark_gray".to_string(),
            active_color: "cyan".to_string(),
            border_color: "cyan".to_string(),
            show_note_numbers: true,
            show_help: true,
        }
    }
}

impl Theme {
    /// Parse a color string to ratatui Color
    pub fn parse_color(s: &str) -> ratatui::style::Color {
        use ratatui::style::Color;
        match s.to_lowercase().as_str() {
            "black" => Color::Black,
            "red" => Color::Red,
            "green" => Color::Green,
            "yellow" => Color::Yellow,
            "blue" => Color::Blue,
            "magenta" => Color::Magenta,
            "cyan" => Color::Cyan,
            "gray" | "grey" => Color::Gray,
            "dark_gray" | "dark_grey" | "darkgray" | "darkgrey" => Color::DarkGray,
            "light_red" | "lightred" => Color::LightRed,
            "light_green" | "lightgreen" => Color::LightGreen,
            "light_yellow" | "lightyellow" => Color::LightYellow,
            "light_blue" | "lightblue" => Color::LightBlue,
            "light_magenta" | "lightmagenta" => Color::LightMagenta,
            "light_cyan" | "lightcyan" => Color::LightCyan,
            "white" => Color::White,
            s if s.starts_with('#') && s.len() == 7 && s.is_ascii() => {
                match (
                    u8::from_str_radix(&s[1..3], 16),
                    u8::from_str_radix(&s[3..5], 16),
                    u8::from_str_radix(&s[5..7], 16),
                ) {
                    (Ok(r), Ok(g), Ok(b)) => Color::Rgb(r, g, b),
                    _ => Color::White,
                }
            }
            _ => Color::White,
        }
    }

    pub fn button(&self) -> ratatui::style::Color {
        Self::parse_color(&self.button_color)
    }

    pub fn active(&self) -> ratatui::style::Color {
        Self::parse_color(&self.active_color)
    }

    pub fn border(&self) -> ratatui::style::Color {
        Self::parse_color(&self.border_color)
    }
}
