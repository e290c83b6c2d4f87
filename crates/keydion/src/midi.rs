//! MIDI output backends
//!
//! The default backend publishes a virtual MIDI source through midir, so
//! other applications can subscribe to it. A JACK MIDI port is available as
//! an alternative. The note controller only ever hands a transport complete
//! three-byte messages.

use crate::config::MidiSettings;
use crate::error::{Result, TransportError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};

/// MIDI backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MidiBackend {
    /// Virtual MIDI source (ALSA / CoreMIDI)
    #[default]
    Virtual,
    /// JACK MIDI output port
    Jack,
    /// No MIDI output
    None,
}

/// A three-byte channel message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiEvent {
    pub const NOTE_ON: u8 = 0x90;
    pub const NOTE_OFF: u8 = 0x80;

    /// Note on; the channel is taken modulo 16
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            status: Self::NOTE_ON | (channel & 0x0F),
            data1: note & 0x7F,
            data2: velocity & 0x7F,
        }
    }

    /// Note off with release velocity 0
    pub fn note_off(channel: u8, note: u8) -> Self {
        Self {
            status: Self::NOTE_OFF | (channel & 0x0F),
            data1: note & 0x7F,
            data2: 0,
        }
    }

    pub fn channel(&self) -> u8 {
        self.status & 0x0F
    }

    pub fn is_note_on(&self) -> bool {
        self.status & 0xF0 == Self::NOTE_ON
    }

    pub fn is_note_off(&self) -> bool {
        self.status & 0xF0 == Self::NOTE_OFF
    }

    /// Raw MIDI bytes
    pub fn to_bytes(&self) -> [u8; 3] {
        [self.status, self.data1, self.data2]
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Channels are shown 1-based, as on the controls
        if self.is_note_on() {
            write!(f, "Note ON ch:{} note:{} vel:{}", self.channel() + 1, self.data1, self.data2)
        } else if self.is_note_off() {
            write!(f, "Note OFF ch:{} note:{}", self.channel() + 1, self.data1)
        } else {
            write!(f, "MIDI {:02X} {:02X} {:02X}", self.status, self.data1, self.data2)
        }
    }
}

/// MIDI output capability used by the note controller
pub trait MidiTransport {
    /// Transmit one message
    fn send(&mut self, event: MidiEvent) -> std::result::Result<(), TransportError>;

    /// Get the endpoint name
    fn port_name(&self) -> &str;

    /// Whether an endpoint exists to send from
    fn is_ready(&self) -> bool;
}

impl<T: MidiTransport + ?Sized> MidiTransport for Box<T> {
    fn send(&mut self, event: MidiEvent) -> std::result::Result<(), TransportError> {
        (**self).send(event)
    }

    fn port_name(&self) -> &str {
        (**self).port_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Open the output selected in the settings
pub fn open_output(settings: &MidiSettings) -> std::result::Result<Box<dyn MidiTransport>, TransportError> {
    match settings.backend {
        MidiBackend::Virtual => {
            let output = VirtualMidiOutput::create(&settings.client_name, &settings.port_name)?;
            log::info!("Virtual MIDI source created: {}", output.port_name());
            Ok(Box::new(output))
        }
        MidiBackend::Jack => {
            if !is_jack_running() {
                return Err(TransportError::Unavailable("JACK is not running".to_string()));
            }
            let output = JackMidiOutput::from_settings(settings)
                .map_err(|e| TransportError::Unavailable(e.to_string()))?;
            log::info!("JACK MIDI output created: {}", output.port_name());
            Ok(Box::new(output))
        }
        MidiBackend::None => Ok(Box::new(DummyMidiOutput)),
    }
}

/// Virtual MIDI source backed by midir
pub struct VirtualMidiOutput {
    conn: midir::MidiOutputConnection,
    port_name: String,
}

impl VirtualMidiOutput {
    /// Create the virtual source `client_name:port_name`
    #[cfg(unix)]
    pub fn create(client_name: &str, port_name: &str) -> std::result::Result<Self, TransportError> {
        use midir::os::unix::VirtualOutput;

        let midi_out = midir::MidiOutput::new(client_name)
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        let conn = midi_out
            .create_virtual(port_name)
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        Ok(Self {
            conn,
            port_name: format!("{}:{}", client_name, port_name),
        })
    }

    #[cfg(not(unix))]
    pub fn create(_client_name: &str, _port_name: &str) -> std::result::Result<Self, TransportError> {
        Err(TransportError::Unavailable(
            "virtual MIDI ports are not supported on this platform".to_string(),
        ))
    }
}

impl MidiTransport for VirtualMidiOutput {
    fn send(&mut self, event: MidiEvent) -> std::result::Result<(), TransportError> {
        self.conn
            .send(&event.to_bytes())
            .map_err(|e| TransportError::SendFailure(e.to_string()))
    }

    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// JACK MIDI output
pub struct JackMidiOutput {
    /// Sender for MIDI messages to the JACK process callback
    tx: Sender<MidiEvent>,
    /// Port name
    port_name: String,
    client: jack::AsyncClient<(), JackMidiHandler>,
}

impl JackMidiOutput {
    /// Create a new JACK MIDI output
    pub fn new(client_name: &str, port_name: &str) -> Result<Self> {
        let (client, _status) = jack::Client::new(client_name, jack::ClientOptions::NO_START_SERVER)?;
        let midi_out = client.register_port(port_name, jack::MidiOut::default())?;

        let (tx, rx) = channel();
        let handler = JackMidiHandler { midi_out, rx };
        let active_client = client.activate_async((), handler)?;

        Ok(Self {
            tx,
            port_name: format!("{}:{}", client_name, port_name),
            client: active_client,
        })
    }

    /// Create from settings, connecting to the configured destinations
    pub fn from_settings(settings: &MidiSettings) -> Result<Self> {
        let output = Self::new(&settings.client_name, &settings.port_name)?;

        if let Some(ref destinations) = settings.auto_connect {
            for dest in destinations {
                if let Err(e) = output.connect_to(dest) {
                    log::warn!("Failed to auto-connect to {}: {}", dest, e);
                }
            }
        }

        Ok(output)
    }

    /// Connect to a JACK MIDI input port
    pub fn connect_to(&self, destination: &str) -> Result<()> {
        self.client
            .as_client()
            .connect_ports_by_name(&self.port_name, destination)?;
        log::info!("Connected {} -> {}", self.port_name, destination);
        Ok(())
    }
}

impl MidiTransport for JackMidiOutput {
    fn send(&mut self, event: MidiEvent) -> std::result::Result<(), TransportError> {
        self.tx
            .send(event)
            .map_err(|e| TransportError::SendFailure(e.to_string()))
    }

    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// JACK process handler for MIDI output
struct JackMidiHandler {
    midi_out: jack::Port<jack::MidiOut>,
    rx: Receiver<MidiEvent>,
}

impl jack::ProcessHandler for JackMidiHandler {
    fn process(&mut self, _client: &jack::Client, ps: &jack::ProcessScope) -> jack::Control {
        let mut writer = self.midi_out.writer(ps);

        while let Ok(event) = self.rx.try_recv() {
            let bytes = event.to_bytes();
            let raw = jack::RawMidi { time: 0, bytes: &bytes };
            let _ = writer.write(&raw);
        }

        jack::Control::Continue
    }
}

/// Output used when no endpoint could be created
pub struct DummyMidiOutput;

impl MidiTransport for DummyMidiOutput {
    fn send(&mut self, event: MidiEvent) -> std::result::Result<(), TransportError> {
        log::debug!("MIDI (not sent): {}", event);
        Err(TransportError::Unavailable("no MIDI endpoint".to_string()))
    }

    fn port_name(&self) -> &str {
        "not ready"
    }

    fn is_ready(&self) -> bool {
        false
    }
}

/// Check if JACK is running
pub fn is_jack_running() -> bool {
    jack::Client::new("keydion-probe", jack::ClientOptions::NO_START_SERVER).is_ok()
}

/// List available JACK MIDI input ports
pub fn list_jack_midi_ports() -> Vec<String> {
    if let Ok((client, _)) = jack::Client::new("keydion-list", jack::ClientOptions::NO_START_SERVER) {
        client.ports(None, Some("midi"), jack::PortFlags::IS_INPUT)
    } else {
        Vec::new()
    }
}

/// Transport double that records everything it is asked to send
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingOutput {
    pub sent: Vec<MidiEvent>,
    pub not_ready: bool,
    pub fail_sends: bool,
}

#[cfg(test)]
impl MidiTransport for RecordingOutput {
    fn send(&mut self, event: MidiEvent) -> std::result::Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::SendFailure("test failure".to_string()));
        }
        self.sent.push(event);
        Ok(())
    }

    fn port_name(&self) -> &str {
        "recording"
    }

    fn is_ready(&self) -> bool {
        !self.not_ready
    }
}
