//! keydion - Chromatic Button Accordion MIDI Controller
//!
//! Play a C-griff button accordion from the computer keyboard.

use anyhow::Result;
use clap::{Parser, Subcommand};
use crossterm::{
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
        KeyboardEnhancementFlags, MouseButton, MouseEvent, MouseEventKind, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::prelude::*;
use std::io::{self, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use keydion::{
    app::{App, Control},
    config::{Config, Theme},
    input::{AutoRelease, InputEvent},
    layout::note_name,
    midi::{is_jack_running, list_jack_midi_ports, open_output, DummyMidiOutput, MidiBackend, MidiTransport},
    os_keyboard::{is_available as os_keyboard_available, OsKeyEvent, OsKeyboardListener, ESCAPE},
    ui::{button_grid, render_app},
};

#[derive(Parser)]
#[command(name = "keydion")]
#[command(author, version, about = "Chromatic button-accordion MIDI controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path (default: ~/.config/keydion/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// MIDI output backend
    #[arg(long, value_enum)]
    backend: Option<MidiBackend>,

    /// MIDI client name
    #[arg(long)]
    client_name: Option<String>,

    /// MIDI note of the first button (0-100)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
    base_note: Option<u8>,

    /// MIDI channel (1-16)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=16))]
    channel: Option<u8>,

    /// Velocity (1-127)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=127))]
    velocity: Option<u8>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default configuration file
    Init,
    /// Show the configuration file path
    ConfigPath,
    /// List available JACK MIDI ports
    ListPorts,
    /// Print which note each key plays
    Layout,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => {
            let path = Config::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
            return Ok(());
        }
        Some(Commands::ConfigPath) => {
            let path = Config::config_path()?;
            println!("{}", path.display());
            return Ok(());
        }
        Some(Commands::ListPorts) => {
            if !is_jack_running() {
                println!("JACK is not running");
                return Ok(());
            }
            let ports = list_jack_midi_ports();
            if ports.is_empty() {
                println!("No JACK MIDI input ports found");
            } else {
                println!("Available JACK MIDI input ports:");
                for port in ports {
                    println!("  {}", port);
                }
            }
            return Ok(());
        }
        Some(Commands::Layout) | None => {}
    }

    // Load config
    let mut config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load_or_default(),
    };

    // Apply CLI overrides
    if let Some(backend) = cli.backend {
        config.midi.backend = backend;
    }
    if let Some(client_name) = cli.client_name {
        config.midi.client_name = client_name;
    }
    if let Some(base_note) = cli.base_note {
        config.keyboard.base_note = base_note;
    }
    if let Some(channel) = cli.channel {
        config.keyboard.channel = channel - 1;
    }
    if let Some(velocity) = cli.velocity {
        config.keyboard.velocity = velocity;
    }

    if let Some(Commands::Layout) = cli.command {
        print_layout(&config)?;
        return Ok(());
    }

    run_tui(config)
}

fn print_layout(config: &Config) -> Result<()> {
    let layout = config.to_layout()?;
    let playback = config.playback();

    for (row, keys) in layout.rows().iter().enumerate() {
        println!("Row {} (+{}):", row + 1, layout.row_offsets()[row]);
        for (column, symbol) in keys.iter().enumerate() {
            let index = layout.note_index(row, column)?;
            let note = playback.midi_note(index);
            println!("  {}  index {:>2}  note {:>3}  {}", symbol, index, note, note_name(note));
        }
    }
    Ok(())
}

fn run_tui(config: Config) -> Result<()> {
    let layout = config.to_layout()?;

    // Create MIDI output
    let (transport, transport_error) = match open_output(&config.midi) {
        Ok(output) => (output, None),
        Err(e) => {
            log::warn!("MIDI output disabled: {}", e);
            (Box::new(DummyMidiOutput) as Box<dyn MidiTransport>, Some(e))
        }
    };

    // Create OS keyboard listener
    let os_keyboard = if os_keyboard_available() {
        OsKeyboardListener::new()
    } else {
        None
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange, EnableMouseCapture)?;
    let key_releases = supports_keyboard_enhancement().unwrap_or(false);
    if key_releases {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(layout, transport, config.playback()).with_help(config.theme.show_help);
    if let Some(ref e) = transport_error {
        app.report_transport_error(e);
    }
    if os_keyboard.is_none() && !key_releases {
        app = app.with_auto_release(AutoRelease::new(config.note_release_duration()));
    }

    // Main loop
    let result = run_event_loop(&mut terminal, &mut app, os_keyboard.as_ref(), &config.theme);
    app.all_notes_off();

    // Cleanup
    if key_releases {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange
    )?;

    result
}

fn run_event_loop<T: MidiTransport>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<T>,
    os_keyboard: Option<&OsKeyboardListener>,
    theme: &Theme,
) -> Result<()> {
    let mut has_focus = true;
    // Note keys come from the terminal only when the OS listener is missing
    let terminal_notes = os_keyboard.is_none();

    loop {
        let mut area = Rect::default();
        terminal.draw(|frame| {
            area = frame.area();
            render_app(frame, app, theme, os_keyboard.is_some() && has_focus);
        })?;

        if app.should_quit() {
            return Ok(());
        }

        // Drain OS keyboard events; they only play while the terminal is focused
        if let Some(os_kb) = os_keyboard {
            while let Some(event) = os_kb.try_recv() {
                if !has_focus {
                    continue;
                }
                if event == OsKeyEvent::Press(ESCAPE) {
                    app.handle_control(Control::Quit);
                } else if let Some(input) = event.to_input() {
                    app.handle_input(&input, Instant::now());
                }
            }
        }

        app.tick(Instant::now());

        if !event::poll(Duration::from_millis(16))? {
            continue;
        }

        match event::read()? {
            Event::FocusGained => has_focus = true,
            Event::FocusLost => {
                has_focus = false;
                // Nothing can be released while unfocused
                app.all_notes_off();
            }
            Event::Key(key) => {
                has_focus = true;
                app.handle_key(&key, terminal_notes, Instant::now());
            }
            Event::Mouse(mouse) => handle_mouse(app, mouse, area, theme),
            _ => {}
        }
    }
}

fn handle_mouse<T: MidiTransport>(app: &mut App<T>, mouse: MouseEvent, area: Rect, theme: &Theme) {
    if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
        return;
    }
    let grid = button_grid(area, app, theme);
    if let Some((row, column)) = grid.hit(app.layout(), mouse.column, mouse.row) {
        app.handle_input(&InputEvent::ButtonClick { row, column }, Instant::now());
    }
}
