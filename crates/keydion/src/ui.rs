//! TUI rendering for the accordion
//!
//! The screen has a status header, the playback controls, the button grid
//! and an optional help panel. Button geometry lives in [`ButtonGrid`] so the
//! renderer and mouse hit testing always agree.

use crate::app::App;
use crate::config::Theme;
use crate::layout::{note_name, KeyLayout};
use crate::midi::MidiTransport;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// Button width in cells
pub const BUTTON_WIDTH: u16 = 5;
/// Horizontal distance between neighbouring buttons
pub const BUTTON_STRIDE: u16 = BUTTON_WIDTH + 1;
/// Horizontal shift of each row relative to the one above
pub const ROW_INDENT: u16 = 3;

/// Screen regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenAreas {
    pub header: Rect,
    pub controls: Rect,
    pub grid: Rect,
    pub help: Rect,
}

/// Split the screen; `help` is empty when the panel is hidden
pub fn screen_areas(area: Rect, layout: &KeyLayout, show_help: bool) -> ScreenAreas {
    let help_height = if show_help { help_lines(layout) as u16 + 2 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(help_height),
        ])
        .split(area);

    ScreenAreas {
        header: chunks[0],
        controls: chunks[1],
        grid: chunks[2],
        help: chunks[3],
    }
}

/// Positions of the layout buttons inside the grid panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonGrid {
    area: Rect,
    origin: (u16, u16),
    button_height: u16,
}

impl ButtonGrid {
    /// Center the layout inside `area` (the inside of the grid panel)
    pub fn new(area: Rect, layout: &KeyLayout, show_note_numbers: bool) -> Self {
        let button_height = if show_note_numbers { 2 } else { 1 };
        let width = layout
            .rows()
            .iter()
            .enumerate()
            .map(|(row, keys)| row as u16 * ROW_INDENT + keys.len() as u16 * BUTTON_STRIDE)
            .max()
            .unwrap_or(0)
            .saturating_sub(1);
        let height = (layout.num_rows() as u16 * (button_height + 1)).saturating_sub(1);

        let origin = (
            area.x + area.width.saturating_sub(width) / 2,
            area.y + area.height.saturating_sub(height) / 2,
        );

        Self {
            area,
            origin,
            button_height,
        }
    }

    /// Screen rectangle of a button, whether or not it fits the panel
    pub fn button_rect(&self, row: usize, column: usize) -> Rect {
        Rect {
            x: self.origin.0 + row as u16 * ROW_INDENT + column as u16 * BUTTON_STRIDE,
            y: self.origin.1 + row as u16 * (self.button_height + 1),
            width: BUTTON_WIDTH,
            height: self.button_height,
        }
    }

    /// Whether a button is completely inside the panel
    pub fn is_visible(&self, rect: Rect) -> bool {
        rect.x >= self.area.x
            && rect.y >= self.area.y
            && rect.right() <= self.area.right()
            && rect.bottom() <= self.area.bottom()
    }

    /// The (row, column) of the visible button under a screen cell
    pub fn hit(&self, layout: &KeyLayout, x: u16, y: u16) -> Option<(usize, usize)> {
        layout
            .buttons()
            .map(|b| (b.row, b.column))
            .find(|&(row, column)| {
                let rect = self.button_rect(row, column);
                self.is_visible(rect)
                    && x >= rect.x
                    && x < rect.right()
                    && y >= rect.y
                    && y < rect.bottom()
            })
    }
}

/// Button grid for the current screen size and app state
pub fn button_grid<T: MidiTransport>(area: Rect, app: &App<T>, theme: &Theme) -> ButtonGrid {
    let areas = screen_areas(area, app.layout(), app.show_help());
    let inner = Block::default().borders(Borders::ALL).inner(areas.grid);
    ButtonGrid::new(inner, app.layout(), theme.show_note_numbers)
}

/// Render the whole application screen
pub fn render_app<T: MidiTransport>(frame: &mut Frame, app: &App<T>, theme: &Theme, os_keyboard_active: bool) {
    let area = frame.area();
    let areas = screen_areas(area, app.layout(), app.show_help());

    render_header(frame, areas.header, app, theme, os_keyboard_active);
    render_controls(frame, areas.controls, app, theme);
    render_grid(frame, areas.grid, app, theme);
    if app.show_help() {
        render_help(frame, areas.help, app, theme);
    }
}

fn render_header<T: MidiTransport>(
    frame: &mut Frame,
    area: Rect,
    app: &App<T>,
    theme: &Theme,
    os_keyboard_active: bool,
) {
    let transport = app.controller().transport();
    let source = if transport.is_ready() {
        Span::styled(transport.port_name().to_string(), Style::default().fg(Color::Green))
    } else {
        Span::styled("not ready", Style::default().fg(Color::Red))
    };
    let input_mode = if os_keyboard_active {
        "OS"
    } else if app.auto_release_active() {
        "Terminal (auto-release)"
    } else {
        "Terminal"
    };

    let line = Line::from(vec![
        Span::styled("Source: ", Style::default().add_modifier(Modifier::BOLD)),
        source,
        Span::raw("  "),
        Span::styled("Input: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(input_mode),
        Span::raw("  "),
        Span::styled("Last: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(app.controller().status().to_string()),
    ]);

    let block = Block::default()
        .title(" Chromatic Button Accordion -> MIDI ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border()));

    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_controls<T: MidiTransport>(frame: &mut Frame, area: Rect, app: &App<T>, theme: &Theme) {
    let playback = app.playback();
    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().add_modifier(Modifier::BOLD);

    let line = Line::from(vec![
        Span::styled("Base note ", label),
        Span::styled(format!("{} ({})", playback.base_note, note_name(playback.base_note)), value),
        Span::raw("   "),
        Span::styled("Channel ", label),
        Span::styled((playback.channel + 1).to_string(), value),
        Span::raw("   "),
        Span::styled("Velocity ", label),
        Span::styled(playback.velocity.to_string(), value),
        Span::raw("   "),
        Span::styled("Held ", label),
        Span::styled(app.controller().active().len().to_string(), value),
    ]);

    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border()));

    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_grid<T: MidiTransport>(frame: &mut Frame, area: Rect, app: &App<T>, theme: &Theme) {
    let block = Block::default()
        .title(" C-griff ")
        .title_bottom(" click to latch | Space all off | Tab help | Esc quit ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let layout = app.layout();
    let grid = ButtonGrid::new(inner, layout, theme.show_note_numbers);

    for button in layout.buttons() {
        let rect = grid.button_rect(button.row, button.column);
        if !grid.is_visible(rect) {
            continue;
        }

        let style = if app.is_active(button.index) {
            Style::default().fg(Color::Black).bg(theme.active()).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White).bg(theme.button())
        };

        let mut lines = vec![Line::from(button.symbol.to_string())];
        if theme.show_note_numbers {
            let note = app.playback().midi_note(button.index);
            lines.push(Line::from(Span::styled(note.to_string(), Style::default().add_modifier(Modifier::DIM))));
        }

        frame.render_widget(
            Paragraph::new(lines).style(style).alignment(Alignment::Center),
            rect,
        );
    }
}

fn help_lines(layout: &KeyLayout) -> usize {
    layout.num_rows() + 2
}

fn render_help<T: MidiTransport>(frame: &mut Frame, area: Rect, app: &App<T>, theme: &Theme) {
    let layout = app.layout();
    let playback = app.playback();
    let key = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
    let text = Style::default().fg(Color::DarkGray);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Up/Down ", key),
            Span::styled("base note  ", text),
            Span::styled("Left/Right ", key),
            Span::styled("channel  ", text),
            Span::styled("PgUp/PgDn ", key),
            Span::styled("velocity  ", text),
            Span::styled("Space ", key),
            Span::styled("all off  ", text),
            Span::styled("Tab ", key),
            Span::styled("help", text),
        ]),
        Line::from(Span::styled("Mapping (key -> note):", text)),
    ];

    for (row, keys) in layout.rows().iter().enumerate() {
        let mut spans = Vec::with_capacity(keys.len() * 2);
        for (column, symbol) in keys.iter().enumerate() {
            let name = layout
                .note_index(row, column)
                .map(|index| note_name(playback.midi_note(index)))
                .unwrap_or_default();
            spans.push(Span::styled(format!("{} ", symbol), key));
            spans.push(Span::styled(format!("{:<4}", name), text));
        }
        lines.push(Line::from(spans));
    }

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border()));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::PlaybackConfig;
    use crate::input::InputEvent;
    use crate::midi::RecordingOutput;
    use ratatui::backend::TestBackend;
    use std::time::Instant;

    fn screen_text(app: &App<RecordingOutput>, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|frame| render_app(frame, app, &Theme::default(), false))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_button_rects() {
        let layout = KeyLayout::c_griff();
        let grid = ButtonGrid::new(Rect::new(0, 0, 200, 50), &layout, true);

        let first = grid.button_rect(0, 0);
        let next = grid.button_rect(0, 1);
        let below = grid.button_rect(1, 0);
        assert_eq!(next.x - first.x, BUTTON_STRIDE);
        assert_eq!(below.x - first.x, ROW_INDENT);
        assert_eq!(below.y - first.y, 3);
        assert_eq!(first.width, BUTTON_WIDTH);
    }

    #[test]
    fn test_hit_testing() {
        let layout = KeyLayout::c_griff();
        let grid = ButtonGrid::new(Rect::new(0, 0, 120, 20), &layout, true);

        let rect = grid.button_rect(2, 4);
        assert_eq!(grid.hit(&layout, rect.x, rect.y), Some((2, 4)));
        assert_eq!(grid.hit(&layout, rect.right() - 1, rect.bottom() - 1), Some((2, 4)));

        // The gap between two buttons
        assert_eq!(grid.hit(&layout, rect.right(), rect.y), None);
        assert_eq!(grid.hit(&layout, 0, 0), None);
    }

    #[test]
    fn test_clipped_buttons_are_not_hit() {
        let layout = KeyLayout::c_griff();
        let grid = ButtonGrid::new(Rect::new(0, 0, 30, 20), &layout, false);

        let rect = grid.button_rect(0, 11);
        assert!(!grid.is_visible(rect));
        assert_eq!(grid.hit(&layout, rect.x, rect.y), None);
    }

    #[test]
    fn test_render_shows_state() {
        let mut app = App::new(KeyLayout::c_griff(), RecordingOutput::default(), PlaybackConfig::default());
        app.handle_input(&InputEvent::KeyDown("3".to_string()), Instant::now());

        let text = screen_text(&app, 120, 30);
        assert!(text.contains("Source: recording"));
        assert!(text.contains("Note ON ch:1 note:54 vel:30"));
        assert!(text.contains("Base note 48 (C3)"));
        assert!(text.contains("Held 1"));
        assert!(text.contains("Mapping"));
    }

    #[test]
    fn test_grid_matches_rendered_buttons() {
        let app = App::new(KeyLayout::c_griff(), RecordingOutput::default(), PlaybackConfig::default())
            .with_help(false);
        let area = Rect::new(0, 0, 120, 30);
        let grid = button_grid(area, &app, &Theme::default());

        let mut terminal = Terminal::new(TestBackend::new(area.width, area.height)).unwrap();
        terminal
            .draw(|frame| render_app(frame, &app, &Theme::default(), false))
            .unwrap();

        // 'q' is centered in its button's first line
        let rect = grid.button_rect(1, 0);
        let buffer = terminal.backend().buffer();
        let cell = &buffer.content()[buffer.index_of(rect.x + BUTTON_WIDTH / 2, rect.y)];
        assert_eq!(cell.symbol(), "q");
    }
}
