use crate::app::{App, InputMode};
use crate::braille::BrailleCanvas;
use crate::map::{Label, LabelKind, MapLayers};
use crate::session::StatusState;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map
            Constraint::Length(1), // Selection / messages
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_map(frame, app, chunks[0]);
    render_detail(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Wineries ",
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut viewport = app.viewport.clone();
    viewport.width = inner.width as usize * 2;
    viewport.height = inner.height as usize * 4;

    // Nothing but the basemap until the first query lands
    let markers = app.session.frame().map(|f| f.markers.as_slice()).unwrap_or(&[]);
    let layers = app
        .map_renderer
        .render(inner.width as usize, inner.height as usize, &viewport, markers);

    let cursor_pos = app.mouse_pixel_pos().and_then(|(px, py)| {
        let cx = (px / 2) as u16;
        let cy = (py / 4) as u16;
        (cx < inner.width && cy < inner.height).then_some((cx, cy))
    });

    let selected = app.selected_winery().and_then(|w| {
        let (px, py) = viewport.project(w.record.longitude, w.record.latitude);
        viewport.is_visible(px, py).then_some(((px / 2) as u16, (py / 4) as u16))
    });

    frame.render_widget(
        MapWidget {
            layers,
            cursor_pos,
            selected,
        },
        inner,
    );
}

/// Braille layers with marker glyphs and labels overlaid
struct MapWidget {
    layers: MapLayers,
    cursor_pos: Option<(u16, u16)>,
    selected: Option<(u16, u16)>,
}

impl MapWidget {
    fn render_layer(canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        for (col, row, ch) in canvas.cells() {
            if col >= area.width as usize || row >= area.height as usize {
                continue;
            }
            buf[(area.x + col as u16, area.y + row as u16)].set_char(ch).set_fg(color);
        }
    }

    fn label_style(kind: LabelKind) -> Style {
        match kind {
            LabelKind::Count => Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD),
            LabelKind::Favorite => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            LabelKind::Visited => Style::default().fg(Color::Green),
            LabelKind::Wishlist => Style::default().fg(Color::Cyan),
            LabelKind::Winery => Style::default().fg(Color::Magenta),
            LabelKind::Name => Style::default().fg(Color::White),
        }
    }

    fn render_label(label: &Label, area: Rect, buf: &mut Buffer) {
        if label.row >= area.height || label.col >= area.width {
            return;
        }
        let style = Self::label_style(label.kind);
        let room = (area.width - label.col) as usize;
        for (i, ch) in label.text.chars().take(room).enumerate() {
            buf[(area.x + label.col + i as u16, area.y + label.row)].set_char(ch).set_style(style);
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Self::render_layer(&self.layers.basemap, Color::DarkGray, area, buf);
        Self::render_layer(&self.layers.clusters, Color::Yellow, area, buf);

        // Names first so marker glyphs win any overlap
        let (names, markers): (Vec<&Label>, Vec<&Label>) =
            self.layers.labels.iter().partition(|l| l.kind == LabelKind::Name);
        for label in names.into_iter().chain(markers) {
            Self::render_label(label, area, buf);
        }

        if let Some((cx, cy)) = self.selected {
            buf[(area.x + cx, area.y + cy)].set_style(Style::default().add_modifier(Modifier::REVERSED));
        }

        if let Some((cx, cy)) = self.cursor_pos {
            buf[(area.x + cx, area.y + cy)].set_char('╋').set_fg(Color::Red);
        }
    }
}

fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
    let dim = Style::default().fg(Color::DarkGray);

    let line = if let InputMode::Search(query) = &app.mode {
        Line::from(vec![
            Span::styled(" Search: ", Style::default().fg(Color::Yellow)),
            Span::raw(query.clone()),
            Span::styled("▏ Enter:apply Esc:cancel", dim),
        ])
    } else if let Some(message) = &app.message {
        Line::from(Span::styled(format!(" {message}"), Style::default().fg(Color::Yellow)))
    } else if let Some(winery) = app.selected_winery() {
        let status = &winery.status;
        let mut spans = vec![
            Span::styled(format!(" {} ", winery.record.name), Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(winery.record.address.clone(), dim),
        ];
        if status.is_favorite {
            spans.push(Span::styled(" ♥ favorite", Style::default().fg(Color::Red)));
        }
        if status.is_want_to_visit {
            spans.push(Span::styled(" ★ wishlist", Style::default().fg(Color::Cyan)));
        }
        if status.visited {
            let last = status
                .last_visit_date
                .map(|d| format!(", last {d}"))
                .unwrap_or_default();
            spans.push(Span::styled(
                format!(" ✓ {} visit(s){last}", status.visit_count),
                Style::default().fg(Color::Green),
            ));
        }
        spans.push(Span::styled("  f:fav w:wish v:visit", dim));
        Line::from(spans)
    } else {
        Line::from(Span::styled(" Click a marker or press Tab to select a winery", dim))
    };

    frame.render_widget(Paragraph::new(line), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let dim = Style::default().fg(Color::DarkGray);
    let (status_text, status_color) = match app.session.status_state() {
        StatusState::Loading => ("loading", Color::Yellow),
        StatusState::Loaded => ("synced", Color::Green),
        StatusState::Defaulted => ("offline", Color::Red),
    };

    let (markers, wineries) = app
        .session
        .frame()
        .map(|f| (f.markers.len(), f.markers.iter().map(|m| m.point_count()).sum::<usize>()))
        .unwrap_or((0, 0));

    let filter = app.session.filter();
    let mut filter_text = filter.status.label().to_string();
    if !filter.query.is_empty() {
        filter_text.push_str(&format!(" \"{}\"", filter.query));
    }

    let status = Line::from(vec![
        Span::styled(" ", dim),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" | ", dim),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
        Span::styled(" | ", dim),
        Span::styled(format!("{wineries} in {markers} markers"), Style::default().fg(Color::White)),
        Span::styled(" | [F]ilter: ", dim),
        Span::styled(filter_text, Style::default().fg(Color::Magenta)),
        Span::styled(" | ", dim),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::styled(" | hjkl:pan +/-:zoom Enter:expand /:search m:locate r:reset q:quit", dim),
    ]);

    frame.render_widget(Paragraph::new(status), area);
}
