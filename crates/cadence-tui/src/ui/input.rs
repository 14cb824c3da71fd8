//! Text input bar.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::app::{App, Source};

pub fn draw(frame: &mut Frame, app: &App, area: Rect) {
    let title = match app.source {
        Source::Replay { .. } => " Message (Enter replays, Ctrl+R replay, Esc stop, Ctrl+C quit) ",
        Source::Live { .. } => " Message (Enter to send, Esc stop, Ctrl+C quit) ",
    };
    let border_color = if app.waiting {
        Color::DarkGray
    } else {
        Color::Cyan
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(Color::White));
    frame.render_widget(input, inner);

    frame.set_cursor_position(Position::new(
        inner.x + app.input.chars().count() as u16,
        inner.y,
    ));
}
