//! Status bar: playback state, latency, last outcome.

use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::app::App;

pub fn draw(frame: &mut Frame, app: &App, area: Rect) {
    let (state_str, state_color) = if app.waiting {
        ("waiting", Color::Blue)
    } else if app.transcript.typing {
        ("typing", Color::Green)
    } else if app.transcript.is_playing() {
        ("revealing", Color::Green)
    } else {
        ("idle", Color::DarkGray)
    };

    let mut spans = vec![
        Span::styled(
            format!(" {} ", state_str),
            Style::default().fg(Color::Black).bg(state_color),
        ),
        Span::raw(format!(" messages: {} ", app.transcript.messages.len())),
    ];

    if let Some(latency) = app.last_latency {
        spans.push(Span::raw(format!(" latency: {}ms ", latency.as_millis())));
    }

    if !app.status.is_empty() {
        spans.push(Span::styled(
            format!(" {} ", app.status),
            Style::default().fg(Color::Yellow),
        ));
    }

    let status = Paragraph::new(Line::from(spans));
    frame.render_widget(status, area);
}
