//! Scrollable transcript with the typing indicator.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use cadence_core::player::{Speaker, TranscriptEntry};

use crate::app::App;

fn clock(entry: &TranscriptEntry) -> String {
    chrono::DateTime::parse_from_rfc3339(&entry.timestamp)
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

pub fn draw(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Conversation ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let messages = &app.transcript.messages;
    if messages.is_empty() && !app.transcript.typing {
        let empty = Paragraph::new("No messages yet.")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, inner);
        return;
    }

    // Bottom-up with scroll offset
    let visible_height = inner.height as usize;
    let end = messages.len().saturating_sub(app.scroll_offset);
    let start = end.saturating_sub(visible_height * 2); // overshoot for wrapping

    let mut lines: Vec<Line> = Vec::new();
    for entry in &messages[start..end] {
        let (fg, who) = match entry.speaker {
            Speaker::User => (Color::Cyan, "you"),
            Speaker::Bot => (Color::Green, "bot"),
        };
        let mut first = true;
        for line in entry.text.lines() {
            let prefix = if first {
                format!("{} {:>3} ", clock(entry), who)
            } else {
                " ".repeat(13)
            };
            first = false;
            lines.push(Line::from(vec![
                Span::styled(prefix, Style::default().fg(Color::DarkGray)),
                Span::styled(line.to_string(), Style::default().fg(fg)),
            ]));
        }
    }

    if app.transcript.typing && app.scroll_offset == 0 {
        lines.push(Line::styled(
            "             bot is typing...",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ));
    }

    // Keep the newest lines in view
    let overflow = lines.len().saturating_sub(visible_height) as u16;
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((overflow, 0));
    frame.render_widget(paragraph, inner);
}
