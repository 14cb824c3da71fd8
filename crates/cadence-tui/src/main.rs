//! cadence-tui: Terminal chat viewer driven by the reveal scheduler.
//! Uses Ratatui + Crossterm for rendering.
//!
//! Usage:
//!   cadence-tui PAYLOAD.json [--latency-ms N]   replay a saved reply
//!   cadence-tui                                 chat with `chat_endpoint`

mod app;
mod ui;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use tracing::info;

use cadence_core::client::ChatClient;
use cadence_core::config::Config;

use app::{App, Source};

struct Args {
    payload: Option<PathBuf>,
    latency_ms: u64,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        payload: None,
        latency_ms: 0,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--latency-ms" {
            let value = iter.next().context("--latency-ms needs a value")?;
            args.latency_ms = value
                .parse()
                .with_context(|| format!("--latency-ms is not a number: {}", value))?;
        } else {
            args.payload = Some(PathBuf::from(arg));
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing to a file (not stdout, since we own the terminal)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("cadence-tui.log")
        .context("Failed to open cadence-tui.log")?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .try_init();

    let args = parse_args()?;
    let project_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = Config::load_or_default(&project_root)?;

    let source = match &args.payload {
        Some(path) => Source::Replay {
            payload: app::load_payload(path)?,
            latency: Duration::from_millis(args.latency_ms),
        },
        None => Source::Live {
            client: Arc::new(ChatClient::new(&config)?),
        },
    };

    let (cue_tx, mut cue_rx) = tokio::sync::mpsc::unbounded_channel();
    let (reply_tx, mut reply_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut app = App::new(source, &config, cue_tx, reply_tx);
    app.replay();

    info!("Starting TUI");

    // Setup terminal
    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    // Main event loop
    loop {
        // Draw
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Handle cues and replies (non-blocking)
        while let Ok(cue) = cue_rx.try_recv() {
            app.handle_cue(cue);
        }
        while let Ok(reply) = reply_rx.try_recv() {
            app.handle_reply(reply);
        }

        // Handle terminal events
        if event::poll(Duration::from_millis(30))? {
            if let Event::Key(key) = event::read()? {
                match (key.code, key.modifiers) {
                    // Quit
                    (KeyCode::Char('c'), KeyModifiers::CONTROL)
                    | (KeyCode::Char('q'), KeyModifiers::CONTROL) => {
                        app.should_quit = true;
                    }
                    (KeyCode::Char('r'), KeyModifiers::CONTROL) => app.replay(),
                    (KeyCode::Esc, _) => {
                        app.transcript.cancel();
                    }
                    (KeyCode::Enter, _) => app.send_message(),
                    (KeyCode::Char(c), _) => app.input.push(c),
                    (KeyCode::Backspace, _) => {
                        app.input.pop();
                    }
                    (KeyCode::Up, _) | (KeyCode::PageUp, _) => app.scroll_up(),
                    (KeyCode::Down, _) | (KeyCode::PageDown, _) => app.scroll_down(),
                    _ => {}
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    // Cleanup
    app.transcript.cancel();
    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
