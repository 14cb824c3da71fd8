//! App state, input handling, reply playback.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use cadence_core::client::{ChatClient, ChatReply};
use cadence_core::config::Config;
use cadence_core::player::{Cue, Transcript};
use cadence_core::scheduler;
use cadence_core::types::{LegacyDelayConfig, ResponsePayload};

/// Where bot replies come from.
pub enum Source {
    /// Replay a payload from disk with a simulated backend latency
    Replay {
        payload: ResponsePayload,
        latency: Duration,
    },
    /// Ask the remote chat service
    Live { client: Arc<ChatClient> },
}

/// A finished chat request, tagged with the request it answers.
pub struct ReplyResult {
    pub seq: u64,
    pub result: Result<ChatReply>,
}

/// The main application state.
pub struct App {
    pub transcript: Transcript,
    pub source: Source,
    pub input: String,
    pub status: String,
    pub waiting: bool,
    pub last_latency: Option<Duration>,
    pub scroll_offset: usize,
    pub should_quit: bool,
    cue_tx: mpsc::UnboundedSender<Cue>,
    reply_tx: mpsc::UnboundedSender<ReplyResult>,
    request_seq: u64,
    legacy: LegacyDelayConfig,
}

pub fn load_payload(path: &Path) -> Result<ResponsePayload> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse payload: {}", path.display()))
}

impl App {
    pub fn new(
        source: Source,
        config: &Config,
        cue_tx: mpsc::UnboundedSender<Cue>,
        reply_tx: mpsc::UnboundedSender<ReplyResult>,
    ) -> Self {
        let status = match &source {
            Source::Replay { .. } => "replay mode (Enter or Ctrl+R to replay)".to_string(),
            Source::Live { .. } => format!("live: {}", config.bot_name),
        };
        App {
            transcript: Transcript::new(),
            source,
            input: String::new(),
            status,
            waiting: false,
            last_latency: None,
            scroll_offset: 0,
            should_quit: false,
            cue_tx,
            reply_tx,
            request_seq: 0,
            legacy: config.bot.legacy,
        }
    }

    /// Schedule `payload` and start playing it, superseding any reply still
    /// being revealed.
    pub fn play(&mut self, payload: &ResponsePayload, latency: Duration) {
        let plan = match payload.plan_with(&self.legacy) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Invalid payload: {}", e);
                self.transcript.fail();
                self.status = format!("invalid payload: {}", e);
                return;
            }
        };
        let schedule = {
            let mut rng = rand::thread_rng();
            scheduler::schedule(&plan, latency, &mut rng)
        };
        self.status = format!(
            "{} reply: {} message(s) over {:.1}s",
            schedule.mode,
            schedule.reveal_count(),
            schedule.duration_ms() / 1000.0
        );
        self.last_latency = Some(latency);
        self.transcript.begin(schedule, &self.cue_tx);
        self.scroll_offset = 0;
    }

    /// Replay the loaded payload (replay mode only).
    pub fn replay(&mut self) {
        if let Source::Replay { payload, latency } = &self.source {
            let (payload, latency) = (payload.clone(), *latency);
            self.play(&payload, latency);
        }
    }

    pub fn handle_cue(&mut self, cue: Cue) {
        if self.transcript.apply(cue) {
            self.scroll_offset = 0;
        }
    }

    pub fn handle_reply(&mut self, reply: ReplyResult) {
        if reply.seq != self.request_seq {
            info!("Dropping reply to superseded request {}", reply.seq);
            return;
        }
        self.waiting = false;
        match reply.result {
            Ok(reply) => self.play(&reply.payload, reply.backend_latency),
            Err(e) => {
                error!("Chat request failed: {:#}", e);
                self.transcript.fail();
                self.status = format!("error: {}", e);
            }
        }
    }

    /// Send the input line as a user message.
    pub fn send_message(&mut self) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return;
        }
        self.input.clear();

        // A new message supersedes whatever is still being revealed
        self.transcript.cancel();
        self.transcript.push_user(&text);
        self.scroll_offset = 0;

        match &self.source {
            Source::Replay { .. } => self.replay(),
            Source::Live { client } => {
                self.request_seq += 1;
                self.waiting = true;
                self.status = "waiting for reply...".to_string();

                let seq = self.request_seq;
                let client = Arc::clone(client);
                let reply_tx = self.reply_tx.clone();
                tokio::spawn(async move {
                    let result = client.send(&text).await;
                    let _ = reply_tx.send(ReplyResult { seq, result });
                });
            }
        }
    }

    pub fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    pub fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}
