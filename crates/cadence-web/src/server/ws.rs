//! WebSocket: live reveal playback.
//!
//! The client sends `{"payload": {...}, "backend_latency_ms": 420}` frames and
//! receives `reveal` / `indicator` events as they fall due. A new frame
//! supersedes the reply still playing; `{"type": "cancel"}` stops it.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use cadence_core::player::{Cue, Transcript};
use cadence_core::types::{ResponsePayload, Schedule};
use cadence_core::ScheduleEvent;

use super::api::{compute_schedule, latency_from_ms};
use super::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Deserialize)]
struct PlayRequest {
    payload: ResponsePayload,
    #[serde(default)]
    backend_latency_ms: Option<f64>,
}

/// What a client frame asks for.
enum ClientFrame {
    Play(PlayRequest),
    Cancel,
    Invalid(String),
}

fn parse_frame(text: &str) -> ClientFrame {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => return ClientFrame::Invalid(format!("invalid JSON: {}", e)),
    };
    if value.get("type").and_then(|t| t.as_str()) == Some("cancel") {
        return ClientFrame::Cancel;
    }
    match serde_json::from_value::<PlayRequest>(value) {
        Ok(req) => ClientFrame::Play(req),
        Err(e) => ClientFrame::Invalid(format!("invalid play request: {}", e)),
    }
}

/// Start `schedule`, superseding the current playback. Returns true when the
/// superseded reply still had the indicator on: its own off cue is now stale,
/// so the client needs an explicit indicator-off.
fn begin_playback(
    transcript: &mut Transcript,
    schedule: Schedule,
    cue_tx: &mpsc::UnboundedSender<Cue>,
) -> bool {
    let was_typing = transcript.typing;
    let id = transcript.begin(schedule, cue_tx);
    info!(playback = id, "Started reveal playback");
    was_typing
}

fn indicator_off_frame() -> Value {
    ScheduleEvent::Indicator {
        at_ms: 0.0,
        on: false,
    }
    .to_ws_json()
}

async fn send_json(socket: &mut WebSocket, value: &Value) -> bool {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .is_ok()
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let (cue_tx, mut cue_rx) = mpsc::unbounded_channel::<Cue>();
    let mut transcript = Transcript::new();

    info!("WebSocket client connected");

    loop {
        tokio::select! {
            // Cues from the current playback -> send to client
            Some(cue) = cue_rx.recv() => {
                let frame = cue.event.to_ws_json();
                if transcript.apply(cue) && !send_json(&mut socket, &frame).await {
                    break;
                }
            }
            // Incoming frames from client
            msg = socket.recv() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue, // ping/pong/binary
                    Some(Err(e)) => {
                        error!("WebSocket receive error: {}", e);
                        break;
                    }
                };

                match parse_frame(text.as_str()) {
                    ClientFrame::Play(req) => {
                        let latency = latency_from_ms(req.backend_latency_ms);
                        match compute_schedule(&state, &req.payload, latency) {
                            Ok(schedule) => {
                                if begin_playback(&mut transcript, schedule, &cue_tx)
                                    && !send_json(&mut socket, &indicator_off_frame()).await
                                {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Rejected payload: {}", e);
                                transcript.fail();
                                let err = json!({"type": "error", "error": e.to_string()});
                                if !send_json(&mut socket, &err).await
                                    || !send_json(&mut socket, &indicator_off_frame()).await
                                {
                                    break;
                                }
                            }
                        }
                    }
                    ClientFrame::Cancel => {
                        transcript.cancel();
                        if !send_json(&mut socket, &indicator_off_frame()).await {
                            break;
                        }
                    }
                    ClientFrame::Invalid(reason) => {
                        let err = json!({"type": "error", "error": reason});
                        if !send_json(&mut socket, &err).await {
                            break;
                        }
                    }
                }
            }
        }
    }

    transcript.cancel();
    info!("WebSocket client disconnected");
}
