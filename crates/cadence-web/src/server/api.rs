//! REST API endpoints: reply planning and schedule computation.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use cadence_core::planner::build_payload;
use cadence_core::scheduler;
use cadence_core::types::{ResponsePayload, Schedule};
use cadence_core::PayloadError;

use super::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/plan", post(post_plan))
        .route("/api/schedule", post(post_schedule))
}

/// Measured latency from the wire. Missing, negative or NaN counts as zero;
/// values too large for a `Duration` saturate.
pub fn latency_from_ms(ms: Option<f64>) -> Duration {
    match ms {
        Some(ms) if ms > 0.0 => {
            Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX)
        }
        _ => Duration::ZERO,
    }
}

/// Validate `payload` against the configured legacy fallbacks and schedule it.
pub fn compute_schedule(
    state: &AppState,
    payload: &ResponsePayload,
    backend_latency: Duration,
) -> Result<Schedule, PayloadError> {
    let plan = payload.plan_with(&state.config.bot.legacy)?;
    let mut rng = rand::thread_rng();
    Ok(scheduler::schedule(&plan, backend_latency, &mut rng))
}

pub fn schedule_json(schedule: &Schedule) -> Value {
    json!({
        "mode": schedule.mode,
        "playback_start_ms": schedule.playback_start_ms,
        "events": schedule.events,
        "reveals": schedule.reveals(),
        "indicator_windows": schedule.indicator_windows(),
    })
}

// --- Health ---

async fn get_health() -> Json<Value> {
    Json(json!({"ok": true}))
}

// --- Plan a reply ---

#[derive(Deserialize)]
pub struct PlanBody {
    message: Option<String>,
    response: Option<String>,
}

pub async fn post_plan(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PlanBody>,
) -> (StatusCode, Json<Value>) {
    let Some(response) = body.response else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "response is required"})),
        );
    };
    let message = body.message.unwrap_or_default();

    let payload = {
        let mut rng = rand::thread_rng();
        build_payload(message.trim(), &response, &state.config.bot, &mut rng)
    };
    info!(
        "Planned reply: {} chunk(s)",
        payload.response_chunks.as_ref().map(|c| c.len()).unwrap_or(0)
    );
    (StatusCode::OK, Json(json!(payload)))
}

// --- Schedule a payload ---

#[derive(Deserialize)]
pub struct ScheduleBody {
    payload: ResponsePayload,
    #[serde(default)]
    backend_latency_ms: Option<f64>,
}

pub async fn post_schedule(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScheduleBody>,
) -> (StatusCode, Json<Value>) {
    let latency = latency_from_ms(body.backend_latency_ms);
    match compute_schedule(&state, &body.payload, latency) {
        Ok(schedule) => (StatusCode::OK, Json(schedule_json(&schedule))),
        Err(e) => {
            warn!("Rejected payload: {}", e);
            (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()})))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::config::Config;

    fn state() -> Arc<AppState> {
        Arc::new(AppState {
            config: Config::default(),
        })
    }

    fn schedule_body(v: Value) -> ScheduleBody {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_latency_from_ms() {
        assert_eq!(latency_from_ms(None), Duration::ZERO);
        assert_eq!(latency_from_ms(Some(-5.0)), Duration::ZERO);
        assert_eq!(latency_from_ms(Some(1500.0)), Duration::from_millis(1500));
        assert_eq!(latency_from_ms(Some(f64::NAN)), Duration::ZERO);
        assert_eq!(latency_from_ms(Some(1e30)), Duration::MAX);
        assert_eq!(latency_from_ms(Some(f64::INFINITY)), Duration::MAX);
    }

    #[tokio::test]
    async fn test_schedule_with_huge_latency() {
        let body = schedule_body(json!({
            "payload": {
                "delay_config": {
                    "reading_time": 5.0,
                    "min_reading_delay": 1.0,
                    "response_segments": [
                        {"content": "A", "writing_delay": 1.0, "inter_segment_delay": 0.0}
                    ]
                }
            },
            "backend_latency_ms": 1e30
        }));
        let (status, Json(v)) = post_schedule(State(state()), Json(body)).await;
        assert_eq!(status, StatusCode::OK);
        // Reading pause falls to its floor
        assert_eq!(v["playback_start_ms"], 1000.0);
        assert_eq!(v["reveals"][0]["fireAtMs"], 2000.0);
    }

    #[tokio::test]
    async fn test_schedule_segmented() {
        let body = schedule_body(json!({
            "payload": {
                "response": "A B",
                "delay_config": {
                    "reading_time": 5.0,
                    "min_reading_delay": 1.0,
                    "response_segments": [
                        {"content": "A", "writing_delay": 1.0, "inter_segment_delay": 0.5},
                        {"content": "B", "writing_delay": 2.0, "inter_segment_delay": 0.0}
                    ]
                }
            },
            "backend_latency_ms": 2000
        }));
        let (status, Json(v)) = post_schedule(State(state()), Json(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["mode"], "segmented");
        assert_eq!(v["playback_start_ms"], 3000.0);
        assert_eq!(v["reveals"][0]["fireAtMs"], 4000.0);
        assert_eq!(v["reveals"][1]["fireAtMs"], 6500.0);
        assert_eq!(v["indicator_windows"].as_array().unwrap().len(), 2);
        assert_eq!(v["events"][0]["type"], "indicator");
    }

    #[tokio::test]
    async fn test_schedule_rejects_missing_reading_time() {
        let body = schedule_body(json!({
            "payload": {
                "delay_config": {
                    "min_reading_delay": 1.0,
                    "response_segments": [
                        {"content": "A", "writing_delay": 1.0, "inter_segment_delay": 0.5}
                    ]
                }
            }
        }));
        let (status, Json(v)) = post_schedule(State(state()), Json(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(v["error"].as_str().unwrap().contains("reading_time"));
    }

    #[tokio::test]
    async fn test_schedule_legacy_uses_profile_fallbacks() {
        let mut config = Config::default();
        config.bot.legacy.min_delay_ms = 5_000.0;
        config.bot.legacy.max_delay_ms = 5_000.0;
        let state = Arc::new(AppState { config });

        let body = schedule_body(json!({
            "payload": {"response_chunks": ["one", "two"]}
        }));
        let (status, Json(v)) = post_schedule(State(state), Json(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["mode"], "legacy");
        // Every delay is floored at the configured 5s minimum
        assert!(v["reveals"][0]["fireAtMs"].as_f64().unwrap() >= 5_000.0);
        assert!(v["reveals"][1]["fireAtMs"].as_f64().unwrap() >= 10_000.0);
    }

    #[tokio::test]
    async fn test_plan_builds_payload() {
        let body: PlanBody = serde_json::from_value(json!({
            "message": "Tell me about tides",
            "response": "Tides rise and fall twice a day. Want details?"
        }))
        .unwrap();
        let (status, Json(v)) = post_plan(State(state()), Json(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["humanlike_delay"], true);
        assert_eq!(v["response_chunks"].as_array().unwrap().len(), 2);
        assert_eq!(
            v["delay_config"]["response_segments"].as_array().unwrap().len(),
            2
        );
        assert_eq!(v["delay_config"]["min_reading_delay"], 1.0);
    }

    #[tokio::test]
    async fn test_plan_requires_response() {
        let body: PlanBody = serde_json::from_value(json!({"message": "hi"})).unwrap();
        let (status, _) = post_plan(State(state()), Json(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
