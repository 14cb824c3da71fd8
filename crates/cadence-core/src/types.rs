//! Core types: ResponsePayload, delay configs, segments, Schedule, etc.

use serde::{Deserialize, Serialize};

use crate::error::PayloadError;
use crate::events::ScheduleEvent;

// ── Wire payload (response body of the chat service) ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// Single-chunk reply, used when `response_chunks` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_chunks: Option<Vec<String>>,

    /// Absent means true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humanlike_delay: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_messages: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_config: Option<WireDelayConfig>,
}

/// `delay_config` as sent on the wire. Every field is optional; the legacy
/// fields are defaulted one by one, the segmented fields are validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireDelayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typing_speed_min_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typing_speed_max_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_thinking_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_chunk_thinking_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_chunk_pause_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_delay_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_segments: Option<Vec<Segment>>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_time: Option<f64>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_reading_delay: Option<f64>,
}

/// A reply fragment with its own writing and inter-segment delay (seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub content: String,
    pub writing_delay: f64,
    pub inter_segment_delay: f64,
}

// ── Resolved legacy config ──

/// Legacy chunk-mode delay settings, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyDelayConfig {
    pub typing_speed_min_ms: f64,
    pub typing_speed_max_ms: f64,
    pub question_thinking_ms: f64,
    pub first_chunk_thinking_ms: f64,
    pub last_chunk_pause_ms: f64,
    pub min_delay_ms: f64,
    pub max_delay_ms: f64,
}

impl Default for LegacyDelayConfig {
    fn default() -> Self {
        Self {
            typing_speed_min_ms: 100.0,
            typing_speed_max_ms: 200.0,
            question_thinking_ms: 300.0,
            first_chunk_thinking_ms: 600.0,
            last_chunk_pause_ms: 100.0,
            min_delay_ms: 200.0,
            max_delay_ms: 800.0,
        }
    }
}

/// Upper bound for any single timing value: one day.
pub const MAX_TIMING_SECONDS: f64 = 86_400.0;

fn is_valid_timing(seconds: f64) -> bool {
    seconds.is_finite() && (0.0..=MAX_TIMING_SECONDS).contains(&seconds)
}

/// A wire legacy field, or `fallback` when it is missing or out of range.
fn legacy_field(value: Option<f64>, fallback: f64) -> f64 {
    match value {
        Some(ms) if is_valid_timing(ms / 1000.0) => ms,
        _ => fallback,
    }
}

impl LegacyDelayConfig {
    /// Typing speed bounds in ascending order.
    pub fn typing_speed_range(&self) -> (f64, f64) {
        if self.typing_speed_min_ms <= self.typing_speed_max_ms {
            (self.typing_speed_min_ms, self.typing_speed_max_ms)
        } else {
            (self.typing_speed_max_ms, self.typing_speed_min_ms)
        }
    }

    /// Whether every field is a usable millisecond value.
    pub fn is_valid(&self) -> bool {
        [
            self.typing_speed_min_ms,
            self.typing_speed_max_ms,
            self.question_thinking_ms,
            self.first_chunk_thinking_ms,
            self.last_chunk_pause_ms,
            self.min_delay_ms,
            self.max_delay_ms,
        ]
        .iter()
        .all(|ms| is_valid_timing(ms / 1000.0))
    }
}

impl WireDelayConfig {
    /// Fill missing or out-of-range legacy fields from `base`, field by field.
    pub fn legacy_over(&self, base: &LegacyDelayConfig) -> LegacyDelayConfig {
        LegacyDelayConfig {
            typing_speed_min_ms: legacy_field(self.typing_speed_min_ms, base.typing_speed_min_ms),
            typing_speed_max_ms: legacy_field(self.typing_speed_max_ms, base.typing_speed_max_ms),
            question_thinking_ms: legacy_field(self.question_thinking_ms, base.question_thinking_ms),
            first_chunk_thinking_ms: legacy_field(
                self.first_chunk_thinking_ms,
                base.first_chunk_thinking_ms,
            ),
            last_chunk_pause_ms: legacy_field(self.last_chunk_pause_ms, base.last_chunk_pause_ms),
            min_delay_ms: legacy_field(self.min_delay_ms, base.min_delay_ms),
            max_delay_ms: legacy_field(self.max_delay_ms, base.max_delay_ms),
        }
    }

    pub fn legacy(&self) -> LegacyDelayConfig {
        self.legacy_over(&LegacyDelayConfig::default())
    }

    fn segments(&self) -> Option<&[Segment]> {
        self.response_segments
            .as_deref()
            .filter(|segments| !segments.is_empty())
    }
}

// ── Delivery plan (validated payload) ──

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryPlan {
    /// `humanlike_delay == false`: everything at once, no indicator.
    Instant { chunks: Vec<String> },
    Legacy {
        chunks: Vec<String>,
        config: LegacyDelayConfig,
    },
    Segmented {
        segments: Vec<Segment>,
        reading_time: f64,
        min_reading_delay: f64,
    },
}

impl ResponsePayload {
    pub fn humanlike(&self) -> bool {
        self.humanlike_delay.unwrap_or(true)
    }

    /// Reply chunks: `response_chunks`, else `[response]`, else nothing.
    pub fn chunks(&self) -> Vec<String> {
        match (&self.response_chunks, &self.response) {
            (Some(chunks), _) => chunks.clone(),
            (None, Some(response)) => vec![response.clone()],
            (None, None) => Vec::new(),
        }
    }

    /// Validate the payload and select the delivery mode, with legacy fields
    /// defaulted from the built-in values.
    pub fn plan(&self) -> Result<DeliveryPlan, PayloadError> {
        self.plan_with(&LegacyDelayConfig::default())
    }

    /// Like [`plan`](Self::plan), but missing legacy fields fall back to `base`.
    pub fn plan_with(&self, base: &LegacyDelayConfig) -> Result<DeliveryPlan, PayloadError> {
        let delay_config = self.delay_config.clone().unwrap_or_default();
        let segments = delay_config.segments();

        if !self.humanlike() {
            let mut chunks = self.chunks();
            if chunks.is_empty() {
                if let Some(segments) = segments {
                    chunks = segments.iter().map(|s| s.content.clone()).collect();
                }
            }
            return Ok(DeliveryPlan::Instant { chunks });
        }

        let Some(segments) = segments else {
            return Ok(DeliveryPlan::Legacy {
                chunks: self.chunks(),
                config: delay_config.legacy_over(base),
            });
        };

        let reading_time = delay_config
            .reading_time
            .ok_or(PayloadError::MissingReadingTime)?;
        let min_reading_delay = delay_config
            .min_reading_delay
            .ok_or(PayloadError::MissingMinReadingDelay)?;
        check_seconds("reading_time", reading_time)?;
        check_seconds("min_reading_delay", min_reading_delay)?;
        for (i, segment) in segments.iter().enumerate() {
            check_seconds(
                &format!("response_segments[{}].writing_delay", i),
                segment.writing_delay,
            )?;
            check_seconds(
                &format!("response_segments[{}].inter_segment_delay", i),
                segment.inter_segment_delay,
            )?;
        }

        Ok(DeliveryPlan::Segmented {
            segments: segments.to_vec(),
            reading_time,
            min_reading_delay,
        })
    }
}

fn check_seconds(field: &str, value: f64) -> Result<(), PayloadError> {
    if is_valid_timing(value) {
        Ok(())
    } else {
        Err(PayloadError::InvalidTiming {
            field: field.to_string(),
            value,
        })
    }
}

// ── Schedule (scheduler output) ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    Instant,
    Legacy,
    Segmented,
}

impl std::fmt::Display for ScheduleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleMode::Instant => write!(f, "instant"),
            ScheduleMode::Legacy => write!(f, "legacy"),
            ScheduleMode::Segmented => write!(f, "segmented"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealEvent {
    pub fire_at_ms: f64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorWindow {
    pub on_at_ms: f64,
    pub off_at_ms: f64,
}

/// A computed reveal plan. Events are sorted by `at_ms`, and the last one is
/// always an indicator-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub mode: ScheduleMode,
    /// Time before anything becomes visible (effective reading time in
    /// segmented mode, zero otherwise)
    pub playback_start_ms: f64,
    pub events: Vec<ScheduleEvent>,
}

impl Schedule {
    pub fn reveals(&self) -> Vec<RevealEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ScheduleEvent::Reveal { at_ms, message } => Some(RevealEvent {
                    fire_at_ms: *at_ms,
                    message: message.clone(),
                }),
                ScheduleEvent::Indicator { .. } => None,
            })
            .collect()
    }

    /// Pair every indicator-on with the next indicator-off.
    pub fn indicator_windows(&self) -> Vec<IndicatorWindow> {
        let mut windows = Vec::new();
        let mut open: Option<f64> = None;
        for event in &self.events {
            match (event, open) {
                (ScheduleEvent::Indicator { at_ms, on: true }, None) => open = Some(*at_ms),
                (ScheduleEvent::Indicator { at_ms, on: false }, Some(on_at_ms)) => {
                    windows.push(IndicatorWindow {
                        on_at_ms,
                        off_at_ms: *at_ms,
                    });
                    open = None;
                }
                _ => {}
            }
        }
        windows
    }

    pub fn reveal_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_reveal()).count()
    }

    /// Time of the last event.
    pub fn duration_ms(&self) -> f64 {
        self.events.last().map(|e| e.at_ms()).unwrap_or(0.0)
    }
}
