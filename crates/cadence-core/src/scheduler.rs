//! Humanlike delay scheduler: turns a reply payload plus the measured
//! backend latency into an ordered reveal/indicator schedule.
//!
//! Two algorithms:
//! - legacy chunk mode: per-character typing cost plus contextual pauses,
//!   minus whatever the backend already spent;
//! - segmented mode: a reading pause, then one indicator window per segment
//!   using the writing/inter-segment delays computed server side.
//!
//! Every schedule ends with an indicator-off event.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::error::PayloadError;
use crate::events::ScheduleEvent;
use crate::types::{DeliveryPlan, LegacyDelayConfig, ResponsePayload, Schedule, ScheduleMode, Segment};

/// Validate `payload` and compute its schedule.
pub fn schedule_payload<R: Rng + ?Sized>(
    payload: &ResponsePayload,
    backend_latency: Duration,
    rng: &mut R,
) -> Result<Schedule, PayloadError> {
    let plan = payload.plan()?;
    Ok(schedule(&plan, backend_latency, rng))
}

/// Compute the schedule for an already validated plan. Never fails.
pub fn schedule<R: Rng + ?Sized>(
    plan: &DeliveryPlan,
    backend_latency: Duration,
    rng: &mut R,
) -> Schedule {
    let schedule = match plan {
        DeliveryPlan::Instant { chunks } => schedule_instant(chunks),
        DeliveryPlan::Legacy { chunks, config } => {
            schedule_chunks(chunks, config, backend_latency.as_secs_f64() * 1000.0, rng)
        }
        DeliveryPlan::Segmented {
            segments,
            reading_time,
            min_reading_delay,
        } => schedule_segments(
            segments,
            *reading_time,
            *min_reading_delay,
            backend_latency.as_secs_f64(),
        ),
    };
    debug!(
        mode = %schedule.mode,
        reveals = schedule.reveal_count(),
        duration_ms = schedule.duration_ms(),
        "Computed reveal schedule"
    );
    schedule
}

fn visible_chunks(chunks: &[String]) -> Vec<&str> {
    chunks
        .iter()
        .map(String::as_str)
        .filter(|c| !c.trim().is_empty())
        .collect()
}

fn indicator_off(at_ms: f64) -> ScheduleEvent {
    ScheduleEvent::Indicator { at_ms, on: false }
}

/// Everything at t=0, indicator never shown.
pub fn schedule_instant(chunks: &[String]) -> Schedule {
    let mut events: Vec<ScheduleEvent> = visible_chunks(chunks)
        .into_iter()
        .map(|c| ScheduleEvent::Reveal {
            at_ms: 0.0,
            message: c.to_string(),
        })
        .collect();
    events.push(indicator_off(0.0));
    Schedule {
        mode: ScheduleMode::Instant,
        playback_start_ms: 0.0,
        events,
    }
}

/// Breakdown of one chunk's delay in legacy mode (milliseconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkDelay {
    pub base_typing_ms: f64,
    pub contextual_ms: f64,
    /// Delay after backend compensation and clamping
    pub delay_ms: f64,
}

impl ChunkDelay {
    pub fn total_ms(&self) -> f64 {
        self.base_typing_ms + self.contextual_ms
    }
}

/// Per-chunk delays for the given visible chunks.
pub fn chunk_delays<R: Rng + ?Sized>(
    chunks: &[&str],
    config: &LegacyDelayConfig,
    backend_latency_ms: f64,
    rng: &mut R,
) -> Vec<ChunkDelay> {
    let n = chunks.len();
    let (speed_min, speed_max) = config.typing_speed_range();

    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let per_char = if speed_min < speed_max && (speed_max - speed_min).is_finite() {
                rng.gen_range(speed_min..=speed_max)
            } else {
                speed_min
            };
            let base_typing_ms = chunk.chars().count() as f64 * per_char;

            let mut contextual_ms = 0.0;
            if chunk.contains('?') {
                contextual_ms += config.question_thinking_ms;
            }
            if i == 0 {
                contextual_ms += config.first_chunk_thinking_ms;
            }
            if i == n - 1 {
                contextual_ms += config.last_chunk_pause_ms;
            }

            let total = base_typing_ms + contextual_ms;
            let delay_ms = if backend_latency_ms >= total {
                // Backend already used up the thinking time: spread the
                // overage across all chunks
                let overage = backend_latency_ms - total;
                config.min_delay_ms.max(config.max_delay_ms - overage / n as f64)
            } else {
                config.min_delay_ms.max(total - backend_latency_ms)
            };

            ChunkDelay {
                base_typing_ms,
                contextual_ms,
                delay_ms,
            }
        })
        .collect()
}

/// Legacy chunk algorithm: one indicator window from 0 to the last reveal.
pub fn schedule_chunks<R: Rng + ?Sized>(
    chunks: &[String],
    config: &LegacyDelayConfig,
    backend_latency_ms: f64,
    rng: &mut R,
) -> Schedule {
    let visible = visible_chunks(chunks);
    if visible.is_empty() {
        return Schedule {
            mode: ScheduleMode::Legacy,
            playback_start_ms: 0.0,
            events: vec![indicator_off(0.0)],
        };
    }

    let delays = chunk_delays(&visible, config, backend_latency_ms, rng);

    let mut events = vec![ScheduleEvent::Indicator {
        at_ms: 0.0,
        on: true,
    }];
    let mut fire_at_ms = 0.0;
    for (chunk, delay) in visible.iter().zip(&delays) {
        fire_at_ms += delay.delay_ms;
        events.push(ScheduleEvent::Reveal {
            at_ms: fire_at_ms,
            message: chunk.to_string(),
        });
    }
    events.push(indicator_off(fire_at_ms));

    Schedule {
        mode: ScheduleMode::Legacy,
        playback_start_ms: 0.0,
        events,
    }
}

/// Reading pause left after subtracting what the backend already spent.
pub fn effective_reading_time(
    reading_time: f64,
    min_reading_delay: f64,
    backend_latency_secs: f64,
) -> f64 {
    min_reading_delay.max(reading_time - backend_latency_secs)
}

/// Segmented algorithm. Times are in seconds on input, milliseconds in the
/// resulting schedule, offset by the effective reading time.
///
/// Blank segments keep their time slot but get no indicator window and no
/// reveal.
pub fn schedule_segments(
    segments: &[Segment],
    reading_time: f64,
    min_reading_delay: f64,
    backend_latency_secs: f64,
) -> Schedule {
    if segments.iter().all(|s| s.content.trim().is_empty()) {
        return Schedule {
            mode: ScheduleMode::Segmented,
            playback_start_ms: 0.0,
            events: vec![indicator_off(0.0)],
        };
    }

    let start = effective_reading_time(reading_time, min_reading_delay, backend_latency_secs);
    let mut events = Vec::with_capacity(segments.len() * 3);
    let mut cumulative = 0.0;
    for segment in segments {
        if segment.content.trim().is_empty() {
            cumulative += segment.writing_delay + segment.inter_segment_delay;
            continue;
        }
        let reveal_at = start + cumulative + segment.writing_delay;
        events.push(ScheduleEvent::Indicator {
            at_ms: (start + cumulative) * 1000.0,
            on: true,
        });
        events.push(ScheduleEvent::Reveal {
            at_ms: reveal_at * 1000.0,
            message: segment.content.clone(),
        });
        events.push(indicator_off(reveal_at * 1000.0));
        cumulative += segment.writing_delay + segment.inter_segment_delay;
    }

    Schedule {
        mode: ScheduleMode::Segmented,
        playback_start_ms: start * 1000.0,
        events,
    }
}
