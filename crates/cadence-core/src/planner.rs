//! Delay planner: computes reading/writing delays for a reply from a
//! DelayProfile and assembles the payload the scheduler consumes.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunker::human_like_chunks;
use crate::config::DelayProfile;
use crate::types::{ResponsePayload, Segment, WireDelayConfig};

/// Segmented timing for one reply (seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayPlan {
    pub reading_time: f64,
    pub min_reading_delay: f64,
    pub response_segments: Vec<Segment>,
}

impl From<DelayPlan> for WireDelayConfig {
    fn from(plan: DelayPlan) -> Self {
        WireDelayConfig {
            response_segments: Some(plan.response_segments),
            reading_time: Some(plan.reading_time),
            min_reading_delay: Some(plan.min_reading_delay),
            ..Default::default()
        }
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Uniform draw in `[a, b]`, whichever order the bounds come in.
fn uniform<R: Rng + ?Sized>(rng: &mut R, a: f64, b: f64) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo < hi {
        rng.gen_range(lo..=hi)
    } else {
        lo
    }
}

/// Time to read `words` at `wpm`, in seconds.
fn words_to_seconds(words: usize, wpm: f64) -> f64 {
    if wpm <= 0.0 {
        return 0.0;
    }
    words as f64 * 60.0 / wpm
}

/// All timings zero: the reply shows up at once.
pub fn instant_display(chunks: &[String]) -> DelayPlan {
    DelayPlan {
        reading_time: 0.0,
        min_reading_delay: 0.0,
        response_segments: chunks
            .iter()
            .map(|c| Segment {
                content: c.clone(),
                writing_delay: 0.0,
                inter_segment_delay: 0.0,
            })
            .collect(),
    }
}

/// Reading time for the user's `message`, then writing and inter-segment
/// delays for each reply chunk.
pub fn calculate_typing_delays<R: Rng + ?Sized>(
    message: &str,
    chunks: &[String],
    profile: &DelayProfile,
    rng: &mut R,
) -> DelayPlan {
    if !profile.humanlike_delay {
        return instant_display(chunks);
    }

    let reading_time = words_to_seconds(word_count(message), profile.reading_words_per_minute)
        + uniform(rng, profile.reading_jitter_min, profile.reading_jitter_max)
        + uniform(rng, profile.reading_thinking_min, profile.reading_thinking_max);

    let response_segments = chunks
        .iter()
        .map(|content| {
            let writing_delay =
                words_to_seconds(word_count(content), profile.writing_words_per_minute)
                    + uniform(rng, profile.writing_jitter_min, profile.writing_jitter_max)
                    + uniform(rng, profile.writing_thinking_min, profile.writing_thinking_max);
            let inter_segment_delay = uniform(
                rng,
                profile.intra_message_delay_min,
                profile.intra_message_delay_max,
            );
            Segment {
                content: content.clone(),
                writing_delay,
                inter_segment_delay,
            }
        })
        .collect::<Vec<_>>();

    debug!(
        reading_time,
        segments = response_segments.len(),
        "Planned reply delays"
    );

    DelayPlan {
        reading_time,
        min_reading_delay: profile.min_reading_delay,
        response_segments,
    }
}

/// Chunk `response` (if the profile asks for it), plan its delays and build
/// the response body sent to the frontend.
pub fn build_payload<R: Rng + ?Sized>(
    message: &str,
    response: &str,
    profile: &DelayProfile,
    rng: &mut R,
) -> ResponsePayload {
    let chunks = if profile.chunk_messages {
        human_like_chunks(response)
    } else {
        vec![response.to_string()]
    };
    let plan = calculate_typing_delays(message, &chunks, profile, rng);

    ResponsePayload {
        response: Some(response.to_string()),
        response_chunks: Some(chunks),
        humanlike_delay: Some(profile.humanlike_delay),
        chunk_messages: Some(profile.chunk_messages),
        delay_config: Some(plan.into()),
    }
}
