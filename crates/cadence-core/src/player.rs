//! Playback: turns a computed Schedule into timed cues on a channel.
//!
//! Each playback runs as one tokio task that sleeps until the next event is
//! due. The caller owns the returned [`PlaybackHandle`]; cancelling or
//! dropping it stops every pending cue. [`Transcript`] is the consumer side:
//! it holds the displayed messages and indicator flag and ignores cues from
//! playbacks it has superseded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::events::ScheduleEvent;
use crate::types::Schedule;

static NEXT_PLAYBACK_ID: AtomicU64 = AtomicU64::new(1);

/// An event delivered by a specific playback.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub playback: u64,
    pub event: ScheduleEvent,
}

/// Handle to a running playback.
#[derive(Debug)]
pub struct PlaybackHandle {
    id: u64,
    cancel_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PlaybackHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop all pending cues. A final indicator-off cue is sent if the
    /// indicator is currently shown.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
            debug!(playback = self.id, "Playback cancelled");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }

    /// Wait for the playback task to exit (completed or cancelled).
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(playback = self.id, "Playback task failed: {}", e);
            }
        }
    }
}

/// Start playing `schedule` now. Cues are sent on `tx` as they fall due.
pub fn play(schedule: Schedule, tx: mpsc::UnboundedSender<Cue>) -> PlaybackHandle {
    let id = NEXT_PLAYBACK_ID.fetch_add(1, Ordering::Relaxed);
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let task = tokio::spawn(run(id, schedule, tx, cancel_rx));
    PlaybackHandle {
        id,
        cancel_tx: Some(cancel_tx),
        task: Some(task),
    }
}

/// Latest offset a cue is scheduled at; later times (including infinity)
/// saturate to it.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn due_offset(at_ms: f64) -> Duration {
    Duration::try_from_secs_f64(at_ms.max(0.0) / 1000.0)
        .map(|offset| offset.min(FAR_FUTURE))
        .unwrap_or(FAR_FUTURE)
}

async fn run(
    id: u64,
    schedule: Schedule,
    tx: mpsc::UnboundedSender<Cue>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let start = Instant::now();
    let mut indicator_on = false;
    debug!(
        playback = id,
        mode = %schedule.mode,
        events = schedule.events.len(),
        "Playback started"
    );

    for event in schedule.events {
        let due = start + due_offset(event.at_ms());
        tokio::select! {
            biased;
            // Fires on cancel() and when the handle is dropped
            _ = &mut cancel_rx => {
                if indicator_on {
                    let at_ms = start.elapsed().as_secs_f64() * 1000.0;
                    let _ = tx.send(Cue {
                        playback: id,
                        event: ScheduleEvent::Indicator { at_ms, on: false },
                    });
                }
                return;
            }
            _ = tokio::time::sleep_until(due) => {}
        }

        if let ScheduleEvent::Indicator { on, .. } = event {
            indicator_on = on;
        }
        if tx.send(Cue { playback: id, event }).is_err() {
            debug!(playback = id, "Cue receiver dropped, stopping playback");
            return;
        }
    }

    debug!(playback = id, "Playback complete");
}

// ── Transcript (consumer side) ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Bot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: String,
}

/// Displayed messages and typing indicator, mutated only by cues from the
/// current playback.
#[derive(Debug, Default)]
pub struct Transcript {
    pub messages: Vec<TranscriptEntry>,
    pub typing: bool,
    current: Option<PlaybackHandle>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, speaker: Speaker, text: String) {
        self.messages.push(TranscriptEntry {
            speaker,
            text,
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
    }

    pub fn push_user(&mut self, text: &str) {
        self.push(Speaker::User, text.to_string());
    }

    /// Start playing `schedule`, superseding any playback still in flight.
    pub fn begin(&mut self, schedule: Schedule, tx: &mpsc::UnboundedSender<Cue>) -> u64 {
        if self.cancel() {
            info!("New reply supersedes in-flight reveal");
        }
        let handle = play(schedule, tx.clone());
        let id = handle.id();
        self.current = Some(handle);
        id
    }

    /// Cancel the in-flight playback. Returns true if one was still running.
    pub fn cancel(&mut self) -> bool {
        self.typing = false;
        match self.current.take() {
            Some(mut handle) => {
                let running = !handle.is_finished();
                handle.cancel();
                running
            }
            None => false,
        }
    }

    /// The request that would have produced a reply failed: nothing is
    /// appended and the indicator goes off.
    pub fn fail(&mut self) {
        self.cancel();
    }

    pub fn current_playback(&self) -> Option<u64> {
        self.current.as_ref().map(|h| h.id())
    }

    pub fn is_playing(&self) -> bool {
        self.current.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Apply a cue. Cues from superseded playbacks are ignored; returns
    /// whether the cue was applied.
    pub fn apply(&mut self, cue: Cue) -> bool {
        if self.current_playback() != Some(cue.playback) {
            debug!(playback = cue.playback, "Ignoring stale cue");
            return false;
        }
        match cue.event {
            ScheduleEvent::Reveal { message, .. } => self.push(Speaker::Bot, message),
            ScheduleEvent::Indicator { on, .. } => self.typing = on,
        }
        true
    }

    pub fn bot_messages(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.speaker == Speaker::Bot)
            .map(|m| m.text.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{schedule_instant, schedule_segments};
    use crate::types::{ScheduleMode, Segment};

    fn seg(content: &str, writing_delay: f64, inter_segment_delay: f64) -> Segment {
        Segment {
            content: content.to_string(),
            writing_delay,
            inter_segment_delay,
        }
    }

    fn two_segment_schedule() -> Schedule {
        // on 1000, A 2000, off 2000, on 2500, B 4500, off 4500
        schedule_segments(&[seg("A", 1.0, 0.5), seg("B", 2.0, 0.0)], 1.0, 1.0, 0.0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cues_arrive_on_time_and_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = Instant::now();
        let mut handle = play(two_segment_schedule(), tx);

        let mut seen = Vec::new();
        while let Some(cue) = rx.recv().await {
            assert_eq!(cue.playback, handle.id());
            let elapsed_ms = start.elapsed().as_millis() as f64;
            assert!(
                (elapsed_ms - cue.event.at_ms()).abs() <= 1.0,
                "cue at {} fired at {}",
                cue.event.at_ms(),
                elapsed_ms
            );
            seen.push(cue.event);
        }
        handle.finished().await;

        assert_eq!(seen.len(), 6);
        assert_eq!(seen, two_segment_schedule().events);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_pending_cues_and_hides_indicator() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = play(two_segment_schedule(), tx);

        // First cue: indicator on at 1000ms
        let first = rx.recv().await.unwrap();
        assert_eq!(first.event, ScheduleEvent::Indicator { at_ms: 1_000.0, on: true });

        handle.cancel();
        let last = rx.recv().await.unwrap();
        assert!(matches!(last.event, ScheduleEvent::Indicator { on: false, .. }));
        // Task exits and drops its sender
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_due_offset_saturates() {
        assert_eq!(due_offset(-5.0), Duration::ZERO);
        assert_eq!(due_offset(f64::NAN), Duration::ZERO);
        assert_eq!(due_offset(1_500.0), Duration::from_millis(1_500));
        assert_eq!(due_offset(f64::INFINITY), FAR_FUTURE);
        assert_eq!(due_offset(1e300), FAR_FUTURE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_cue_still_cancels_cleanly() {
        let schedule = Schedule {
            mode: ScheduleMode::Legacy,
            playback_start_ms: 0.0,
            events: vec![
                ScheduleEvent::Indicator { at_ms: 0.0, on: true },
                ScheduleEvent::Reveal { at_ms: f64::INFINITY, message: "late".into() },
                ScheduleEvent::Indicator { at_ms: f64::INFINITY, on: false },
            ],
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = play(schedule, tx);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event, ScheduleEvent::Indicator { at_ms: 0.0, on: true });

        handle.cancel();
        let last = rx.recv().await.unwrap();
        assert!(matches!(last.event, ScheduleEvent::Indicator { on: false, .. }));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_cancels() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = play(two_segment_schedule(), tx);
        drop(handle);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transcript_plays_full_reply() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transcript = Transcript::new();
        transcript.push_user("hello?");
        transcript.begin(two_segment_schedule(), &tx);
        drop(tx);

        let mut typing_seen = false;
        while let Some(cue) = rx.recv().await {
            assert!(transcript.apply(cue));
            typing_seen |= transcript.typing;
        }
        assert!(typing_seen);
        assert!(!transcript.typing);
        assert_eq!(transcript.bot_messages(), vec!["A", "B"]);
        assert_eq!(transcript.messages[0].speaker, Speaker::User);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_reply_supersedes_in_flight_playback() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transcript = Transcript::new();
        let first = transcript.begin(two_segment_schedule(), &tx);

        // Play until "A" is shown
        loop {
            let cue = rx.recv().await.unwrap();
            let is_a = matches!(&cue.event, ScheduleEvent::Reveal { message, .. } if message == "A");
            transcript.apply(cue);
            if is_a {
                break;
            }
        }
        assert_eq!(transcript.bot_messages(), vec!["A"]);

        let second = transcript.begin(schedule_instant(&["X".to_string()]), &tx);
        assert_ne!(first, second);
        assert!(!transcript.typing);
        drop(tx);

        let mut stale = 0;
        while let Some(cue) = rx.recv().await {
            if !transcript.apply(cue) {
                stale += 1;
            }
        }
        // "B" from the first reply never appears
        assert_eq!(transcript.bot_messages(), vec!["A", "X"]);
        assert!(!transcript.typing);
        assert!(stale <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_leaves_indicator_off() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transcript = Transcript::new();
        transcript.begin(two_segment_schedule(), &tx);
        drop(tx);

        let cue = rx.recv().await.unwrap();
        transcript.apply(cue);
        assert!(transcript.typing);

        transcript.fail();
        assert!(!transcript.typing);
        assert!(!transcript.is_playing());
        while let Some(cue) = rx.recv().await {
            assert!(!transcript.apply(cue));
        }
        assert!(transcript.bot_messages().is_empty());
    }
}
