//! ScheduleEvent enum: the instruction stream handed to renderers.

use serde::{Deserialize, Serialize};

/// One timed instruction for the transcript renderer or the typing indicator.
///
/// `at_ms` is relative to the moment playback of the schedule starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScheduleEvent {
    /// Append `message` to the visible transcript.
    Reveal {
        #[serde(rename = "atMs")]
        at_ms: f64,
        message: String,
    },

    /// Show or hide the typing indicator.
    Indicator {
        #[serde(rename = "atMs")]
        at_ms: f64,
        on: bool,
    },
}

impl ScheduleEvent {
    pub fn at_ms(&self) -> f64 {
        match self {
            ScheduleEvent::Reveal { at_ms, .. } | ScheduleEvent::Indicator { at_ms, .. } => *at_ms,
        }
    }

    pub fn is_reveal(&self) -> bool {
        matches!(self, ScheduleEvent::Reveal { .. })
    }

    /// Serialize to the JSON format the frontend expects:
    /// `{"type": "reveal", "atMs": 120.0, "message": "..."}`
    pub fn to_ws_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
