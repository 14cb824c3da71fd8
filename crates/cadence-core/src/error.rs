//! Payload validation errors.

use thiserror::Error;

/// Reasons a response payload cannot be turned into a delivery plan.
///
/// Only the segmented shape can fail: legacy payloads always degrade to
/// per-field defaults.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("delay_config.response_segments present but reading_time is missing")]
    MissingReadingTime,

    #[error("delay_config.response_segments present but min_reading_delay is missing")]
    MissingMinReadingDelay,

    #[error("{field} must be between 0 and 86400 seconds (got {value})")]
    InvalidTiming { field: String, value: f64 },
}
