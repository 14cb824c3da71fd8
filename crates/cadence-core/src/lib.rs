//! cadence-core: Pure domain logic, no UI.
//!
//! This crate contains the humanlike reply-delay scheduler, the delay
//! planner that produces its input, and the playback engine that turns a
//! schedule into timed cues. Frontends (TUI, Web) consume cues over a
//! tokio channel.

pub mod chunker;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod planner;
pub mod player;
pub mod scheduler;
pub mod types;

pub use error::PayloadError;
pub use events::ScheduleEvent;
pub use types::{ResponsePayload, Schedule};
