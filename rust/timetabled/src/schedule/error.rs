use thiserror::Error;

use super::model::ClockTime;

/// Errors raised by the layout engine. Each one rejects a single record or
/// request; none of them leaves shared state half-updated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    /// End time is not strictly after the start time.
    #[error("event {id}: end time {end} is not after start time {start}")]
    InvalidRange {
        id: String,
        start: ClockTime,
        end: ClockTime,
    },

    #[error("invalid time of day: {0:?} (expected HH:MM)")]
    InvalidTime(String),

    #[error("unknown day label: {0:?}")]
    UnknownDay(String),

    #[error("palette must contain at least one color")]
    InvalidPalette,

    #[error("invalid layout settings: {0}")]
    InvalidSettings(String),

    #[error("invalid schedule payload: {0}")]
    InvalidPayload(String),
}

impl ScheduleError {
    /// Stable error code used in IPC error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            ScheduleError::InvalidRange { .. } => "invalid_range",
            ScheduleError::InvalidTime(_) => "invalid_time",
            ScheduleError::UnknownDay(_) => "unknown_day",
            ScheduleError::InvalidPalette => "invalid_palette",
            ScheduleError::InvalidSettings(_) => "invalid_settings",
            ScheduleError::InvalidPayload(_) => "invalid_payload",
        }
    }
}
