use thiserror::Error;

/// Failures raised by the timetable model before anything reaches the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimetableError {
    /// Not an `HH:MM` (or `HH:MM:SS`) wall-clock time
    #[error("invalid time {value:?}, expected HH:MM")]
    BadTime { value: String },

    /// Not one of the configured school days
    #[error("unknown school day {value:?}")]
    BadDay { value: String },

    #[error("subject must not be empty")]
    EmptySubject,

    #[error("end time {end} must be after start time {start}")]
    InvalidRange { start: String, end: String },

    /// Submit attempted with an empty pending list
    #[error("at least one timetable entry is required")]
    NoEntries,

    #[error("a save is already in progress")]
    SaveInFlight,
}

impl TimetableError {
    /// Stable machine-readable code used in IPC error responses.
    pub fn code(&self) -> &'static str {
        match self {
            TimetableError::BadTime { .. } => "bad_time",
            TimetableError::BadDay { .. } => "bad_day",
            TimetableError::EmptySubject => "empty_subject",
            TimetableError::InvalidRange { .. } => "invalid_range",
            TimetableError::NoEntries => "no_entries",
            TimetableError::SaveInFlight => "save_in_flight",
        }
    }
}
