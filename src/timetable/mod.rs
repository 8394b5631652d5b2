//! Timetable grid model shared by the builder grid and the weekly viewer.

pub mod builder;
pub mod clock;
pub mod day;
pub mod entry;
pub mod error;
pub mod layout;
pub mod slots;
pub mod validate;

pub use builder::{BulkReplace, TimetableBuilder};
pub use clock::ClockTime;
pub use day::SchoolDay;
pub use entry::{find_overlaps, group_by_day, ScheduleEntry};
pub use error::TimetableError;
pub use layout::CalendarConfig;
pub use slots::{generate_slots, PeriodConfig, PeriodSlot};
pub use validate::{validate_bulk_replace, FieldErrors, ValidatedTimetable};
