pub mod builder;
pub mod calendar;
pub mod core;
pub mod exchange;
pub mod setup;
pub mod timetable;
