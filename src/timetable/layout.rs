//! Continuous-time positioning for the weekly calendar viewer.
//!
//! A day column is a vertical strip where one hour is `hour_row_height`
//! pixels tall and the top edge is `day_start_hour:00`. Overlapping blocks
//! are positioned independently and may stack on top of each other.

use serde::Serialize;
use std::collections::BTreeMap;

use super::clock::ClockTime;
use super::day::SchoolDay;
use super::entry::{group_by_day, ScheduleEntry};

pub const PALETTE: [&str; 8] = [
    "#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6", "#ec4899", "#14b8a6", "#f97316",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalendarConfig {
    pub day_start_hour: u8,
    pub day_end_hour: u8,
    pub hour_row_height: f64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            day_start_hour: 8,
            day_end_hour: 17,
            hour_row_height: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarBlock {
    pub day: SchoolDay,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub subject: String,
    pub top: f64,
    pub height: f64,
    pub color_index: usize,
    pub color: &'static str,
}

impl CalendarConfig {
    pub fn pixels_per_minute(&self) -> f64 {
        self.hour_row_height / 60.0
    }

    /// Negative for entries that begin before the first visible hour.
    pub fn top_offset(&self, entry: &ScheduleEntry) -> f64 {
        let origin = i32::from(self.day_start_hour) * 60;
        f64::from(i32::from(entry.start_time.minutes()) - origin) * self.pixels_per_minute()
    }

    pub fn height(&self, entry: &ScheduleEntry) -> f64 {
        f64::from(entry.duration_minutes()) * self.pixels_per_minute()
    }

    /// Row labels down the left edge, one per hour.
    pub fn hour_labels(&self) -> Vec<String> {
        (self.day_start_hour..self.day_end_hour)
            .map(|h| format!("{:02}:00", h))
            .collect()
    }

    pub fn column_height(&self) -> f64 {
        f64::from(self.day_end_hour.saturating_sub(self.day_start_hour)) * self.hour_row_height
    }

    pub fn block(&self, entry: &ScheduleEntry) -> CalendarBlock {
        let color_index = subject_color_index(&entry.subject, PALETTE.len());
        CalendarBlock {
            day: entry.day,
            start_time: entry.start_time,
            end_time: entry.end_time,
            subject: entry.subject.clone(),
            top: self.top_offset(entry),
            height: self.height(entry),
            color_index,
            color: PALETTE[color_index],
        }
    }

    /// One column per school day, blocks ordered by start time.
    pub fn week(&self, entries: &[ScheduleEntry]) -> BTreeMap<SchoolDay, Vec<CalendarBlock>> {
        group_by_day(entries)
            .into_iter()
            .map(|(day, bucket)| (day, bucket.iter().map(|e| self.block(e)).collect()))
            .collect()
    }
}

/// `hash = c + ((hash << 5) - hash)` over UTF-16 code units with 32-bit
/// wrapping, folded into the palette by absolute value.
pub fn subject_color_index(subject: &str, palette_len: usize) -> usize {
    if palette_len == 0 {
        return 0;
    }
    let hash = subject.encode_utf16().fold(0i32, |hash, c| {
        i32::from(c).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    });
    hash.unsigned_abs() as usize % palette_len
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub day: SchoolDay,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectGroup {
    pub grade_level: String,
    pub color_index: usize,
    pub occurrences: Vec<Occurrence>,
}

/// Groups by subject name. The same subject taught to another grade lands in
/// the same group; the viewer only ever shows one grade at a time.
pub fn group_by_subject(
    entries: &[ScheduleEntry],
    grade_level: &str,
) -> BTreeMap<String, SubjectGroup> {
    let mut out: BTreeMap<String, SubjectGroup> = BTreeMap::new();
    for e in entries {
        let group = out.entry(e.subject.clone()).or_insert_with(|| SubjectGroup {
            grade_level: e
                .grade_level
                .clone()
                .unwrap_or_else(|| grade_level.to_string()),
            color_index: subject_color_index(&e.subject, PALETTE.len()),
            occurrences: Vec::new(),
        });
        group.occurrences.push(Occurrence {
            day: e.day,
            start_time: e.start_time,
            end_time: e.end_time,
        });
    }
    for group in out.values_mut() {
        group.occurrences.sort_by_key(|o| (o.day, o.start_time));
    }
    out
}
