use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::clock::ClockTime;
use super::day::SchoolDay;
use super::error::TimetableError;

/// One scheduled class occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub day: SchoolDay,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<String>,
}

/// Compound key that identifies an entry within one grade's timetable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub day: SchoolDay,
    pub start_time: ClockTime,
}

impl ScheduleEntry {
    pub fn new(
        day: SchoolDay,
        start_time: ClockTime,
        end_time: ClockTime,
        subject: &str,
    ) -> Result<Self, TimetableError> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(TimetableError::EmptySubject);
        }
        if end_time <= start_time {
            return Err(TimetableError::InvalidRange {
                start: start_time.to_string(),
                end: end_time.to_string(),
            });
        }
        Ok(Self {
            day,
            start_time,
            end_time,
            subject: subject.to_string(),
            grade_level: None,
        })
    }

    pub fn with_grade_level(mut self, grade_level: impl Into<String>) -> Self {
        self.grade_level = Some(grade_level.into());
        self
    }

    pub fn key(&self) -> SlotKey {
        SlotKey {
            day: self.day,
            start_time: self.start_time,
        }
    }

    pub fn duration_minutes(&self) -> u16 {
        self.end_time.minutes().saturating_sub(self.start_time.minutes())
    }

    /// Same day and intersecting half-open ranges. Touching ranges do not overlap.
    pub fn overlaps(&self, other: &ScheduleEntry) -> bool {
        self.day == other.day
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }
}

/// Pair of entries that share time on the same day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlap {
    pub day: SchoolDay,
    pub first: String,
    pub second: String,
    pub first_start: ClockTime,
    pub second_start: ClockTime,
}

/// Entries bucketed by day, each bucket sorted by start time. Every school
/// day is present even when empty.
pub fn group_by_day(entries: &[ScheduleEntry]) -> BTreeMap<SchoolDay, Vec<ScheduleEntry>> {
    let mut out: BTreeMap<SchoolDay, Vec<ScheduleEntry>> =
        SchoolDay::ALL.iter().map(|d| (*d, Vec::new())).collect();
    for e in entries {
        out.entry(e.day).or_default().push(e.clone());
    }
    for bucket in out.values_mut() {
        bucket.sort_by_key(|e| (e.start_time, e.end_time));
    }
    out
}

/// Overlapping pairs are reported, never resolved.
pub fn find_overlaps(entries: &[ScheduleEntry]) -> Vec<Overlap> {
    let mut out = Vec::new();
    for (day, bucket) in group_by_day(entries) {
        for (i, a) in bucket.iter().enumerate() {
            for b in &bucket[i + 1..] {
                if a.overlaps(b) {
                    out.push(Overlap {
                        day,
                        first: a.subject.clone(),
                        second: b.subject.clone(),
                        first_start: a.start_time,
                        second_start: b.start_time,
                    });
                }
            }
        }
    }
    out
}
