//! Pending-list editor behind the timetable builder grid.
//!
//! Edits accumulate in memory, keyed by `(day, start_time)`. Nothing is
//! persisted until the whole list is submitted as one bulk replace.

use serde::Serialize;

use super::clock::ClockTime;
use super::day::SchoolDay;
use super::entry::{ScheduleEntry, SlotKey};
use super::error::TimetableError;
use super::slots::PeriodSlot;

/// Payload of a full-set replace for one grade level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkReplace {
    pub grade_level: String,
    pub classes: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridCell {
    pub day: SchoolDay,
    pub entry: Option<ScheduleEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridRow {
    pub slot: PeriodSlot,
    pub cells: Vec<GridCell>,
}

/// One grade's pending list.
///
/// `begin_save` / `finish_save` bracket a store write. The daemon handles
/// requests one at a time and pairs them inside a single `builder.submit`,
/// so the in-flight flag is only ever observed by a caller that keeps a
/// save running across awaits or threads.
#[derive(Debug, Clone)]
pub struct TimetableBuilder {
    grade_level: String,
    pending: Vec<ScheduleEntry>,
    save_in_flight: bool,
}

impl TimetableBuilder {
    pub fn new(grade_level: impl Into<String>) -> Self {
        Self {
            grade_level: grade_level.into(),
            pending: Vec::new(),
            save_in_flight: false,
        }
    }

    /// Seeds the pending list from stored entries. Later duplicates of a
    /// `(day, start_time)` key win, same as repeated upserts.
    pub fn with_entries(grade_level: impl Into<String>, entries: Vec<ScheduleEntry>) -> Self {
        let mut builder = Self::new(grade_level);
        for e in entries {
            builder.remove(e.day, e.start_time);
            builder.pending.push(e);
        }
        builder
    }

    pub fn grade_level(&self) -> &str {
        &self.grade_level
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_saving(&self) -> bool {
        self.save_in_flight
    }

    pub fn find(&self, day: SchoolDay, start_time: ClockTime) -> Option<&ScheduleEntry> {
        self.pending
            .iter()
            .find(|e| e.key() == SlotKey { day, start_time })
    }

    /// Replaces whatever occupies `(day, start_time)`. On error the pending
    /// list is left untouched.
    pub fn upsert(
        &mut self,
        day: SchoolDay,
        start_time: ClockTime,
        end_time: ClockTime,
        subject: &str,
    ) -> Result<&ScheduleEntry, TimetableError> {
        let entry = ScheduleEntry::new(day, start_time, end_time, subject)?
            .with_grade_level(self.grade_level.clone());
        self.remove(day, start_time);
        self.pending.push(entry);
        Ok(&self.pending[self.pending.len() - 1])
    }

    /// Returns whether an entry was removed.
    pub fn remove(&mut self, day: SchoolDay, start_time: ClockTime) -> bool {
        let before = self.pending.len();
        self.pending
            .retain(|e| e.key() != SlotKey { day, start_time });
        self.pending.len() != before
    }

    pub fn submission(&self) -> Result<BulkReplace, TimetableError> {
        if self.pending.is_empty() {
            return Err(TimetableError::NoEntries);
        }
        Ok(BulkReplace {
            grade_level: self.grade_level.clone(),
            classes: self.pending.clone(),
        })
    }

    /// Marks a save as in flight and hands out the payload. Every successful
    /// call must be paired with `finish_save`.
    pub fn begin_save(&mut self) -> Result<BulkReplace, TimetableError> {
        if self.save_in_flight {
            return Err(TimetableError::SaveInFlight);
        }
        let payload = self.submission()?;
        self.save_in_flight = true;
        Ok(payload)
    }

    pub fn finish_save(&mut self) {
        self.save_in_flight = false;
    }

    pub fn grid<I>(&self, slots: I, days: &[SchoolDay]) -> Vec<GridRow>
    where
        I: IntoIterator<Item = PeriodSlot>,
    {
        slots
            .into_iter()
            .map(|slot| GridRow {
                slot,
                cells: days
                    .iter()
                    .map(|day| GridCell {
                        day: *day,
                        entry: self.find(*day, slot.start).cloned(),
                    })
                    .collect(),
            })
            .collect()
    }
}
