//! Fixed-length period windows that form the builder grid's row axis.

use serde::Serialize;
use std::iter::FusedIterator;

use super::clock::ClockTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodSlot {
    pub start: ClockTime,
    pub end: ClockTime,
}

pub const DEFAULT_DAY_START: ClockTime = ClockTime::at(8, 0);
pub const DEFAULT_DAY_END: ClockTime = ClockTime::at(14, 40);
pub const DEFAULT_PERIOD_MINUTES: u16 = 40;

/// Bounds of the teaching day and the length of one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodConfig {
    pub day_start: ClockTime,
    pub day_end: ClockTime,
    pub period_minutes: u16,
}

impl PeriodConfig {
    pub fn slots(&self) -> Slots {
        generate_slots(self.day_start, self.day_end, self.period_minutes)
    }
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self {
            day_start: DEFAULT_DAY_START,
            day_end: DEFAULT_DAY_END,
            period_minutes: DEFAULT_PERIOD_MINUTES,
        }
    }
}

/// Walks the day in `period_minutes` steps. A slot is produced only when it
/// ends at or before `day_end`; a partial trailing period is dropped.
pub fn generate_slots(day_start: ClockTime, day_end: ClockTime, period_minutes: u16) -> Slots {
    Slots {
        next: day_start,
        day_end,
        period_minutes,
    }
}

/// Restartable: clone it to walk the same day again.
#[derive(Debug, Clone)]
pub struct Slots {
    next: ClockTime,
    day_end: ClockTime,
    period_minutes: u16,
}

impl Iterator for Slots {
    type Item = PeriodSlot;

    fn next(&mut self) -> Option<PeriodSlot> {
        if self.period_minutes == 0 {
            return None;
        }
        let end = self.next.checked_add_minutes(self.period_minutes)?;
        if end > self.day_end {
            return None;
        }
        let slot = PeriodSlot {
            start: self.next,
            end,
        };
        self.next = end;
        Some(slot)
    }
}

impl FusedIterator for Slots {}
