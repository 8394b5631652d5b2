use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::timetable::{ClockTime, ScheduleEntry, SchoolDay, ValidatedTimetable};

pub const DB_FILE_NAME: &str = "timetable.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_entries(
            id TEXT PRIMARY KEY,
            grade_level TEXT NOT NULL,
            day TEXT NOT NULL,
            day_index INTEGER NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            subject TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(grade_level, day, start_time)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_entries_grade ON timetable_entries(grade_level)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_entries_grade_day ON timetable_entries(grade_level, day_index, start_time)",
        [],
    )?;

    debug!(path = %db_path.display(), "workspace database ready");
    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("settings {} is not valid JSON", key))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn day_index(day: SchoolDay) -> i64 {
    SchoolDay::ALL
        .iter()
        .position(|d| *d == day)
        .unwrap_or_default() as i64
}

/// Delete-then-insert for one grade. Runs on whatever transaction the
/// caller holds.
fn write_grade(conn: &Connection, grade_level: &str, entries: &[ScheduleEntry]) -> anyhow::Result<usize> {
    let removed = conn.execute(
        "DELETE FROM timetable_entries WHERE grade_level = ?",
        [grade_level],
    )?;

    let now = chrono::Utc::now().to_rfc3339();
    let mut stmt = conn.prepare(
        "INSERT INTO timetable_entries(
           id, grade_level, day, day_index, start_time, end_time, subject, sort_order, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    for (i, e) in entries.iter().enumerate() {
        stmt.execute((
            Uuid::new_v4().to_string(),
            grade_level,
            e.day.as_str(),
            day_index(e.day),
            e.start_time.to_string(),
            e.end_time.to_string(),
            &e.subject,
            i as i64,
            &now,
        ))
        .with_context(|| format!("failed to insert entry {} ({} {})", i, e.day, e.start_time))?;
    }
    Ok(removed)
}

/// Replaces every entry of `grade_level` in one transaction.
pub fn replace_timetable(
    conn: &Connection,
    grade_level: &str,
    entries: &[ScheduleEntry],
) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let removed = write_grade(&tx, grade_level, entries)?;
    tx.commit()?;

    info!(grade_level, removed, saved = entries.len(), "timetable replaced");
    Ok(entries.len())
}

/// Replaces several grades and settings keys atomically. Grades not named
/// in `timetables` are left alone.
pub fn import_timetables(
    conn: &Connection,
    timetables: &[ValidatedTimetable],
    settings: &[(&str, serde_json::Value)],
) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut saved = 0;
    for t in timetables {
        write_grade(&tx, &t.grade_level, &t.entries)
            .with_context(|| format!("failed to import grade level {}", t.grade_level))?;
        saved += t.entries.len();
    }
    for (key, value) in settings {
        settings_set_json(&tx, key, value)?;
    }
    tx.commit()?;

    info!(grades = timetables.len(), saved, settings = settings.len(), "timetables imported");
    Ok(saved)
}

pub fn load_timetable(conn: &Connection, grade_level: &str) -> anyhow::Result<Vec<ScheduleEntry>> {
    let mut stmt = conn.prepare(
        "SELECT day, start_time, end_time, subject
         FROM timetable_entries
         WHERE grade_level = ?
         ORDER BY day_index, start_time, sort_order",
    )?;
    let rows = stmt
        .query_map([grade_level], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(rows.len());
    for (day, start, end, subject) in rows {
        let entry = ScheduleEntry {
            day: SchoolDay::parse(&day)?,
            start_time: ClockTime::parse(&start)?,
            end_time: ClockTime::parse(&end)?,
            subject,
            grade_level: Some(grade_level.to_string()),
        };
        out.push(entry);
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeLevelSummary {
    pub grade_level: String,
    pub entry_count: i64,
    pub updated_at: Option<String>,
}

pub fn list_grade_levels(conn: &Connection) -> anyhow::Result<Vec<GradeLevelSummary>> {
    let mut stmt = conn.prepare(
        "SELECT grade_level, COUNT(*), MAX(updated_at)
         FROM timetable_entries
         GROUP BY grade_level
         ORDER BY grade_level",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(GradeLevelSummary {
                grade_level: r.get(0)?,
                entry_count: r.get(1)?,
                updated_at: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_timetable(conn: &Connection, grade_level: &str) -> anyhow::Result<usize> {
    let removed = conn.execute(
        "DELETE FROM timetable_entries WHERE grade_level = ?",
        [grade_level],
    )?;
    Ok(removed)
}
