use rusqlite::Connection;

use crate::ipc::error::{err, timetable_err};
use crate::ipc::types::{AppState, Request};
use crate::timetable::{ClockTime, SchoolDay};

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

pub fn required_day(req: &Request, key: &str) -> Result<SchoolDay, serde_json::Value> {
    let raw = required_str(req, key)?;
    SchoolDay::parse(&raw).map_err(|e| timetable_err(&req.id, &e))
}

pub fn required_time(req: &Request, key: &str) -> Result<ClockTime, serde_json::Value> {
    let raw = required_str(req, key)?;
    ClockTime::parse(&raw).map_err(|e| timetable_err(&req.id, &e))
}

/// Grade level accepted as either `gradeLevel` or `grade_level`.
pub fn grade_level_param(req: &Request) -> Result<String, serde_json::Value> {
    required_str(req, "gradeLevel").or_else(|_| required_str(req, "grade_level"))
}
