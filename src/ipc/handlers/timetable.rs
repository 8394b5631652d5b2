use crate::db;
use crate::ipc::error::{err, ok, validation_err};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{db_conn, grade_level_param};
use crate::ipc::types::{AppState, Request};
use crate::timetable::{
    find_overlaps, group_by_day, validate_bulk_replace, FieldErrors, ScheduleEntry, SchoolDay,
};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub(crate) enum SaveFailure {
    Invalid(FieldErrors),
    Store(anyhow::Error),
}

impl SaveFailure {
    pub(crate) fn response(self, id: &str) -> Value {
        match self {
            SaveFailure::Invalid(fields) => validation_err(id, &fields),
            SaveFailure::Store(e) => err(id, "db_update_failed", format!("{e:#}"), None),
        }
    }
}

/// Validates a `{grade_level, classes}` payload and, only if every field
/// passes, replaces the stored timetable for that grade.
pub(crate) fn persist_bulk_replace(
    conn: &Connection,
    payload: &Value,
) -> Result<(String, Vec<ScheduleEntry>), SaveFailure> {
    let validated = validate_bulk_replace(payload).map_err(|fields| {
        tracing::warn!(fields = fields.len(), "bulk replace rejected");
        SaveFailure::Invalid(fields)
    })?;
    db::replace_timetable(conn, &validated.grade_level, &validated.entries)
        .map_err(SaveFailure::Store)?;
    Ok((validated.grade_level, validated.entries))
}

/// `{ "Monday": [...], ... }` with days in week order.
pub(crate) fn by_day_json<T: Serialize>(grouped: BTreeMap<SchoolDay, Vec<T>>) -> Value {
    let mut out = Map::new();
    for (day, items) in grouped {
        out.insert(day.as_str().to_string(), json!(items));
    }
    Value::Object(out)
}

pub(crate) fn saved_json(grade_level: &str, entries: &[ScheduleEntry]) -> Value {
    json!({
        "gradeLevel": grade_level,
        "saved": entries.len(),
        "overlaps": find_overlaps(entries),
    })
}

fn handle_slots(state: &mut AppState, req: &Request) -> Value {
    let periods = match setup::load_periods(state.db.as_ref()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let slots: Vec<_> = periods.period_config().slots().collect();
    ok(
        &req.id,
        json!({
            "dayStart": periods.day_start,
            "dayEnd": periods.day_end,
            "periodMinutes": periods.period_minutes,
            "days": periods.days,
            "slots": slots
        }),
    )
}

fn handle_grade_levels(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "gradeLevels": [] }));
    };
    match db::list_grade_levels(conn) {
        Ok(rows) => {
            let grade_levels: Vec<_> = rows
                .into_iter()
                .map(|r| {
                    json!({
                        "gradeLevel": r.grade_level,
                        "entryCount": r.entry_count,
                        "updatedAt": r.updated_at
                    })
                })
                .collect();
            ok(&req.id, json!({ "gradeLevels": grade_levels }))
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let grade_level = match grade_level_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let entries = match db::load_timetable(conn, &grade_level) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(
        &req.id,
        json!({
            "gradeLevel": grade_level,
            "days": by_day_json(group_by_day(&entries)),
            "overlaps": find_overlaps(&entries)
        }),
    )
}

fn handle_save(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match persist_bulk_replace(conn, &req.params) {
        Ok((grade_level, entries)) => ok(&req.id, saved_json(&grade_level, &entries)),
        Err(failure) => failure.response(&req.id),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let grade_level = match grade_level_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::delete_timetable(conn, &grade_level) {
        Ok(0) => err(
            &req.id,
            "not_found",
            "no timetable for grade level",
            Some(json!({ "gradeLevel": grade_level })),
        ),
        Ok(removed) => {
            tracing::info!(grade_level = %grade_level, removed, "timetable deleted");
            ok(&req.id, json!({ "gradeLevel": grade_level, "removed": removed }))
        }
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "timetable.slots" => Some(handle_slots(state, req)),
        "timetable.gradeLevels" => Some(handle_grade_levels(state, req)),
        "timetable.get" => Some(handle_get(state, req)),
        "timetable.save" => Some(handle_save(state, req)),
        "timetable.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
