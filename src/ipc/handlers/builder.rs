use crate::db;
use crate::ipc::error::{err, ok, timetable_err};
use crate::ipc::handlers::setup;
use crate::ipc::handlers::timetable::{persist_bulk_replace, saved_json};
use crate::ipc::helpers::{grade_level_param, required_day, required_time};
use crate::ipc::types::{AppState, Request};
use crate::timetable::{find_overlaps, ClockTime, TimetableBuilder, TimetableError};
use serde_json::{json, Value};

fn no_session(req: &Request) -> Value {
    err(&req.id, "no_session", "open a builder session first", None)
}

fn handle_open(state: &mut AppState, req: &Request) -> Value {
    let grade_level = match grade_level_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let existing = match state.db.as_ref() {
        Some(conn) => match db::load_timetable(conn, &grade_level) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        None => Vec::new(),
    };
    let builder = TimetableBuilder::with_entries(grade_level.clone(), existing);
    let pending = builder.len();
    if state.builder.replace(builder).is_some() {
        tracing::debug!("previous builder session replaced");
    }
    tracing::info!(grade_level = %grade_level, pending, "builder opened");
    ok(
        &req.id,
        json!({ "gradeLevel": grade_level, "pending": pending }),
    )
}

fn handle_grid(state: &mut AppState, req: &Request) -> Value {
    let periods = match setup::load_periods(state.db.as_ref()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(builder) = state.builder.as_ref() else {
        return no_session(req);
    };
    let rows = builder.grid(periods.period_config().slots(), &periods.days);
    ok(
        &req.id,
        json!({
            "gradeLevel": builder.grade_level(),
            "days": periods.days,
            "rows": rows,
            "pending": builder.len(),
            "canSubmit": !builder.is_empty() && !builder.is_saving(),
            "overlaps": find_overlaps(builder.entries())
        }),
    )
}

fn handle_find(state: &mut AppState, req: &Request) -> Value {
    let Some(builder) = state.builder.as_ref() else {
        return no_session(req);
    };
    let day = match required_day(req, "day") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let start = match required_time(req, "startTime") {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(&req.id, json!({ "entry": builder.find(day, start) }))
}

/// A missing `endTime` means "one period from `startTime`".
fn resolve_end_time(
    state: &AppState,
    req: &Request,
    start: ClockTime,
) -> Result<ClockTime, Value> {
    if req.params.get("endTime").map_or(false, |v| !v.is_null()) {
        return required_time(req, "endTime");
    }
    let periods = setup::load_periods(state.db.as_ref())
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    start
        .checked_add_minutes(periods.period_minutes)
        .ok_or_else(|| {
            timetable_err(
                &req.id,
                &TimetableError::InvalidRange {
                    start: start.to_string(),
                    end: "24:00".to_string(),
                },
            )
        })
}

fn handle_upsert(state: &mut AppState, req: &Request) -> Value {
    if state.builder.is_none() {
        return no_session(req);
    }
    let day = match required_day(req, "day") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let start = match required_time(req, "startTime") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let end = match resolve_end_time(state, req, start) {
        Ok(v) => v,
        Err(e) => return e,
    };
    // Empty subject is a guard failure, not a missing param.
    let subject = req
        .params
        .get("subject")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    let Some(builder) = state.builder.as_mut() else {
        return no_session(req);
    };
    let entry = match builder.upsert(day, start, end, subject) {
        Ok(e) => e.clone(),
        Err(e) => return timetable_err(&req.id, &e),
    };
    tracing::debug!(day = %day, start = %start, subject = %entry.subject, "cell upserted");
    ok(
        &req.id,
        json!({ "entry": entry, "pending": builder.len() }),
    )
}

fn handle_remove(state: &mut AppState, req: &Request) -> Value {
    let Some(builder) = state.builder.as_mut() else {
        return no_session(req);
    };
    let day = match required_day(req, "day") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let start = match required_time(req, "startTime") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let removed = builder.remove(day, start);
    ok(
        &req.id,
        json!({ "removed": removed, "pending": builder.len() }),
    )
}

fn handle_submit(state: &mut AppState, req: &Request) -> Value {
    let Some(builder) = state.builder.as_mut() else {
        return no_session(req);
    };
    // Guards run before the store is touched.
    let payload = match builder.begin_save() {
        Ok(p) => p,
        Err(e) => return timetable_err(&req.id, &e),
    };
    let Some(conn) = state.db.as_ref() else {
        builder.finish_save();
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let result = serde_json::to_value(&payload)
        .map_err(|e| err(&req.id, "internal", e.to_string(), None))
        .and_then(|body| persist_bulk_replace(conn, &body).map_err(|f| f.response(&req.id)));
    builder.finish_save();

    match result {
        Ok((grade_level, entries)) => {
            let mut resp = saved_json(&grade_level, &entries);
            resp["pending"] = json!(builder.len());
            ok(&req.id, resp)
        }
        Err(resp) => resp,
    }
}

fn handle_close(state: &mut AppState, req: &Request) -> Value {
    let closed = state.builder.take();
    ok(
        &req.id,
        json!({
            "closed": closed.is_some(),
            "discarded": closed.map(|b| b.len()).unwrap_or(0)
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "builder.open" => Some(handle_open(state, req)),
        "builder.grid" => Some(handle_grid(state, req)),
        "builder.find" => Some(handle_find(state, req)),
        "builder.upsert" => Some(handle_upsert(state, req)),
        "builder.remove" => Some(handle_remove(state, req)),
        "builder.submit" => Some(handle_submit(state, req)),
        "builder.close" => Some(handle_close(state, req)),
        _ => None,
    }
}
