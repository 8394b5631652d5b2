use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::handlers::timetable::by_day_json;
use crate::ipc::helpers::{db_conn, grade_level_param};
use crate::ipc::types::{AppState, Request};
use crate::timetable::entry::find_overlaps;
use crate::timetable::layout::{group_by_subject, PALETTE};
use serde_json::{json, Value};

fn handle_week(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let grade_level = match grade_level_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (calendar, periods) = match (
        setup::load_calendar(Some(conn)),
        setup::load_periods(Some(conn)),
    ) {
        (Ok(c), Ok(p)) => (c, p),
        (Err(e), _) | (_, Err(e)) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let entries = match db::load_timetable(conn, &grade_level) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut week = calendar.week(&entries);
    week.retain(|day, _| periods.days.contains(day));

    ok(
        &req.id,
        json!({
            "gradeLevel": grade_level,
            "hours": calendar.hour_labels(),
            "hourRowHeight": calendar.hour_row_height,
            "pixelsPerMinute": calendar.pixels_per_minute(),
            "columnHeight": calendar.column_height(),
            "palette": PALETTE,
            "days": by_day_json(week),
            "overlaps": find_overlaps(&entries)
        }),
    )
}

fn handle_subjects(state: &mut AppState, req: &Request) -> Value {
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

    let subjects: Vec<_> = group_by_subject(&entries, &grade_level)
        .into_iter()
        .map(|(subject, group)| {
            json!({
                "subject": subject,
                "gradeLevel": group.grade_level,
                "colorIndex": group.color_index,
                "color": PALETTE[group.color_index],
                "occurrences": group.occurrences
            })
        })
        .collect();
    ok(
        &req.id,
        json!({ "gradeLevel": grade_level, "subjects": subjects }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "calendar.week" => Some(handle_week(state, req)),
        "calendar.subjects" => Some(handle_subjects(state, req)),
        _ => None,
    }
}
