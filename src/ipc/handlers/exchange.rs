use crate::bundle::{self, Bundle};
use crate::db;
use crate::ipc::error::{err, ok, validation_err};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::timetable::{validate_bulk_replace, BulkReplace, FieldErrors, ValidatedTimetable};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::PathBuf;

fn requested_grades(req: &Request) -> Result<Option<Vec<String>>, Value> {
    match req.params.get("gradeLevels") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v.as_str().map(str::trim) {
                Some(s) if !s.is_empty() => Ok(s.to_string()),
                _ => Err(err(&req.id, "bad_params", "gradeLevels must contain strings", None)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(err(&req.id, "bad_params", "gradeLevels must be an array", None)),
    }
}

fn handle_export(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let wanted = match requested_grades(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let stored: Vec<String> = match db::list_grade_levels(conn) {
        Ok(rows) => rows.into_iter().map(|r| r.grade_level).collect(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let grade_levels = match wanted {
        None => stored,
        Some(mut wanted) => {
            let mut once = HashSet::new();
            wanted.retain(|g| once.insert(g.clone()));
            if let Some(missing) = wanted.iter().find(|g| !stored.contains(*g)) {
                return err(
                    &req.id,
                    "not_found",
                    "no timetable for grade level",
                    Some(json!({ "gradeLevel": missing })),
                );
            }
            wanted
        }
    };

    let mut timetables = Vec::with_capacity(grade_levels.len());
    for grade_level in &grade_levels {
        let classes = match db::load_timetable(conn, grade_level) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        let doc = BulkReplace {
            grade_level: grade_level.clone(),
            classes,
        };
        match serde_json::to_value(&doc) {
            Ok(v) => timetables.push(v),
            Err(e) => return err(&req.id, "internal", e.to_string(), None),
        }
    }
    let setup = match setup::current_sections(Some(conn)) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let summary = match bundle::write_bundle(
        &out_path,
        &Bundle {
            timetables,
            setup: Some(setup),
        },
    ) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": out_path.to_string_lossy() })),
            )
        }
    };
    tracing::info!(path = %out_path.display(), grades = summary.timetable_count, "timetable bundle exported");

    ok(
        &req.id,
        json!({
            "path": out_path.to_string_lossy(),
            "bundleFormat": summary.bundle_format,
            "gradeLevels": grade_levels,
            "fileCount": summary.file_count
        }),
    )
}

/// Runs every bundled timetable through the same checks as
/// `timetable.save`. Errors are keyed `timetables.N.<field>`.
fn validate_bundle(
    bundle: &Bundle,
) -> Result<(Vec<ValidatedTimetable>, Vec<(&'static str, Value)>), FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut seen = HashSet::new();
    let mut timetables = Vec::with_capacity(bundle.timetables.len());
    for (i, doc) in bundle.timetables.iter().enumerate() {
        match validate_bulk_replace(doc) {
            Ok(t) => {
                if !seen.insert(t.grade_level.clone()) {
                    errors.insert(
                        format!("timetables.{}.grade_level", i),
                        format!("Grade level {} appears more than once.", t.grade_level),
                    );
                }
                timetables.push(t);
            }
            Err(fields) => {
                for (k, v) in fields {
                    errors.insert(format!("timetables.{}.{}", i, k), v);
                }
            }
        }
    }

    let settings = match bundle.setup.as_ref().map(setup::validated_sections) {
        None => Vec::new(),
        Some(Ok(rows)) => rows,
        Some(Err(msg)) => {
            errors.insert("setup".to_string(), msg);
            Vec::new()
        }
    };

    if errors.is_empty() {
        Ok((timetables, settings))
    } else {
        Err(errors)
    }
}

fn handle_import(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let in_path = match required_str(req, "inPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    if !in_path.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path.to_string_lossy() })),
        );
    }

    let bundle = match bundle::read_bundle(&in_path) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "bad_bundle",
                format!("{e:#}"),
                Some(json!({ "path": in_path.to_string_lossy() })),
            )
        }
    };
    let (timetables, settings) = match validate_bundle(&bundle) {
        Ok(v) => v,
        Err(fields) => {
            tracing::warn!(fields = fields.len(), "timetable bundle rejected");
            return validation_err(&req.id, &fields);
        }
    };

    let saved = match db::import_timetables(conn, &timetables, &settings) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_update_failed", format!("{e:#}"), None),
    };
    let grade_levels: Vec<&str> = timetables.iter().map(|t| t.grade_level.as_str()).collect();
    ok(
        &req.id,
        json!({
            "gradeLevels": grade_levels,
            "saved": saved,
            "setupApplied": !settings.is_empty()
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "timetable.exportBundle" => Some(handle_export(state, req)),
        "timetable.importBundle" => Some(handle_import(state, req)),
        _ => None,
    }
}
