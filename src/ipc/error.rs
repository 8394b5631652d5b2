use serde_json::json;

use crate::timetable::{FieldErrors, TimetableError};

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn timetable_err(id: &str, e: &TimetableError) -> serde_json::Value {
    err(id, e.code(), e.to_string(), None)
}

/// Field-level rejection of a bulk replace, keyed the way the form renders it.
pub fn validation_err(id: &str, fields: &FieldErrors) -> serde_json::Value {
    err(
        id,
        "validation_failed",
        "the given data was invalid",
        Some(json!({ "fields": fields })),
    )
}
