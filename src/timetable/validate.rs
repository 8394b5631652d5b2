//! Server-side validation of the bulk-replace payload.
//!
//! Failures come back as a map of field name to message, with per-entry
//! fields addressed as `classes.N.field`.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::clock::ClockTime;
use super::day::SchoolDay;
use super::entry::{ScheduleEntry, SlotKey};

pub const GRADE_LEVEL_MAX_LEN: usize = 32;
pub const SUBJECT_MAX_LEN: usize = 120;
pub const MAX_CLASSES: usize = 500;

pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTimetable {
    pub grade_level: String,
    pub entries: Vec<ScheduleEntry>,
}

fn required_string<'a>(
    obj: &'a serde_json::Map<String, Value>,
    key: &str,
    field: &str,
    errors: &mut FieldErrors,
) -> Option<&'a str> {
    match obj.get(key) {
        None | Some(Value::Null) => {
            errors.insert(field.to_string(), format!("The {} field is required.", key));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.insert(field.to_string(), format!("The {} field is required.", key));
            None
        }
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            errors.insert(field.to_string(), format!("The {} field must be a string.", key));
            None
        }
    }
}

fn validate_entry(
    index: usize,
    raw: &Value,
    grade_level: &str,
    seen: &mut HashMap<SlotKey, usize>,
    errors: &mut FieldErrors,
) -> Option<ScheduleEntry> {
    let prefix = format!("classes.{}", index);
    let Some(obj) = raw.as_object() else {
        errors.insert(prefix, "Each class must be an object.".to_string());
        return None;
    };

    let day = required_string(obj, "day", &format!("{prefix}.day"), errors).and_then(|s| {
        SchoolDay::parse(s)
            .map_err(|_| {
                errors.insert(
                    format!("{prefix}.day"),
                    format!("The selected day {:?} is invalid.", s),
                );
            })
            .ok()
    });
    let start = required_string(obj, "start_time", &format!("{prefix}.start_time"), errors)
        .and_then(|s| {
            ClockTime::parse(s)
                .map_err(|_| {
                    errors.insert(
                        format!("{prefix}.start_time"),
                        "The start_time field must match the format H:i.".to_string(),
                    );
                })
                .ok()
        });
    let end = required_string(obj, "end_time", &format!("{prefix}.end_time"), errors).and_then(
        |s| {
            ClockTime::parse(s)
                .map_err(|_| {
                    errors.insert(
                        format!("{prefix}.end_time"),
                        "The end_time field must match the format H:i.".to_string(),
                    );
                })
                .ok()
        },
    );
    let subject = required_string(obj, "subject", &format!("{prefix}.subject"), errors)
        .map(str::trim)
        .and_then(|s| {
            if s.chars().count() > SUBJECT_MAX_LEN {
                errors.insert(
                    format!("{prefix}.subject"),
                    format!(
                        "The subject field must not be greater than {} characters.",
                        SUBJECT_MAX_LEN
                    ),
                );
                None
            } else {
                Some(s)
            }
        });

    let (day, start, end, subject) = (day?, start?, end?, subject?);
    if end <= start {
        errors.insert(
            format!("{prefix}.end_time"),
            "The end_time field must be a time after start_time.".to_string(),
        );
        return None;
    }

    let key = SlotKey {
        day,
        start_time: start,
    };
    if let Some(first) = seen.insert(key, index) {
        errors.insert(
            format!("{prefix}.start_time"),
            format!(
                "Another class (classes.{}) already starts at {} on {}.",
                first, start, day
            ),
        );
        return None;
    }

    ScheduleEntry::new(day, start, end, subject)
        .ok()
        .map(|e| e.with_grade_level(grade_level))
}

/// Checks a `{grade_level, classes}` payload. Either every entry is valid
/// and the whole set is returned, or nothing is.
pub fn validate_bulk_replace(payload: &Value) -> Result<ValidatedTimetable, FieldErrors> {
    let mut errors = FieldErrors::new();
    let Some(obj) = payload.as_object() else {
        errors.insert(
            "grade_level".to_string(),
            "The grade_level field is required.".to_string(),
        );
        errors.insert(
            "classes".to_string(),
            "The classes field is required.".to_string(),
        );
        return Err(errors);
    };

    let grade_level = required_string(obj, "grade_level", "grade_level", &mut errors)
        .map(str::trim)
        .and_then(|s| {
            if s.chars().count() > GRADE_LEVEL_MAX_LEN {
                errors.insert(
                    "grade_level".to_string(),
                    format!(
                        "The grade_level field must not be greater than {} characters.",
                        GRADE_LEVEL_MAX_LEN
                    ),
                );
                None
            } else {
                Some(s.to_string())
            }
        });

    let classes = match obj.get("classes") {
        None | Some(Value::Null) => {
            errors.insert(
                "classes".to_string(),
                "The classes field is required.".to_string(),
            );
            None
        }
        Some(Value::Array(items)) if items.is_empty() => {
            errors.insert(
                "classes".to_string(),
                "The classes field must have at least 1 item.".to_string(),
            );
            None
        }
        Some(Value::Array(items)) if items.len() > MAX_CLASSES => {
            errors.insert(
                "classes".to_string(),
                format!("The classes field must not have more than {} items.", MAX_CLASSES),
            );
            None
        }
        Some(Value::Array(items)) => Some(items),
        Some(_) => {
            errors.insert(
                "classes".to_string(),
                "The classes field must be an array.".to_string(),
            );
            None
        }
    };

    let mut entries = Vec::new();
    if let Some(items) = classes {
        let grade = grade_level.clone().unwrap_or_default();
        let mut seen = HashMap::new();
        for (i, raw) in items.iter().enumerate() {
            if let Some(e) = validate_entry(i, raw, &grade, &mut seen, &mut errors) {
                entries.push(e);
            }
        }
    }

    match grade_level {
        Some(grade_level) if errors.is_empty() => Ok(ValidatedTimetable {
            grade_level,
            entries,
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_a_well_formed_payload() {
        let payload = json!({
            "grade_level": " JSS1A ",
            "classes": [
                { "day": "Monday", "start_time": "08:00", "end_time": "08:40", "subject": "Maths" },
                { "day": "monday", "start_time": "08:40:00", "end_time": "09:20", "subject": "English" }
            ]
        });
        let v = validate_bulk_replace(&payload).expect("valid");
        assert_eq!(v.grade_level, "JSS1A");
        assert_eq!(v.entries.len(), 2);
        assert_eq!(v.entries[1].day, SchoolDay::Monday);
        assert_eq!(v.entries[1].start_time.to_string(), "08:40");
        assert_eq!(v.entries[0].grade_level.as_deref(), Some("JSS1A"));
    }

    #[test]
    fn missing_top_level_fields_are_keyed() {
        let errors = validate_bulk_replace(&json!({})).expect_err("invalid");
        assert!(errors.contains_key("grade_level"));
        assert!(errors.contains_key("classes"));

        let errors =
            validate_bulk_replace(&json!({ "grade_level": "JSS1A", "classes": [] })).expect_err("invalid");
        assert_eq!(errors.len(), 1);
        assert!(errors["classes"].contains("at least 1"));
    }

    #[test]
    fn entry_errors_are_addressed_by_index() {
        let payload = json!({
            "grade_level": "JSS1A",
            "classes": [
                { "day": "Monday", "start_time": "08:00", "end_time": "08:40", "subject": "Maths" },
                { "day": "Sunday", "start_time": "8am", "end_time": "08:40", "subject": "" },
                { "day": "Tuesday", "start_time": "10:00", "end_time": "09:00", "subject": "Art" }
            ]
        });
        let errors = validate_bulk_replace(&payload).expect_err("invalid");
        assert!(errors.contains_key("classes.1.day"));
        assert!(errors.contains_key("classes.1.start_time"));
        assert!(errors.contains_key("classes.1.subject"));
        assert!(errors.contains_key("classes.2.end_time"));
        assert!(!errors.keys().any(|k| k.starts_with("classes.0")));
    }

    #[test]
    fn duplicate_slot_in_one_payload_is_rejected() {
        let payload = json!({
            "grade_level": "JSS1A",
            "classes": [
                { "day": "Monday", "start_time": "08:00", "end_time": "08:40", "subject": "Maths" },
                { "day": "Monday", "start_time": "08:00", "end_time": "09:00", "subject": "Physics" }
            ]
        });
        let errors = validate_bulk_replace(&payload).expect_err("invalid");
        assert!(errors["classes.1.start_time"].contains("classes.0"));
    }

    #[test]
    fn overlapping_ranges_are_accepted() {
        let payload = json!({
            "grade_level": "JSS1A",
            "classes": [
                { "day": "Monday", "start_time": "08:00", "end_time": "09:00", "subject": "Maths" },
                { "day": "Monday", "start_time": "08:30", "end_time": "09:10", "subject": "Physics" }
            ]
        });
        assert!(validate_bulk_replace(&payload).is_ok());
    }
}
