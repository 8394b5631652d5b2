use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::timetable::{CalendarConfig, ClockTime, PeriodConfig, SchoolDay};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Periods,
    Calendar,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "periods" => Some(Self::Periods),
            "calendar" => Some(Self::Calendar),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Periods => "setup.periods",
            Self::Calendar => "setup.calendar",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Periods => json!({
            "dayStart": "08:00",
            "dayEnd": "14:40",
            "periodMinutes": 40,
            "days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
        }),
        SetupSection::Calendar => json!({
            "dayStartHour": 8,
            "dayEndHour": 17,
            "hourRowHeight": 60
        }),
    }
}

/// Typed view of the `periods` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodsSetup {
    pub day_start: ClockTime,
    pub day_end: ClockTime,
    pub period_minutes: u16,
    pub days: Vec<SchoolDay>,
}

impl PeriodsSetup {
    pub fn period_config(&self) -> PeriodConfig {
        PeriodConfig {
            day_start: self.day_start,
            day_end: self.day_end,
            period_minutes: self.period_minutes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarSetup {
    day_start_hour: u8,
    day_end_hour: u8,
    hour_row_height: f64,
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_time(v: &Value, key: &str) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    ClockTime::parse(s)
        .map(|t| t.to_string())
        .map_err(|_| format!("{} must be HH:MM", key))
}

fn parse_days(v: &Value, key: &str) -> Result<Vec<Value>, String> {
    let items = v
        .as_array()
        .ok_or_else(|| format!("{} must be an array", key))?;
    let mut days = Vec::with_capacity(items.len());
    for item in items {
        let s = item
            .as_str()
            .ok_or_else(|| format!("{} must contain strings", key))?;
        let day = SchoolDay::parse(s).map_err(|e| e.to_string())?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    if days.is_empty() {
        return Err(format!("{} must not be empty", key));
    }
    days.sort();
    Ok(days.into_iter().map(|d| Value::from(d.as_str())).collect())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Periods => match k.as_str() {
                "dayStart" | "dayEnd" => {
                    obj.insert(k.clone(), Value::String(parse_time(v, k)?));
                }
                "periodMinutes" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 5, 240)?));
                }
                "days" => {
                    obj.insert(k.clone(), Value::Array(parse_days(v, k)?));
                }
                _ => return Err(format!("unknown periods field: {}", k)),
            },
            SetupSection::Calendar => match k.as_str() {
                "dayStartHour" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 23)?));
                }
                "dayEndHour" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 24)?));
                }
                "hourRowHeight" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 12, 240)?));
                }
                _ => return Err(format!("unknown calendar field: {}", k)),
            },
        }
    }
    Ok(())
}

/// Cross-field rules checked after a patch is merged.
fn check_section(section: SetupSection, current: &Value) -> Result<(), String> {
    match section {
        SetupSection::Periods => {
            let p: PeriodsSetup =
                serde_json::from_value(current.clone()).map_err(|e| e.to_string())?;
            if p.day_end <= p.day_start {
                return Err("dayEnd must be after dayStart".into());
            }
            if p.period_config().slots().next().is_none() {
                return Err("periodMinutes must fit at least once between dayStart and dayEnd".into());
            }
        }
        SetupSection::Calendar => {
            let c: CalendarSetup =
                serde_json::from_value(current.clone()).map_err(|e| e.to_string())?;
            if c.day_end_hour <= c.day_start_hour {
                return Err("dayEndHour must be greater than dayStartHour".into());
            }
        }
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            merge_stored(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

/// Applies stored fields one at a time. A malformed field keeps its default
/// and does not stop the fields after it.
fn merge_stored(section: SetupSection, current: &mut Value, saved: &Map<String, Value>) {
    for (k, v) in saved {
        let mut one = Map::new();
        one.insert(k.clone(), v.clone());
        if let Err(msg) = merge_section_patch(section, current, &one) {
            tracing::warn!(section = section.key(), field = %k, error = %msg, "ignoring stored setup field");
        }
    }
}

fn section_or_default(conn: Option<&Connection>, section: SetupSection) -> anyhow::Result<Value> {
    match conn {
        Some(c) => load_section(c, section),
        None => Ok(default_section(section)),
    }
}

pub fn load_periods(conn: Option<&Connection>) -> anyhow::Result<PeriodsSetup> {
    let value = section_or_default(conn, SetupSection::Periods)?;
    Ok(serde_json::from_value(value)?)
}

pub fn load_calendar(conn: Option<&Connection>) -> anyhow::Result<CalendarConfig> {
    let value = section_or_default(conn, SetupSection::Calendar)?;
    let c: CalendarSetup = serde_json::from_value(value)?;
    Ok(CalendarConfig {
        day_start_hour: c.day_start_hour,
        day_end_hour: c.day_end_hour,
        hour_row_height: c.hour_row_height,
    })
}

/// Every section as `{ "periods": ..., "calendar": ... }`.
pub fn current_sections(conn: Option<&Connection>) -> anyhow::Result<Value> {
    Ok(json!({
        "periods": section_or_default(conn, SetupSection::Periods)?,
        "calendar": section_or_default(conn, SetupSection::Calendar)?
    }))
}

/// Checks a `{ "periods": ..., "calendar": ... }` document as if each
/// section were a full patch over the defaults. Returns the settings rows to
/// store, or the first problem found.
pub fn validated_sections(doc: &Value) -> Result<Vec<(&'static str, Value)>, String> {
    let obj = doc
        .as_object()
        .ok_or_else(|| "setup must be an object".to_string())?;
    let mut out = Vec::new();
    for (name, patch) in obj {
        let section =
            SetupSection::parse(name).ok_or_else(|| format!("unknown setup section: {}", name))?;
        let patch = patch
            .as_object()
            .ok_or_else(|| format!("{} must be an object", name))?;
        let mut current = default_section(section);
        merge_section_patch(section, &mut current, patch).map_err(|e| format!("{}: {}", name, e))?;
        check_section(section, &current).map_err(|e| format!("{}: {}", name, e))?;
        out.push((section.key(), current));
    }
    Ok(out)
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match current_sections(state.db.as_ref()) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(msg) = check_section(section, &current) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(section = section_raw, "setup updated");
    ok(
        &req.id,
        json!({ "ok": true, "section": section_raw, "value": current }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
