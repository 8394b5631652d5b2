use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::timetable::TimetableBuilder;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Open builder session, if any. At most one per daemon.
    pub builder: Option<TimetableBuilder>,
}
