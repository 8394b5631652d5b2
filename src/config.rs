//! Process-level settings read once at start-up.
//!
//! Per-workspace settings (period length, calendar scale) live in the
//! workspace database instead; see `ipc::handlers::setup`.

use std::path::PathBuf;

pub const ENV_WORKSPACE: &str = "TIMETABLED_WORKSPACE";
pub const ENV_LOG: &str = "TIMETABLED_LOG";
pub const DEFAULT_LOG_FILTER: &str = "timetabled=info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Workspace opened before the first request is read.
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let workspace = lookup(ENV_WORKSPACE)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let log_filter = lookup(ENV_LOG)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        Self {
            workspace,
            log_filter,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = DaemonConfig::from_lookup(|_| None);
        assert_eq!(cfg, DaemonConfig::default());
    }

    #[test]
    fn blank_values_are_ignored() {
        let env: HashMap<&str, &str> = [(ENV_WORKSPACE, "  "), (ENV_LOG, "timetabled=debug")]
            .into_iter()
            .collect();
        let cfg = DaemonConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.workspace, None);
        assert_eq!(cfg.log_filter, "timetabled=debug");
    }
}
