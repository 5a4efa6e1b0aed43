use std::{fmt, path::PathBuf, time::SystemTime};

/// Activity state of a unit as reported by the process manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ActivityState {
    #[default]
    Unknown,
    Active,
    Inactive,
    Failed,
}

impl ActivityState {
    /// Normalize the raw activity text of a unit.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "active" | "reloading" => Self::Active,
            "inactive" | "deactivating" | "activating" => Self::Inactive,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    /// Process-manager unit id, used for status and journal queries.
    pub unit: String,
    pub project: Option<String>,
    pub dir: PathBuf,
    pub build_script: PathBuf,
    pub log_file: Option<PathBuf>,

    pub state: ActivityState,
    pub pid: Option<u32>,
    pub updated_at: Option<SystemTime>,
}

impl Service {
    #[must_use]
    pub fn new(name: impl Into<String>, unit: impl Into<String>, dir: PathBuf) -> Self {
        let build_script = dir.join("Makefile");
        Self {
            name: name.into(),
            unit: unit.into(),
            project: None,
            dir,
            build_script,
            log_file: None,
            state: ActivityState::Unknown,
            pid: None,
            updated_at: None,
        }
    }

    /// The pid is stale unless the unit is active.
    #[must_use]
    pub fn visible_pid(&self) -> Option<u32> {
        match self.state {
            ActivityState::Active => self.pid,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw() {
        assert_eq!(ActivityState::from_raw("active\n"), ActivityState::Active);
        assert_eq!(ActivityState::from_raw("reloading"), ActivityState::Active);
        assert_eq!(ActivityState::from_raw("inactive"), ActivityState::Inactive);
        assert_eq!(ActivityState::from_raw("failed"), ActivityState::Failed);
        assert_eq!(ActivityState::from_raw(""), ActivityState::Unknown);
        assert_eq!(ActivityState::from_raw("maintenance"), ActivityState::Unknown);
    }

    #[test]
    fn test_visible_pid() {
        let mut service = Service::new("api", "api.service", PathBuf::from("/srv/api"));
        service.pid = Some(42);
        assert_eq!(service.visible_pid(), None);

        service.state = ActivityState::Active;
        assert_eq!(service.visible_pid(), Some(42));

        service.state = ActivityState::Failed;
        assert_eq!(service.visible_pid(), None);
    }
}
