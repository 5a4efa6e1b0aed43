use std::fmt;

use crate::{follow::FollowMode, registry::ServiceRef};

/// Build-script and log actions the operator can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    Restart,
    LastLogs,
}

impl Action {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Restart => "restart",
            Self::LastLogs => "last logs",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug)]
pub enum DashboardCommand {
    /// The selection moved: probe the service and follow it.
    Select { target: ServiceRef },
    Follow {
        target: ServiceRef,
        mode: FollowMode,
    },
    Run {
        target: ServiceRef,
        action: Action,
    },
    Rediscover,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    /// Short message for the status bar.
    Notice(String),
    /// Live fields of the service at this registry index changed.
    ServiceUpdated { index: usize },
    Rediscovered { services: usize },
    ActionFinished {
        action: Action,
        service: String,
        code: Option<i32>,
    },
}
