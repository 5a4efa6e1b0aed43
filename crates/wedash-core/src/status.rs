use std::{process::Stdio, time::Duration};

use tokio::{process::Command, time::timeout};
use wedash_types::{ActivityState, Service};

use crate::error::{Error, Result};

/// Raw unit state as reported by the process manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatus {
    pub active_state: String,
    pub pid: Option<u32>,
}

#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    /// Query the state of one unit.
    async fn query(&self, unit: &str) -> Result<RawStatus>;
}

/// Normalized result of probing one service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Probe {
    pub state: ActivityState,
    /// Only present for an active unit.
    pub pid: Option<u32>,
}

impl From<RawStatus> for Probe {
    fn from(raw: RawStatus) -> Self {
        let state = ActivityState::from_raw(&raw.active_state);
        let pid = match state {
            ActivityState::Active => raw.pid.filter(|pid| *pid != 0),
            _ => None,
        };
        Self { state, pid }
    }
}

#[derive(Debug)]
pub struct StatusProber<S: StatusSource> {
    source: S,
}

impl<S: StatusSource> StatusProber<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Probe one service. Never fails: an unreachable process manager or an
    /// unknown unit yields `Probe::default()`, i.e. unknown with no pid.
    pub async fn probe(&self, service: &Service) -> Probe {
        match self.source.query(&service.unit).await {
            Ok(raw) => raw.into(),
            Err(err) => {
                tracing::debug!("Probe of {} fell back to unknown: {err}", service.name);
                Probe::default()
            }
        }
    }
}

/// `systemctl show` backed status source.
#[derive(Debug, Clone)]
pub struct SystemdStatus {
    user: bool,
    timeout: Duration,
}

impl Default for SystemdStatus {
    fn default() -> Self {
        Self {
            user: true,
            timeout: Duration::from_secs(5),
        }
    }
}

impl SystemdStatus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Query the system manager instead of the user manager.
    #[must_use]
    pub fn system(mut self) -> Self {
        self.user = false;
        self
    }
}

fn unavailable(unit: &str, reason: impl Into<String>) -> Error {
    Error::ProbeUnavailable {
        unit: unit.to_owned(),
        reason: reason.into(),
    }
}

/// Parse `systemctl show --property=...` output.
pub(crate) fn parse_show(unit: &str, text: &str) -> Result<RawStatus> {
    let mut load_state = None;
    let mut active_state = None;
    let mut pid = None;

    for line in text.lines() {
        match line.split_once('=') {
            Some(("LoadState", value)) => load_state = Some(value.trim()),
            Some(("ActiveState", value)) => active_state = Some(value.trim()),
            Some(("MainPID", value)) => pid = value.trim().parse::<u32>().ok().filter(|p| *p != 0),
            _ => {}
        }
    }

    if load_state == Some("not-found") {
        return Err(unavailable(unit, "unit not found"));
    }
    let Some(active_state) = active_state else {
        return Err(unavailable(unit, "no ActiveState reported"));
    };

    Ok(RawStatus {
        active_state: active_state.to_owned(),
        pid,
    })
}

#[async_trait::async_trait]
impl StatusSource for SystemdStatus {
    async fn query(&self, unit: &str) -> Result<RawStatus> {
        let mut cmd = Command::new("systemctl");
        if self.user {
            cmd.arg("--user");
        }
        cmd.args(["show", "--property=LoadState,ActiveState,MainPID", unit])
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| unavailable(unit, "systemctl timed out"))?
            .map_err(|err| unavailable(unit, err.to_string()))?;

        if !output.status.success() {
            return Err(unavailable(
                unit,
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ));
        }

        parse_show(unit, &String::from_utf8_lossy(&output.stdout))
    }
}
