pub mod argv;
pub mod capabilities;
mod dashboard;
mod error;
mod executor;
mod follow;
mod process_manager;
mod refresh;
mod registry;
mod restart;
mod runner;
mod sink;
mod status;

pub use capabilities::{Capabilities, MakefileTargets};
pub use dashboard::{Action, Dashboard, DashboardCommand, DashboardEvent, DashboardOptions};
pub use error::{Error, Result};
pub use executor::OneShotExecutor;
pub use follow::{FollowController, FollowMode};
#[cfg(unix)]
pub use process_manager::UnixProcessManager;
pub use process_manager::{
    BoxStream, ChildProcess, CommandSpec, Exit, OutputStream, ProcessManager, Spawned,
};
pub use refresh::{RefreshLoop, MAX_IN_FLIGHT, REFRESH_PERIOD};
pub use registry::{Filter, Registry, ServiceRef, SharedRegistry};
pub use restart::{RestartMode, RestartOutcome, RestartPlan, RestartSequencer};
pub use runner::{CommandRunner, DEFAULT_GRACE};
pub use sink::{LogBuffer, LogSink};
pub use status::{Probe, RawStatus, StatusProber, StatusSource, SystemdStatus};
