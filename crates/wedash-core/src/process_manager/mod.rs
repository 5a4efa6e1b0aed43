mod base;
mod implementations;
mod types;

pub use base::{ChildProcess, ProcessManager};
#[cfg(test)]
pub(crate) use implementations::{MockEvent, MockProcessManager, Script};
#[cfg(unix)]
pub use implementations::UnixProcessManager;
pub use types::{BoxStream, CommandSpec, Exit, OutputStream, Spawned};
