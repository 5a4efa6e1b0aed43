use std::time::Duration;

use crate::{
    error::Result,
    process_manager::types::{CommandSpec, Spawned},
};

#[async_trait::async_trait]
pub trait ProcessManager: Send + Sync {
    /// Spawn a new process with both output streams piped.
    async fn spawn(&self, spec: &CommandSpec) -> Result<Spawned>;
}

/// Handle to one spawned process.
#[async_trait::async_trait]
pub trait ChildProcess: Send {
    /// Wait for the process to exit on its own.
    async fn wait(&mut self) -> Result<i32>;
    /// Gracefully shutdown the process, forcefully killing it once `grace` has
    /// elapsed, and reap it.
    async fn terminate(&mut self, grace: Duration) -> Result<i32>;
}
