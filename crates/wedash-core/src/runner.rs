use std::time::Duration;

use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    process_manager::{
        BoxStream, ChildProcess, CommandSpec, Exit, OutputStream, ProcessManager, Spawned,
    },
};

/// Time a terminated process gets between `SIGTERM` and `SIGKILL`.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);
/// Upper bound for reading what is left in the pipes after termination.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

enum Step<T> {
    Next(T),
    Cancelled,
}

/// Runs one command at a time per call, streaming its output line by line.
#[derive(Debug)]
pub struct CommandRunner<M: ProcessManager> {
    pm: M,
    grace: Duration,
}

impl<M: ProcessManager> CommandRunner<M> {
    pub fn new(pm: M) -> Self {
        Self {
            pm,
            grace: DEFAULT_GRACE,
        }
    }

    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn process_manager(&self) -> &M {
        &self.pm
    }

    /// Spawn `spec` and hand every output line to `on_line` until the process
    /// exits or `cancel` fires.
    ///
    /// On cancellation the process is terminated and reaped before this
    /// returns, and lines still sitting in the pipes are delivered.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` without spawning if `cancel` already fired, or an
    /// error if the command cannot be spawned or waited on.
    pub async fn run<F>(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
        on_line: F,
    ) -> Result<Exit>
    where
        F: FnMut(OutputStream, String) + Send,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                argv: spec.display(),
            });
        }
        let spawned = self.spawn(spec).await?;
        self.stream(spec, spawned, cancel, on_line).await
    }

    /// Start `spec` without reading its output yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be spawned.
    pub async fn spawn(&self, spec: &CommandSpec) -> Result<Spawned> {
        let spawned = self.pm.spawn(spec).await?;
        tracing::debug!("Spawned `{}` (pid {:?})", spec.display(), spawned.pid);
        Ok(spawned)
    }

    /// Stream the output of a process started with [`CommandRunner::spawn`]
    /// until it exits or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be waited on or terminated.
    pub async fn stream<F>(
        &self,
        spec: &CommandSpec,
        spawned: Spawned,
        cancel: &CancellationToken,
        mut on_line: F,
    ) -> Result<Exit>
    where
        F: FnMut(OutputStream, String) + Send,
    {
        let mut child = spawned.child;
        let mut output: BoxStream<(OutputStream, String)> = Box::pin(stream::select(
            spawned.stdout.map(|line| (OutputStream::Stdout, line)),
            spawned.stderr.map(|line| (OutputStream::Stderr, line)),
        ));

        loop {
            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => Step::Cancelled,
                line = output.next() => Step::Next(line),
            };
            match step {
                Step::Next(Some((stream, line))) => on_line(stream, line),
                Step::Next(None) => break,
                Step::Cancelled => {
                    return self.abort(spec, &mut child, &mut output, &mut on_line).await;
                }
            }
        }

        let step = tokio::select! {
            biased;
            () = cancel.cancelled() => Step::Cancelled,
            code = child.wait() => Step::Next(code),
        };
        match step {
            Step::Next(code) => {
                let code = code?;
                tracing::debug!("`{}` exited with {code}", spec.display());
                Ok(Exit {
                    code,
                    cancelled: false,
                })
            }
            Step::Cancelled => self.abort(spec, &mut child, &mut output, &mut on_line).await,
        }
    }

    async fn abort<F>(
        &self,
        spec: &CommandSpec,
        child: &mut Box<dyn ChildProcess>,
        output: &mut BoxStream<(OutputStream, String)>,
        on_line: &mut F,
    ) -> Result<Exit>
    where
        F: FnMut(OutputStream, String) + Send,
    {
        tracing::debug!("Terminating `{}`", spec.display());
        let code = child.terminate(self.grace).await?;

        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while let Some((stream, line)) = output.next().await {
                on_line(stream, line);
            }
        })
        .await;
        if drained.is_err() {
            tracing::debug!("Output of `{}` still open after termination", spec.display());
        }

        Ok(Exit {
            code,
            cancelled: true,
        })
    }
}
