use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wedash_types::Service;

use crate::{argv, process_manager::ProcessManager, runner::CommandRunner, sink::LogSink};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FollowMode {
    /// The service's log file, or its journal when it has none.
    #[default]
    Default,
    /// Always the journal of the service's unit.
    Journal,
}

#[derive(Debug)]
struct FollowSession {
    service: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the one live log stream of the dashboard.
pub struct FollowController<M: ProcessManager> {
    runner: Arc<CommandRunner<M>>,
    sink: Arc<dyn LogSink>,
    shutdown: CancellationToken,
    session: tokio::sync::Mutex<Option<FollowSession>>,
    followed: Arc<Mutex<Option<String>>>,
}

impl<M: ProcessManager + 'static> FollowController<M> {
    /// Sessions are cancelled as well when `shutdown` fires.
    pub fn new(
        runner: Arc<CommandRunner<M>>,
        sink: Arc<dyn LogSink>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            runner,
            sink,
            shutdown,
            session: tokio::sync::Mutex::new(None),
            followed: Arc::new(Mutex::new(None)),
        }
    }

    /// Follow `service`, replacing the current session.
    ///
    /// The previous process is terminated and reaped before the new one is
    /// spawned, so two streams never write to the sink at the same time. The
    /// new process is running by the time this returns.
    pub async fn start(&self, service: &Service, mode: FollowMode) {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            self.finish(previous).await;
        }
        if self.shutdown.is_cancelled() {
            return;
        }

        let spec = match mode {
            FollowMode::Default => argv::follow(service),
            FollowMode::Journal => argv::journal_follow(service),
        };
        tracing::debug!("Following {} with `{}`", service.name, spec.display());

        self.sink.clear();
        self.sink.write(&format!("$ {}", spec.display()));

        let spawned = match self.runner.spawn(&spec).await {
            Ok(spawned) => spawned,
            Err(err) => {
                tracing::warn!("Cannot follow {}: {err}", service.name);
                self.sink.write(&format!("[error: {err}]"));
                return;
            }
        };
        *self.followed.lock() = Some(service.name.clone());

        let cancel = self.shutdown.child_token();
        let task = {
            let runner = self.runner.clone();
            let sink = self.sink.clone();
            let followed = self.followed.clone();
            let cancel = cancel.clone();
            let name = service.name.clone();
            tokio::spawn(async move {
                let result = runner
                    .stream(&spec, spawned, &cancel, |_, line| sink.write(&line))
                    .await;
                match result {
                    Ok(exit) if exit.cancelled => {
                        tracing::debug!("Stopped following {name}");
                    }
                    Ok(exit) => sink.write(&format!("[exit {}]", exit.code)),
                    Err(err) => {
                        tracing::warn!("Follow of {name} failed: {err}");
                        sink.write(&format!("[error: {err}]"));
                    }
                }
                *followed.lock() = None;
            })
        };

        *session = Some(FollowSession {
            service: service.name.clone(),
            cancel,
            task,
        });
    }

    /// Cancel the current session and wait until its process is gone.
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            self.finish(previous).await;
        }
    }

    /// Name of the followed service while its stream is open.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.followed.lock().clone()
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.followed.lock().is_some()
    }

    async fn finish(&self, session: FollowSession) {
        tracing::trace!("Closing follow session of {}", session.service);
        session.cancel.cancel();
        if let Err(err) = session.task.await {
            tracing::error!("Follow task of {} failed: {err}", session.service);
            *self.followed.lock() = None;
        }
    }
}
