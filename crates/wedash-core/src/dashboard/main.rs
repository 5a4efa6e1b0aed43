use std::{path::PathBuf, sync::Arc, time::Duration};

use tokio::sync::mpsc;
use wedash_types::Service;

use crate::{
    capabilities::Capabilities,
    dashboard::{
        background::DashboardBackground,
        commands::{DashboardCommand, DashboardEvent},
    },
    error::{Error, Result},
    process_manager::ProcessManager,
    refresh::{MAX_IN_FLIGHT, REFRESH_PERIOD},
    registry::{Registry, SharedRegistry},
    runner::DEFAULT_GRACE,
    sink::LogBuffer,
    status::StatusSource,
};

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    /// Where re-discovery looks for services.
    pub roots: Vec<PathBuf>,
    pub max_depth: usize,
    /// Line count of the "last logs" action.
    pub last: usize,
    pub refresh_period: Duration,
    pub max_in_flight: usize,
    pub grace: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            roots: vec![],
            max_depth: 5,
            last: 200,
            refresh_period: REFRESH_PERIOD,
            max_in_flight: MAX_IN_FLIGHT,
            grace: DEFAULT_GRACE,
            shutdown_timeout: Duration::from_secs(3),
        }
    }
}

/// Handle to the dashboard actor.
///
/// The UI reads the registry and the log buffer directly and sends
/// everything else as a [`DashboardCommand`].
#[derive(Debug)]
pub struct Dashboard {
    task: tokio::task::JoinHandle<()>,
    commands_tx: mpsc::Sender<DashboardCommand>,
    registry: SharedRegistry,
    log: Arc<LogBuffer>,
}

impl Dashboard {
    pub fn new<M, S>(
        process_manager: M,
        status: S,
        capabilities: Arc<dyn Capabilities>,
        services: Vec<Service>,
        options: DashboardOptions,
    ) -> (Self, mpsc::Receiver<DashboardEvent>)
    where
        M: ProcessManager + 'static,
        S: StatusSource + 'static,
    {
        let registry = Registry::new(services).shared();
        let log = Arc::new(LogBuffer::default());

        let (commands_tx, commands_rx) = mpsc::channel::<DashboardCommand>(100);
        let (mut inner, events_rx) = DashboardBackground::new(
            process_manager,
            status,
            capabilities,
            registry.clone(),
            log.clone(),
            options,
            commands_rx,
        );

        let task = tokio::spawn(async move {
            inner.run().await;
        });

        (
            Self {
                task,
                commands_tx,
                registry,
                log,
            },
            events_rx,
        )
    }

    #[must_use]
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    #[must_use]
    pub fn log(&self) -> Arc<LogBuffer> {
        self.log.clone()
    }

    /// Queue a command for the actor.
    ///
    /// # Errors
    /// Returns an error if the actor has stopped.
    pub async fn send(&self, command: DashboardCommand) -> Result<()> {
        self.commands_tx
            .send(command)
            .await
            .map_err(|err| Error::Internal(err.to_string()))
    }

    /// Stop following, cancel running commands and the refresh loop, and wait
    /// for all of it within the shutdown timeout.
    ///
    /// # Errors
    /// Returns an error if the actor task panicked.
    pub async fn shutdown(self) -> Result<()> {
        tracing::trace!("Received shutdown request");

        // A closed channel means the actor is already on its way out.
        let _ = self.commands_tx.send(DashboardCommand::Shutdown).await;
        self.task
            .await
            .map_err(|err| Error::Internal(err.to_string()))
    }
}
