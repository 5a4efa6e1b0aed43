use std::{sync::Arc, time::SystemTime};

use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use wedash_types::Service;

use crate::{
    argv,
    capabilities::Capabilities,
    dashboard::{
        commands::{Action, DashboardCommand, DashboardEvent},
        main::DashboardOptions,
    },
    error::{Error, Result},
    executor::OneShotExecutor,
    follow::{FollowController, FollowMode},
    process_manager::ProcessManager,
    refresh::RefreshLoop,
    registry::{ServiceRef, SharedRegistry},
    restart::{RestartMode, RestartPlan, RestartSequencer},
    runner::CommandRunner,
    sink::LogSink,
    status::{StatusProber, StatusSource},
};

type FollowRequest = (Service, FollowMode);

/// Everything the tasks spawned by the actor need.
struct Context<M: ProcessManager, S: StatusSource> {
    registry: SharedRegistry,
    sink: Arc<dyn LogSink>,
    follow: Arc<FollowController<M>>,
    executor: Arc<OneShotExecutor<M>>,
    sequencer: RestartSequencer<M>,
    prober: Arc<StatusProber<S>>,
    capabilities: Arc<dyn Capabilities>,
    events_tx: mpsc::Sender<DashboardEvent>,
    options: DashboardOptions,
}

impl<M: ProcessManager + 'static, S: StatusSource + 'static> Context<M, S> {
    fn emit(&self, event: DashboardEvent) {
        emit(&self.events_tx, event);
    }

    fn notice(&self, message: &str) {
        self.sink.note(message);
        self.emit(DashboardEvent::Notice(message.to_owned()));
    }

    /// Probe one service on demand and merge the result.
    async fn probe(&self, target: ServiceRef, service: &Service) {
        let probe = self.prober.probe(service).await;
        let changed = {
            let mut registry = self.registry.write();
            if registry.generation() != target.generation {
                return;
            }
            registry.apply_probe(target.index, probe, SystemTime::now())
        };
        if changed {
            self.emit(DashboardEvent::ServiceUpdated {
                index: target.index,
            });
        }
    }

    /// Check that the build script supports `action`, yielding the restart
    /// plan for a restart. Build scripts are read on the blocking pool.
    async fn prepare(&self, service: &Service, action: Action) -> Result<Option<RestartPlan>> {
        let capabilities = self.capabilities.clone();
        let service = service.clone();
        tokio::task::spawn_blocking(move || {
            let target = match action {
                Action::Up => argv::UP,
                Action::Down => argv::DOWN,
                Action::Restart => {
                    return match RestartPlan::for_service(&service, capabilities.as_ref()) {
                        RestartPlan::Unsupported => Err(Error::UnsupportedAction {
                            action: argv::RESTART,
                        }),
                        plan => Ok(Some(plan)),
                    };
                }
                Action::LastLogs => return Ok(None),
            };

            if capabilities.has_target(&service, target) {
                Ok(None)
            } else {
                Err(Error::UnsupportedAction { action: target })
            }
        })
        .await
        .map_err(|err| Error::Internal(err.to_string()))?
    }

    async fn run_action(&self, target: ServiceRef, service: Service, action: Action) {
        let plan = match self.prepare(&service, action).await {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!("Rejected {action} of {}: {err}", service.name);
                self.notice(&err.to_string());
                return;
            }
        };

        let result = match (action, plan) {
            (Action::Up, _) => self.executor.run(&argv::up(&service)).await,
            (Action::Down, _) => self.executor.run(&argv::down(&service)).await,
            (Action::Restart, Some(plan)) => {
                if plan.mode() == Some(RestartMode::Emulated) {
                    self.notice("Emulating restart: down → up");
                }
                self.sequencer.run(&plan).await.map(|outcome| outcome.code)
            }
            (Action::Restart, None) => Err(Error::UnsupportedAction {
                action: argv::RESTART,
            }),
            (Action::LastLogs, _) => {
                self.follow.stop().await;
                self.sink.clear();
                self.executor
                    .run(&argv::last_logs(&service, self.options.last))
                    .await
            }
        };

        let code = match result {
            Ok(code) => Some(code),
            Err(err) => {
                self.notice(&format!("{action} of {} failed: {err}", service.name));
                None
            }
        };
        tracing::info!("{action} of {} finished with {code:?}", service.name);

        if action != Action::LastLogs {
            self.probe(target, &service).await;
        }
        self.emit(DashboardEvent::ActionFinished {
            action,
            service: service.name,
            code,
        });
    }

    async fn rediscover(&self) {
        let roots = self.options.roots.clone();
        let max_depth = self.options.max_depth;
        let discovered =
            tokio::task::spawn_blocking(move || wedash_config::discover(&roots, max_depth)).await;
        let services = match discovered {
            Ok(services) => services,
            Err(err) => {
                tracing::error!("Discovery task failed: {err}");
                self.notice("Re-discovery failed");
                return;
            }
        };

        let count = services.len();
        self.registry.write().replace(services);
        tracing::info!("Re-discovered {count} services");
        self.emit(DashboardEvent::Rediscovered { services: count });
    }
}

fn emit(events_tx: &mpsc::Sender<DashboardEvent>, event: DashboardEvent) {
    match events_tx.try_send(event) {
        Ok(()) | Err(TrySendError::Closed(_)) => {}
        Err(TrySendError::Full(event)) => {
            tracing::debug!("Event queue full, dropping {event:?}");
        }
    }
}

/// Starts follow sessions one after another, skipping requests that were
/// already superseded while the previous session was being torn down.
async fn follow_worker<M: ProcessManager + 'static>(
    follow: Arc<FollowController<M>>,
    mut requests: mpsc::UnboundedReceiver<FollowRequest>,
    shutdown: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            biased;
            () = shutdown.cancelled() => None,
            request = requests.recv() => request,
        };
        let Some(mut request) = request else {
            break;
        };
        while let Ok(newer) = requests.try_recv() {
            request = newer;
        }

        let (service, mode) = request;
        follow.start(&service, mode).await;
    }

    follow.stop().await;
}

pub struct DashboardBackground<M: ProcessManager, S: StatusSource> {
    ctx: Arc<Context<M, S>>,
    tracker: TaskTracker,
    shutdown: CancellationToken,

    follow_tx: mpsc::UnboundedSender<FollowRequest>,
    follow_rx: Option<mpsc::UnboundedReceiver<FollowRequest>>,

    commands_rx: mpsc::Receiver<DashboardCommand>,
}

impl<M: ProcessManager + 'static, S: StatusSource + 'static> DashboardBackground<M, S> {
    pub fn new(
        process_manager: M,
        status: S,
        capabilities: Arc<dyn Capabilities>,
        registry: SharedRegistry,
        sink: Arc<dyn LogSink>,
        options: DashboardOptions,
        commands_rx: mpsc::Receiver<DashboardCommand>,
    ) -> (Self, mpsc::Receiver<DashboardEvent>) {
        tracing::info!("DashboardBackground initialized");

        let (events_tx, events_rx) = mpsc::channel(256);
        let (follow_tx, follow_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let runner = Arc::new(CommandRunner::new(process_manager).with_grace(options.grace));
        let executor = Arc::new(OneShotExecutor::new(
            runner.clone(),
            sink.clone(),
            shutdown.clone(),
        ));
        let follow = Arc::new(FollowController::new(runner, sink.clone(), shutdown.clone()));
        let sequencer = RestartSequencer::new(executor.clone(), capabilities.clone());

        let ctx = Context {
            registry,
            sink,
            follow,
            executor,
            sequencer,
            prober: Arc::new(StatusProber::new(status)),
            capabilities,
            events_tx,
            options,
        };

        (
            Self {
                ctx: Arc::new(ctx),
                tracker: TaskTracker::new(),
                shutdown,
                follow_tx,
                follow_rx: Some(follow_rx),
                commands_rx,
            },
            events_rx,
        )
    }

    pub async fn run(&mut self) {
        tracing::info!("DashboardBackground started");

        let refresh = self.spawn_refresh();
        if let Some(follow_rx) = self.follow_rx.take() {
            self.tracker.spawn(follow_worker(
                self.ctx.follow.clone(),
                follow_rx,
                self.shutdown.clone(),
            ));
        }

        while let Some(command) = self.commands_rx.recv().await {
            tracing::debug!("Received command: {command:?}");

            if matches!(command, DashboardCommand::Shutdown) {
                break;
            }
            if let Err(err) = self.handle_command(command) {
                tracing::warn!("Error handling command: {err}");
                self.ctx.notice(&err.to_string());
            }
        }

        self.stop(refresh).await;
    }

    fn spawn_refresh(&self) -> JoinHandle<()> {
        let events_tx = self.ctx.events_tx.clone();
        RefreshLoop::new(
            self.ctx.registry.clone(),
            self.ctx.prober.clone(),
            Arc::new(move |index| emit(&events_tx, DashboardEvent::ServiceUpdated { index })),
        )
        .with_period(self.ctx.options.refresh_period)
        .with_max_in_flight(self.ctx.options.max_in_flight)
        .spawn(self.shutdown.child_token())
    }

    fn handle_command(&self, command: DashboardCommand) -> Result<()> {
        match command {
            DashboardCommand::Select { target } => {
                let service = self.resolve(target)?;
                self.request_follow(service.clone(), FollowMode::Default)?;

                let ctx = self.ctx.clone();
                self.tracker.spawn(async move { ctx.probe(target, &service).await });
                Ok(())
            }
            DashboardCommand::Follow { target, mode } => {
                let service = self.resolve(target)?;
                self.request_follow(service, mode)
            }
            DashboardCommand::Run { target, action } => {
                let service = self.resolve(target)?;

                let ctx = self.ctx.clone();
                self.tracker
                    .spawn(async move { ctx.run_action(target, service, action).await });
                Ok(())
            }
            DashboardCommand::Rediscover => {
                let ctx = self.ctx.clone();
                self.tracker.spawn(async move { ctx.rediscover().await });
                Ok(())
            }
            DashboardCommand::Shutdown => Ok(()),
        }
    }

    fn resolve(&self, target: ServiceRef) -> Result<Service> {
        self.ctx
            .registry
            .read()
            .resolve(target)
            .cloned()
            .ok_or(Error::StaleTarget)
    }

    fn request_follow(&self, service: Service, mode: FollowMode) -> Result<()> {
        self.follow_tx
            .send((service, mode))
            .map_err(|err| Error::Internal(err.to_string()))
    }

    async fn stop(&mut self, refresh: JoinHandle<()>) {
        tracing::info!("Shutting down dashboard");

        self.shutdown.cancel();
        self.tracker.close();

        let tracker = self.tracker.clone();
        let ctx = self.ctx.clone();
        let drained = timeout(self.ctx.options.shutdown_timeout, async move {
            ctx.follow.stop().await;
            tracker.wait().await;
            if let Err(err) = refresh.await {
                tracing::error!("Refresh loop failed: {err}");
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                "Tasks still running after {:?}, giving up",
                self.ctx.options.shutdown_timeout
            );
        }
        tracing::info!("DashboardBackground stopped");
    }
}
