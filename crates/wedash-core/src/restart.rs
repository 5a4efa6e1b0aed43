use std::sync::Arc;

use wedash_types::Service;

use crate::{
    argv,
    capabilities::Capabilities,
    error::{Error, Result},
    executor::OneShotExecutor,
    process_manager::{CommandSpec, ProcessManager},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartMode {
    /// The build script has a `restart` target.
    Native,
    /// `down` followed by `up`.
    Emulated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartPlan {
    Supported {
        mode: RestartMode,
        steps: Vec<CommandSpec>,
    },
    Unsupported,
}

impl RestartPlan {
    #[must_use]
    pub fn for_service(service: &Service, capabilities: &dyn Capabilities) -> Self {
        if capabilities.has_target(service, argv::RESTART) {
            return Self::Supported {
                mode: RestartMode::Native,
                steps: vec![argv::restart(service)],
            };
        }

        if capabilities.has_target(service, argv::DOWN)
            && capabilities.has_target(service, argv::UP)
        {
            return Self::Supported {
                mode: RestartMode::Emulated,
                steps: vec![argv::down(service), argv::up(service)],
            };
        }

        Self::Unsupported
    }

    #[must_use]
    pub fn mode(&self) -> Option<RestartMode> {
        match self {
            Self::Supported { mode, .. } => Some(*mode),
            Self::Unsupported => None,
        }
    }

    #[must_use]
    pub fn steps(&self) -> &[CommandSpec] {
        match self {
            Self::Supported { steps, .. } => steps,
            Self::Unsupported => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartOutcome {
    pub mode: RestartMode,
    /// Exit code of the step that ended the sequence.
    pub code: i32,
    pub steps_run: usize,
}

pub struct RestartSequencer<M: ProcessManager> {
    executor: Arc<OneShotExecutor<M>>,
    capabilities: Arc<dyn Capabilities>,
}

impl<M: ProcessManager> RestartSequencer<M> {
    pub fn new(executor: Arc<OneShotExecutor<M>>, capabilities: Arc<dyn Capabilities>) -> Self {
        Self {
            executor,
            capabilities,
        }
    }

    #[must_use]
    pub fn plan(&self, service: &Service) -> RestartPlan {
        RestartPlan::for_service(service, self.capabilities.as_ref())
    }

    /// Run the plan's steps in order, stopping at the first nonzero exit.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedAction` for an unsupported plan without running
    /// anything, or the spawn error of the failing step.
    pub async fn run(&self, plan: &RestartPlan) -> Result<RestartOutcome> {
        let RestartPlan::Supported { mode, steps } = plan else {
            return Err(Error::UnsupportedAction {
                action: argv::RESTART,
            });
        };

        let mut outcome = RestartOutcome {
            mode: *mode,
            code: 0,
            steps_run: 0,
        };
        for step in steps {
            outcome.code = self.executor.run(step).await?;
            outcome.steps_run += 1;
            if outcome.code != 0 {
                tracing::info!(
                    "Restart aborted: `{}` exited with {}",
                    step.display(),
                    outcome.code
                );
                break;
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, path::PathBuf};

    use tokio_util::sync::CancellationToken;

    use crate::{
        process_manager::{MockProcessManager, Script},
        runner::CommandRunner,
        sink::LogBuffer,
    };

    use super::*;

    struct Targets(HashSet<&'static str>);

    impl Capabilities for Targets {
        fn has_target(&self, _service: &Service, target: &str) -> bool {
            self.0.contains(target)
        }
    }

    fn sequencer(
        pm: &MockProcessManager,
        targets: &[&'static str],
    ) -> RestartSequencer<MockProcessManager> {
        let executor = OneShotExecutor::new(
            Arc::new(CommandRunner::new(pm.clone())),
            Arc::new(LogBuffer::default()),
            CancellationToken::new(),
        );
        RestartSequencer::new(
            Arc::new(executor),
            Arc::new(Targets(targets.iter().copied().collect())),
        )
    }

    fn service(name: &str) -> Service {
        Service::new(name, format!("{name}.service"), PathBuf::from("/srv").join(name))
    }

    fn make(name: &str, target: &str) -> Vec<String> {
        argv::make(&service(name), target).cmd
    }

    fn script(pm: &MockProcessManager, name: &str, target: &str, code: i32) {
        let cmd = make(name, target);
        let cmd: Vec<&str> = cmd.iter().map(String::as_str).collect();
        pm.script(&cmd, Script::exit(code));
    }

    #[tokio::test]
    async fn test_up_only_is_unsupported() {
        let pm = MockProcessManager::new();
        let sequencer = sequencer(&pm, &["up"]);

        let plan = sequencer.plan(&service("x"));
        assert_eq!(plan, RestartPlan::Unsupported);

        let result = sequencer.run(&plan).await;
        assert!(matches!(result, Err(Error::UnsupportedAction { action: "restart" })));
        assert!(pm.spawned().is_empty());
    }

    #[tokio::test]
    async fn test_down_only_is_unsupported() {
        let pm = MockProcessManager::new();
        let sequencer = sequencer(&pm, &["down"]);

        let plan = sequencer.plan(&service("x"));
        assert_eq!(plan.mode(), None);
        assert!(plan.steps().is_empty());
        assert!(sequencer.run(&plan).await.is_err());
        assert!(pm.spawned().is_empty());
    }

    #[tokio::test]
    async fn test_emulated_aborts_on_failed_down() {
        let pm = MockProcessManager::new();
        script(&pm, "x", "down", 3);
        let sequencer = sequencer(&pm, &["down", "up"]);

        let plan = sequencer.plan(&service("x"));
        assert_eq!(plan.mode(), Some(RestartMode::Emulated));
        assert_eq!(plan.steps().len(), 2);

        let outcome = sequencer.run(&plan).await.unwrap();
        assert_eq!(
            outcome,
            RestartOutcome {
                mode: RestartMode::Emulated,
                code: 3,
                steps_run: 1
            }
        );
        assert_eq!(pm.spawned(), vec![make("x", "down")]);
    }

    #[tokio::test]
    async fn test_emulated_runs_down_then_up() {
        let pm = MockProcessManager::new();
        script(&pm, "x", "up", 0);
        let sequencer = sequencer(&pm, &["down", "up"]);

        let outcome = sequencer.run(&sequencer.plan(&service("x"))).await.unwrap();
        assert_eq!(outcome.code, 0);
        assert_eq!(outcome.steps_run, 2);
        assert_eq!(pm.spawned(), vec![make("x", "down"), make("x", "up")]);
    }

    #[tokio::test]
    async fn test_native_restart_reports_code() {
        let pm = MockProcessManager::new();
        script(&pm, "y", "restart", 7);
        let sequencer = sequencer(&pm, &["restart", "down", "up"]);

        let plan = sequencer.plan(&service("y"));
        assert_eq!(plan.mode(), Some(RestartMode::Native));

        let outcome = sequencer.run(&plan).await.unwrap();
        assert_eq!(outcome.code, 7);
        assert_eq!(pm.spawned(), vec![make("y", "restart")]);
    }
}
