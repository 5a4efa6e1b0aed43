use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    error::Result,
    process_manager::{CommandSpec, ProcessManager},
    runner::CommandRunner,
    sink::LogSink,
};

/// Runs commands to completion and publishes their output in one piece.
pub struct OneShotExecutor<M: ProcessManager> {
    runner: Arc<CommandRunner<M>>,
    sink: Arc<dyn LogSink>,
    cancel: CancellationToken,
}

impl<M: ProcessManager> OneShotExecutor<M> {
    /// `cancel` terminates every command still running through this executor.
    pub fn new(
        runner: Arc<CommandRunner<M>>,
        sink: Arc<dyn LogSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            runner,
            sink,
            cancel,
        }
    }

    /// Run `spec` and return its exit code.
    ///
    /// Output is buffered while the command runs and flushed to the sink as a
    /// single block ending with `[exit N]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be spawned; the error is also
    /// written to the sink.
    pub async fn run(&self, spec: &CommandSpec) -> Result<i32> {
        self.sink.write(&format!("$ {}", spec.display()));

        let mut lines = Vec::new();
        let result = self
            .runner
            .run(spec, &self.cancel, |_, line| lines.push(line))
            .await;

        match result {
            Ok(exit) => {
                if exit.cancelled {
                    lines.push("[cancelled]".to_owned());
                }
                lines.push(format!("[exit {}]", exit.code));
                self.sink.write_block(lines);
                Ok(exit.code)
            }
            Err(err) => {
                tracing::warn!("One-shot `{}` failed: {err}", spec.display());
                lines.push(format!("[error: {err}]"));
                self.sink.write_block(lines);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        process_manager::{MockProcessManager, Script},
        sink::LogBuffer,
    };

    use super::*;

    #[tokio::test]
    async fn test_output_flushed_with_exit() {
        let pm = MockProcessManager::new();
        pm.script(&["make", "up"], Script::lines(&["starting", "ready"], 0));
        let sink = Arc::new(LogBuffer::default());
        let executor = OneShotExecutor::new(
            Arc::new(CommandRunner::new(pm)),
            sink.clone(),
            CancellationToken::new(),
        );

        let code = executor.run(&CommandSpec::new(["make", "up"])).await.unwrap();

        assert_eq!(code, 0);
        assert_eq!(
            sink.lines(),
            vec!["$ make up", "starting", "ready", "[exit 0]"]
        );
    }

    #[tokio::test]
    async fn test_block_is_not_interleaved() {
        let pm = MockProcessManager::new();
        pm.script(&["make", "down"], Script::lines(&["a", "b", "c"], 1));
        let sink = Arc::new(LogBuffer::default());
        let executor = OneShotExecutor::new(
            Arc::new(CommandRunner::new(pm)),
            sink.clone(),
            CancellationToken::new(),
        );

        let spec = CommandSpec::new(["make", "down"]);
        let (code, ()) = tokio::join!(executor.run(&spec), async {
            sink.write("follow line");
        });

        assert_eq!(code.unwrap(), 1);
        let lines = sink.lines();
        let start = lines.iter().position(|l| l == "a").unwrap();
        assert_eq!(&lines[start..start + 4], &["a", "b", "c", "[exit 1]"]);
    }

    #[tokio::test]
    async fn test_spawn_failure_reported() {
        let pm = MockProcessManager::new();
        pm.script(&["make", "up"], Script::Missing);
        let sink = Arc::new(LogBuffer::default());
        let executor = OneShotExecutor::new(
            Arc::new(CommandRunner::new(pm)),
            sink.clone(),
            CancellationToken::new(),
        );

        let result = executor.run(&CommandSpec::new(["make", "up"])).await;

        assert!(matches!(result, Err(crate::Error::CommandNotFound { .. })));
        assert_eq!(sink.lines(), vec!["$ make up", "[error: command not found: make]"]);
    }
}
