use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{future, stream, StreamExt};
use parking_lot::Mutex;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    process_manager::{
        base::{ChildProcess, ProcessManager},
        types::{BoxStream, CommandSpec, Spawned},
    },
};

const TERMINATED: i32 = 143;

/// What a mocked command does once spawned.
#[derive(Clone, Debug)]
pub enum Script {
    /// Print the lines, then exit with `code`.
    Exit {
        stdout: Vec<String>,
        stderr: Vec<String>,
        code: i32,
    },
    /// Print the lines, then run until terminated.
    Hang { stdout: Vec<String> },
    /// Fail to spawn as if the program did not exist.
    Missing,
}

impl Script {
    pub fn exit(code: i32) -> Self {
        Self::lines(&[], code)
    }

    pub fn lines(stdout: &[&str], code: i32) -> Self {
        Self::Exit {
            stdout: stdout.iter().map(ToString::to_string).collect(),
            stderr: vec![],
            code,
        }
    }

    pub fn hang(stdout: &[&str]) -> Self {
        Self::Hang {
            stdout: stdout.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockEvent {
    Spawn(Vec<String>),
    Terminate(Vec<String>),
}

#[derive(Debug, Default)]
struct MockState {
    scripts: HashMap<Vec<String>, Script>,
    events: Vec<MockEvent>,
    live: usize,
}

/// Records every spawn and termination; unknown commands exit 0 silently.
#[derive(Debug, Default, Clone)]
pub struct MockProcessManager {
    state: Arc<Mutex<MockState>>,
}

impl MockProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, cmd: &[&str], script: Script) {
        self.state
            .lock()
            .scripts
            .insert(cmd.iter().map(ToString::to_string).collect(), script);
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.state.lock().events.clone()
    }

    pub fn spawned(&self) -> Vec<Vec<String>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MockEvent::Spawn(cmd) => Some(cmd),
                MockEvent::Terminate(_) => None,
            })
            .collect()
    }

    /// Number of spawned processes that have not been reaped yet.
    pub fn live(&self) -> usize {
        self.state.lock().live
    }
}

fn until_cancelled(token: CancellationToken) -> BoxStream<String> {
    Box::pin(
        stream::once(async move { token.cancelled().await })
            .filter_map(|()| future::ready(None::<String>)),
    )
}

#[async_trait]
impl ProcessManager for MockProcessManager {
    async fn spawn(&self, spec: &CommandSpec) -> Result<Spawned> {
        let script = {
            let mut state = self.state.lock();
            let script = state
                .scripts
                .get(&spec.cmd)
                .cloned()
                .unwrap_or_else(|| Script::exit(0));
            if matches!(script, Script::Missing) {
                return Err(Error::CommandNotFound {
                    program: spec.cmd[0].clone(),
                });
            }
            state.events.push(MockEvent::Spawn(spec.cmd.clone()));
            state.live += 1;
            script
        };

        let token = CancellationToken::new();
        let (stdout, stderr, code): (BoxStream<String>, BoxStream<String>, _) = match script {
            Script::Exit {
                stdout,
                stderr,
                code,
            } => (
                Box::pin(stream::iter(stdout)),
                Box::pin(stream::iter(stderr)),
                Some(code),
            ),
            Script::Hang { stdout } => {
                let (tx, rx) = tokio::sync::mpsc::channel(stdout.len().max(1));
                for line in stdout {
                    let _ = tx.try_send(line);
                }
                drop(tx);
                (
                    Box::pin(ReceiverStream::new(rx).chain(until_cancelled(token.clone()))),
                    until_cancelled(token.clone()),
                    None,
                )
            }
            Script::Missing => unreachable!(),
        };

        Ok(Spawned {
            pid: None,
            stdout,
            stderr,
            child: Box::new(MockChild {
                cmd: spec.cmd.clone(),
                state: self.state.clone(),
                token,
                code,
                reaped: false,
            }),
        })
    }
}

struct MockChild {
    cmd: Vec<String>,
    state: Arc<Mutex<MockState>>,
    token: CancellationToken,
    code: Option<i32>,
    reaped: bool,
}

impl MockChild {
    fn reap(&mut self, code: i32) -> i32 {
        if !self.reaped {
            self.reaped = true;
            self.state.lock().live -= 1;
        }
        code
    }
}

#[async_trait]
impl ChildProcess for MockChild {
    async fn wait(&mut self) -> Result<i32> {
        let code = match self.code {
            Some(code) => code,
            None => {
                self.token.cancelled().await;
                TERMINATED
            }
        };
        Ok(self.reap(code))
    }

    async fn terminate(&mut self, _grace: Duration) -> Result<i32> {
        self.state
            .lock()
            .events
            .push(MockEvent::Terminate(self.cmd.clone()));
        self.token.cancel();
        Ok(self.reap(TERMINATED))
    }
}
