use std::{fmt::Debug, path::PathBuf, pin::Pin};

use futures::Stream;

use crate::process_manager::base::ChildProcess;

pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Argument vector and working directory of one command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub cmd: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    #[must_use]
    pub fn new<I, T>(cmd: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The argument vector joined with spaces, for log headers.
    #[must_use]
    pub fn display(&self) -> String {
        self.cmd.join(" ")
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// How a command ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Exit {
    pub code: i32,
    /// The process was terminated because its caller cancelled it.
    pub cancelled: bool,
}

pub struct Spawned {
    pub pid: Option<u32>,
    pub stdout: BoxStream<String>,
    pub stderr: BoxStream<String>,
    pub child: Box<dyn ChildProcess>,
}

impl Debug for Spawned {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spawned")
            .field("pid", &self.pid)
            .field("stdout", &"<stream>")
            .field("stderr", &"<stream>")
            .field("child", &"<child>")
            .finish()
    }
}
