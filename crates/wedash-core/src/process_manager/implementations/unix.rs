use std::{
    io,
    os::unix::process::ExitStatusExt,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use futures::stream;
use libc::{killpg, setsid, SIGKILL, SIGTERM};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
    time::timeout,
};

use crate::{
    error::{Error, Result},
    process_manager::{
        base::{ChildProcess, ProcessManager},
        types::{BoxStream, CommandSpec, Spawned},
    },
};

#[derive(Debug)]
struct UnixChild {
    child: Child,
    pgid: libc::pid_t,
}

/// Unix-specific process manager.
///
/// Every process is started as the leader of a new session, so termination
/// reaches the whole process group it spawns.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixProcessManager;

impl UnixProcessManager {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn spawn_error(spec: &CommandSpec, err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::CommandNotFound {
            program: spec.cmd[0].clone(),
        }
    } else {
        Error::SpawnFailure {
            argv: spec.display(),
            source: err,
        }
    }
}

fn lines<R>(reader: R) -> BoxStream<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    Box::pin(stream::unfold(BufReader::new(reader), |mut reader| async move {
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                Some((String::from_utf8_lossy(&buf).into_owned(), reader))
            }
        }
    }))
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or_default()
}

fn signal_group(pgid: libc::pid_t, signal: libc::c_int) -> Result<()> {
    #[allow(unsafe_code)]
    let rc = unsafe { killpg(pgid, signal) };
    if rc == -1 {
        let err = io::Error::last_os_error();
        // The group is already gone.
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(Error::IOError(err));
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl ProcessManager for UnixProcessManager {
    async fn spawn(&self, spec: &CommandSpec) -> Result<Spawned> {
        let Some((program, args)) = spec.cmd.split_first() else {
            return Err(Error::EmptyCommand);
        };

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        #[allow(unsafe_code)]
        unsafe {
            cmd.pre_exec(|| {
                if setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|err| spawn_error(spec, err))?;

        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::IOError(std::io::Error::other("stdout not piped")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::IOError(std::io::Error::other("stderr not piped")))?;

        let pgid = libc::pid_t::try_from(
            pid.ok_or_else(|| Error::IOError(std::io::Error::other("pid not available")))?,
        )
        .map_err(|_| Error::IOError(std::io::Error::other("pid out of range")))?;

        Ok(Spawned {
            pid,
            stdout: lines(stdout),
            stderr: lines(stderr),
            child: Box::new(UnixChild { child, pgid }),
        })
    }
}

#[async_trait::async_trait]
impl ChildProcess for UnixChild {
    async fn wait(&mut self) -> Result<i32> {
        let status = self.child.wait().await?;
        Ok(exit_code(status))
    }

    async fn terminate(&mut self, grace: Duration) -> Result<i32> {
        if let Some(status) = self.child.try_wait()? {
            return Ok(exit_code(status));
        }

        signal_group(self.pgid, SIGTERM)?;
        if let Ok(status) = timeout(grace, self.child.wait()).await {
            return Ok(exit_code(status?));
        }

        tracing::debug!("Process group {} ignored SIGTERM, killing", self.pgid);
        signal_group(self.pgid, SIGKILL)?;
        Ok(exit_code(self.child.wait().await?))
    }
}
