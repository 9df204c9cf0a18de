//! JVM child supervision
//!
//! A supervisor moves through `Created -> Running -> Terminated` once. While
//! running it drains both child streams, waits for the child, and tears the
//! child down if the invoker is asked to stop first. It returns after both
//! drains have finished, or once a shutdown request gives up on them.

use super::output::{spawn_drain, spawn_sink, ConsoleSink, OutputSink, StreamKind};
use super::shutdown::{exit_code, terminate, ShutdownListener};
use crate::error::{GetrunError, GetrunResult};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Everything needed to start the JVM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub java: PathBuf,
    pub jvm_args: Vec<String>,
    pub classpath: String,
    pub entry_point: String,
}

impl LaunchSpec {
    /// `<java> [jvm args] -cp <classpath> <entry point>`
    pub fn command_line(&self) -> Vec<String> {
        let mut line = vec![self.java.to_string_lossy().into_owned()];
        line.extend(self.jvm_args.iter().cloned());
        line.push("-cp".to_string());
        line.push(self.classpath.clone());
        line.push(self.entry_point.clone());
        line
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.java);
        cmd.args(&self.jvm_args)
            .arg("-cp")
            .arg(&self.classpath)
            .arg(&self.entry_point)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // The kernel signals the child when the spawning thread dies, which
        // covers a SIGKILLed invoker. Spawn from the runtime's main future.
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        cmd
    }
}

/// Lifecycle of a supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Created,
    Running,
    Terminated,
}

/// How the child ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedExit {
    pub pid: Option<u32>,
    pub status: ExitStatus,
    /// Child's exit code, `128 + signal` when killed by a signal
    pub code: i32,
    /// Whether the invoker stopped the child
    pub interrupted: bool,
}

impl SupervisedExit {
    /// Code for the invoker's own exit, truncated the way the OS would
    pub fn exit_byte(&self) -> u8 {
        (self.code & 0xff) as u8
    }
}

/// Kills the child if it is still running when dropped
struct ChildGuard {
    child: Child,
}

impl ChildGuard {
    const REAP_ATTEMPTS: usize = 40;
    const REAP_INTERVAL: Duration = Duration::from_millis(50);
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !matches!(self.child.try_wait(), Ok(None)) {
            return;
        }
        warn!("Supervisor dropped with child running, killing it");
        if let Err(e) = self.child.start_kill() {
            error!("{}", GetrunError::Supervision(format!("killing child: {}", e)));
            return;
        }
        // Only reached when supervision unwinds early; blocks the worker for
        // at most REAP_ATTEMPTS * REAP_INTERVAL.
        for _ in 0..Self::REAP_ATTEMPTS {
            if !matches!(self.child.try_wait(), Ok(None)) {
                return;
            }
            std::thread::sleep(Self::REAP_INTERVAL);
        }
        warn!("Child did not exit after kill");
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    Interrupted(&'static str),
}

/// Launches the JVM and supervises it until it exits
pub struct ProcessSupervisor {
    spec: LaunchSpec,
    grace: Duration,
    sink: Option<Box<dyn OutputSink>>,
    state: SupervisorState,
}

impl ProcessSupervisor {
    pub fn new(spec: LaunchSpec, grace: Duration) -> Self {
        Self {
            spec,
            grace,
            sink: Some(Box::new(ConsoleSink)),
            state: SupervisorState::Created,
        }
    }

    /// Send child output somewhere other than stdout
    pub fn with_sink(mut self, sink: Box<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Launch the child and supervise it, stopping it on SIGINT/SIGTERM/SIGHUP
    pub async fn launch_and_supervise(&mut self) -> GetrunResult<SupervisedExit> {
        let mut listener = ShutdownListener::register()?;
        self.launch_and_supervise_with(&mut listener).await
    }

    /// Launch the child and supervise it until it exits or `shutdown` fires.
    ///
    /// `shutdown` stays armed while output is drained: a request that arrives
    /// after the child exited abandons output still held open by descendants.
    pub async fn launch_and_supervise_with(
        &mut self,
        shutdown: &mut ShutdownListener,
    ) -> GetrunResult<SupervisedExit> {
        let sink = match (self.state, self.sink.take()) {
            (SupervisorState::Created, Some(sink)) => sink,
            _ => return Err(GetrunError::Internal("supervisor already launched".to_string())),
        };

        let command_line = self.spec.command_line().join(" ");
        debug!("Launching: {}", command_line);

        let mut child = self
            .spec
            .command()
            .spawn()
            .map_err(|e| GetrunError::launch(&command_line, e))?;
        let pid = child.id();
        self.state = SupervisorState::Running;
        info!("Started {} (pid {})", self.spec.entry_point, pid.unwrap_or_default());

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut guard = ChildGuard { child };

        let (Some(stdout), Some(stderr)) = (stdout, stderr) else {
            return Err(GetrunError::Internal("child streams not piped".to_string()));
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let mut drains = [
            spawn_drain(stdout, StreamKind::Stdout, tx.clone()),
            spawn_drain(stderr, StreamKind::Stderr, tx),
        ];
        let mut writer = spawn_sink(sink, rx);

        let outcome = tokio::select! {
            status = guard.child.wait() => Outcome::Exited(status),
            reason = shutdown.recv() => Outcome::Interrupted(reason),
        };

        let (status, mut interrupted) = match outcome {
            Outcome::Exited(status) => {
                let status = status
                    .map_err(|e| GetrunError::Supervision(format!("waiting for child: {}", e)))?;
                (status, false)
            }
            Outcome::Interrupted(reason) => {
                info!("Received {}, stopping child", reason);
                match terminate(&mut guard.child, self.grace).await {
                    Ok(status) => (status, true),
                    Err(e) => {
                        error!("{}", e);
                        return Err(e);
                    }
                }
            }
        };

        let drained = tokio::select! {
            _ = join_output(&mut drains, &mut writer) => true,
            reason = shutdown.recv() => {
                warn!("Received {} with child output still open, abandoning it", reason);
                false
            }
        };
        if !drained {
            for drain in &drains {
                drain.abort();
            }
            writer.abort();
            interrupted = true;
        }

        self.state = SupervisorState::Terminated;
        let code = exit_code(&status);
        debug!("Child {} exited with {}", pid.unwrap_or_default(), code);

        Ok(SupervisedExit {
            pid,
            status,
            code,
            interrupted,
        })
    }
}

/// Wait for both drains to reach end of stream, then for the writer
async fn join_output(drains: &mut [JoinHandle<usize>], writer: &mut JoinHandle<()>) {
    for drain in drains.iter_mut() {
        if let Err(e) = drain.await {
            warn!("Output drain failed: {}", e);
        }
    }
    if let Err(e) = writer.await {
        warn!("Output writer failed: {}", e);
    }
}
