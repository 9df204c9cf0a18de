//! Invoker shutdown signals and child teardown

use crate::error::{GetrunError, GetrunResult};
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Termination requests for the supervisor.
///
/// Handlers are installed in [`register`](Self::register), so signals that
/// arrive before [`recv`](Self::recv) is polled are not lost. `recv` can be
/// awaited repeatedly and is cancel-safe, so one listener covers both the
/// exit wait and the output drain that follows it.
pub struct ShutdownListener {
    rx: mpsc::UnboundedReceiver<&'static str>,
}

impl ShutdownListener {
    /// Listen for SIGINT, SIGTERM and SIGHUP
    #[cfg(unix)]
    pub fn register() -> GetrunResult<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let install = |kind: SignalKind| {
            signal(kind).map_err(|e| GetrunError::io("installing signal handler", e))
        };
        let mut interrupt = install(SignalKind::interrupt())?;
        let mut terminate = install(SignalKind::terminate())?;
        let mut hangup = install(SignalKind::hangup())?;

        let (tx, listener) = Self::channel();
        tokio::spawn(async move {
            loop {
                let reason = tokio::select! {
                    _ = interrupt.recv() => "SIGINT",
                    _ = terminate.recv() => "SIGTERM",
                    _ = hangup.recv() => "SIGHUP",
                };
                if tx.send(reason).is_err() {
                    break;
                }
            }
        });
        Ok(listener)
    }

    /// Listen for Ctrl-C
    #[cfg(not(unix))]
    pub fn register() -> GetrunResult<Self> {
        let (tx, listener) = Self::channel();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.send("Ctrl-C").is_err() {
                    break;
                }
            }
        });
        Ok(listener)
    }

    /// A listener fed by hand through the returned sender
    pub fn channel() -> (mpsc::UnboundedSender<&'static str>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Wait for the next termination request and name it.
    ///
    /// Never completes once every sender is gone.
    pub async fn recv(&mut self) -> &'static str {
        match self.rx.recv().await {
            Some(reason) => reason,
            None => std::future::pending().await,
        }
    }
}

/// Ask the child to stop, then force it after `grace`.
///
/// Returns the child's final status once it has been reaped.
pub async fn terminate(child: &mut Child, grace: Duration) -> GetrunResult<ExitStatus> {
    if let Some(status) = child
        .try_wait()
        .map_err(|e| GetrunError::Supervision(format!("polling child: {}", e)))?
    {
        return Ok(status);
    }

    request_stop(child);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => {
            status.map_err(|e| GetrunError::Supervision(format!("waiting for child: {}", e)))
        }
        Err(_) => {
            warn!("Child still running after {:?}, killing it", grace);
            child
                .kill()
                .await
                .map_err(|e| GetrunError::Supervision(format!("killing child: {}", e)))?;
            child
                .wait()
                .await
                .map_err(|e| GetrunError::Supervision(format!("waiting for child: {}", e)))
        }
    }
}

#[cfg(unix)]
fn request_stop(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    debug!("Sending SIGTERM to {}", pid);
    // SAFETY: plain syscall on a pid this process spawned and has not reaped
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        debug!("SIGTERM to {} failed: {}", pid, std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!("Stopping child failed: {}", e);
    }
}

/// Exit code to report for a child status.
///
/// A child killed by a signal reports `128 + signal`, as shells do.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
