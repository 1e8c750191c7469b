//! `kubectl port-forward` supervision.
//!
//! The port-forward process is owned by a dedicated worker thread which
//! spawns it, waits for a [`ShutdownReason`] on the single-slot channel,
//! then interrupts and reaps it. The main thread only ever talks to the
//! worker through that channel and the final `join`.

use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::error::{TunnelError, TunnelResult};
use super::readiness::ReadinessProbe;
use super::shutdown::{self, ShutdownReason, ShutdownSender};
use super::{TunnelHandle, TunnelState, TunnelSupervisor, TunnelTarget};

/// Default port-forward program.
pub const DEFAULT_PROGRAM: &str = "kubectl";

/// Default time a process gets to exit after SIGINT before it is killed.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// How often the worker checks the child while idle or shutting down.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launches `kubectl port-forward` processes.
#[derive(Debug, Clone)]
pub struct KubectlPortForward {
    program: String,
    args: Vec<String>,
    stop_grace: Duration,
}

impl Default for KubectlPortForward {
    fn default() -> Self {
        Self::new()
    }
}

impl KubectlPortForward {
    /// Use `kubectl` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: Vec::new(),
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// Use a different program (e.g. an absolute path to kubectl).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments placed before `port-forward`, such as `--context <name>`.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set how long to wait after SIGINT before killing the process.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the port-forward command for `target`.
    pub fn command(&self, target: &TunnelTarget) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("port-forward")
            .arg("-n")
            .arg(&target.service_namespace)
            .arg(format!("svc/{}", target.service_name))
            .arg(format!("{}:{}", target.local_port, target.service_port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        command
    }
}

impl TunnelSupervisor for KubectlPortForward {
    type Handle = PortForwardHandle;

    fn start(&self, target: &TunnelTarget) -> TunnelResult<PortForwardHandle> {
        let command = self.command(target);
        let shared = Arc::new(Shared::new());
        let (shutdown_tx, shutdown_rx) = shutdown::channel();
        let (spawned_tx, spawned_rx) = mpsc::channel();

        let worker_shared = Arc::clone(&shared);
        let grace = self.stop_grace;
        let worker = thread::Builder::new()
            .name("port-forward".to_string())
            .spawn(move || supervise(command, worker_shared, shutdown_rx, spawned_tx, grace))
            .map_err(TunnelError::Worker)?;

        match spawned_rx.recv() {
            Ok(Ok(pid)) => {
                info!(pid, target = %target, "Port forwarding started");
                Ok(PortForwardHandle {
                    local_port: target.local_port,
                    pid,
                    shared,
                    shutdown: shutdown_tx,
                    worker,
                })
            }
            Ok(Err(source)) => {
                let _ = worker.join();
                Err(TunnelError::Spawn {
                    program: self.program.clone(),
                    source,
                })
            }
            Err(_) => {
                let _ = worker.join();
                Err(TunnelError::WorkerPanicked)
            }
        }
    }
}

/// Handle to a running `kubectl port-forward` process.
#[derive(Debug)]
pub struct PortForwardHandle {
    local_port: u16,
    pid: u32,
    shared: Arc<Shared>,
    shutdown: ShutdownSender,
    worker: JoinHandle<TunnelResult<()>>,
}

impl PortForwardHandle {
    /// OS process id of the port-forward process.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Current lifecycle state as seen by the worker.
    pub fn state(&self) -> TunnelState {
        *self.shared.state.lock()
    }
}

impl TunnelHandle for PortForwardHandle {
    fn local_port(&self) -> u16 {
        self.local_port
    }

    fn wait_ready(&self, probe: &ReadinessProbe) -> TunnelResult<()> {
        probe.wait(self.local_port, || {
            if let Some(status) = self.shared.exit_status() {
                return Some(TunnelError::ExitedEarly { status });
            }
            match self.state() {
                TunnelState::Terminating | TunnelState::Terminated => Some(TunnelError::Stopped),
                TunnelState::Starting | TunnelState::Active => None,
            }
        })
    }

    fn shutdown_sender(&self) -> Option<ShutdownSender> {
        Some(self.shutdown.clone())
    }

    fn stop(self) -> TunnelResult<()> {
        if !self.shutdown.request(ShutdownReason::Completed) {
            debug!("Shutdown already requested");
        }
        match self.worker.join() {
            Ok(result) => result,
            Err(_) => Err(TunnelError::WorkerPanicked),
        }
    }
}

/// State shared between the handle and the worker.
#[derive(Debug)]
struct Shared {
    state: Mutex<TunnelState>,
    exited: Mutex<Option<String>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(TunnelState::Starting),
            exited: Mutex::new(None),
        }
    }

    fn set_state(&self, state: TunnelState) {
        *self.state.lock() = state;
    }

    fn record_exit(&self, status: ExitStatus) {
        *self.exited.lock() = Some(status.to_string());
    }

    fn exit_status(&self) -> Option<String> {
        self.exited.lock().clone()
    }
}

/// Worker body: owns the child for its whole life.
fn supervise(
    mut command: Command,
    shared: Arc<Shared>,
    shutdown_rx: Receiver<ShutdownReason>,
    spawned_tx: mpsc::Sender<io::Result<u32>>,
    grace: Duration,
) -> TunnelResult<()> {
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            shared.set_state(TunnelState::Terminated);
            let _ = spawned_tx.send(Err(err));
            return Ok(());
        }
    };
    shared.set_state(TunnelState::Active);
    let _ = spawned_tx.send(Ok(child.id()));
    drop(spawned_tx);

    let reason = wait_for_shutdown(&mut child, &shared, &shutdown_rx);
    debug!(%reason, pid = child.id(), "Stopping port forwarding");
    shared.set_state(TunnelState::Terminating);

    let result = terminate(&mut child, &shared, grace);
    shared.set_state(TunnelState::Terminated);

    match &result {
        Ok(()) => info!(%reason, "Ended port forwarding"),
        Err(err) => error!(error = %err, "Port forwarding did not shut down cleanly"),
    }
    result
}

/// Block until shutdown is requested, noting an unexpected exit meanwhile.
fn wait_for_shutdown(
    child: &mut Child,
    shared: &Shared,
    shutdown_rx: &Receiver<ShutdownReason>,
) -> ShutdownReason {
    loop {
        match shutdown_rx.recv_timeout(EXIT_POLL_INTERVAL) {
            Ok(reason) => return reason,
            // Every sender is gone: nobody can ask any more, so stop now.
            Err(RecvTimeoutError::Disconnected) => return ShutdownReason::Completed,
            Err(RecvTimeoutError::Timeout) => {
                if shared.exit_status().is_some() {
                    continue;
                }
                match child.try_wait() {
                    Ok(Some(status)) => {
                        warn!(%status, "Port-forward process exited unexpectedly");
                        shared.record_exit(status);
                    }
                    Ok(None) => {}
                    Err(err) => debug!(error = %err, "Failed to poll port-forward process"),
                }
            }
        }
    }
}

fn terminate(child: &mut Child, shared: &Shared, grace: Duration) -> TunnelResult<()> {
    // Already reaped by `try_wait`.
    if shared.exit_status().is_some() {
        return Ok(());
    }

    if let Err(err) = interrupt(child) {
        let _ = child.kill();
        let _ = child.wait();
        return Err(TunnelError::Signal(err));
    }

    let status = wait_with_grace(child, grace).map_err(TunnelError::Wait)?;
    debug!(%status, "Port-forward process exited");
    Ok(())
}

#[cfg(unix)]
fn interrupt(child: &mut Child) -> io::Result<()> {
    let pid = libc::pid_t::try_from(child.id()).map_err(io::Error::other)?;
    // SAFETY: `pid` is our own child and has not been reaped yet, so the id
    // cannot have been reused by another process.
    let rc = unsafe { libc::kill(pid, libc::SIGINT) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) -> io::Result<()> {
    child.kill()
}

fn wait_with_grace(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    let deadline = Instant::now() + grace;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "Port-forward process ignored interrupt, killing it"
            );
            child.kill()?;
            return child.wait();
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}
