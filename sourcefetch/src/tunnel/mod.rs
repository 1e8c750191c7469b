//! Tunnel supervision for the in-cluster staging service.
//!
//! A tunnel is a local TCP listener relaying traffic to a cluster service
//! that is not otherwise reachable. This module provides:
//! - The [`TunnelSupervisor`] / [`TunnelHandle`] seam used by the orchestrator
//! - [`KubectlPortForward`], which supervises a `kubectl port-forward` process
//! - A TCP [`ReadinessProbe`] replacing a fixed settling delay
//! - The single-slot shutdown channel ([`ShutdownSender`])
//!
//! # Architecture
//!
//! ```text
//! main thread                          worker thread ("port-forward")
//! ───────────                          ──────────────────────────────
//! start() ── spawn worker ───────────► spawn kubectl, report pid
//!         ◄── spawned / spawn error ──┘
//! wait_ready() ── TCP probe localhost:<port>
//! ... download ...                     poll child for early exit
//! stop() ── ShutdownReason ─(slot 1)─► SIGINT, wait (grace), kill
//!        ── join() ◄──────────────────┘ Terminated
//! ```
//!
//! An OS interrupt forwarded through [`crate::signal::InterruptRelay`] lands
//! in the same channel, so planned shutdown and user interrupt share one
//! teardown path.

mod error;
mod port_forward;
mod readiness;
pub(crate) mod shutdown;

pub use error::{TunnelError, TunnelResult};
pub use port_forward::{
    KubectlPortForward, PortForwardHandle, DEFAULT_PROGRAM, DEFAULT_STOP_GRACE,
};
pub use readiness::ReadinessProbe;
pub use shutdown::{ShutdownReason, ShutdownSender};

use std::fmt;

/// The in-cluster service a tunnel forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelTarget {
    /// Namespace of the service.
    pub service_namespace: String,
    /// Name of the service (without the `svc/` prefix).
    pub service_name: String,
    /// Port bound on the local host.
    pub local_port: u16,
    /// Port of the service inside the cluster.
    pub service_port: u16,
}

impl fmt::Display for TunnelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {}:{}",
            self.service_namespace, self.service_name, self.local_port, self.service_port
        )
    }
}

/// Lifecycle of a tunnel process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    Starting,
    Active,
    Terminating,
    Terminated,
}

/// Launches tunnels.
pub trait TunnelSupervisor {
    type Handle: TunnelHandle;

    /// Launch a tunnel and return without waiting for it to exit.
    ///
    /// A returned handle means the process was spawned; it does not mean
    /// the tunnel accepts traffic yet (see [`TunnelHandle::wait_ready`]).
    fn start(&self, target: &TunnelTarget) -> TunnelResult<Self::Handle>;
}

/// A live tunnel.
pub trait TunnelHandle {
    /// Local port the tunnel listens on.
    fn local_port(&self) -> u16;

    /// Block until the tunnel accepts connections or the probe gives up.
    fn wait_ready(&self, probe: &ReadinessProbe) -> TunnelResult<()>;

    /// Sender feeding the shutdown channel, for relaying OS interrupts.
    fn shutdown_sender(&self) -> Option<ShutdownSender> {
        None
    }

    /// Signal the tunnel and block until it has shut down.
    ///
    /// Consumes the handle, so it can be called at most once.
    fn stop(self) -> TunnelResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_display() {
        let target = TunnelTarget {
            service_namespace: "flux-system".to_string(),
            service_name: "source-controller".to_string(),
            local_port: 8080,
            service_port: 80,
        };
        assert_eq!(target.to_string(), "flux-system/source-controller 8080:80");
    }
}
