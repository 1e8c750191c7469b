//! Error types for tunnel supervision.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type for tunnel operations.
pub type TunnelResult<T> = Result<T, TunnelError>;

/// Errors that can occur while starting, probing or stopping a tunnel.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The port-forward program could not be launched.
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The supervising worker thread could not be created.
    #[error("failed to start tunnel worker: {0}")]
    Worker(#[source] io::Error),

    /// The supervising worker thread panicked.
    #[error("tunnel worker panicked")]
    WorkerPanicked,

    /// The port-forward process exited before the tunnel became ready.
    #[error("port-forward process exited early ({status})")]
    ExitedEarly { status: String },

    /// Shutdown was requested before the tunnel became ready.
    #[error("port forwarding was stopped before it became ready")]
    Stopped,

    /// Nothing accepted connections on the local port within the timeout.
    #[error("nothing listening on localhost:{port} after {}ms", waited.as_millis())]
    NotReady { port: u16, waited: Duration },

    /// Delivering the shutdown signal failed.
    #[error("failed to signal port-forward process: {0}")]
    Signal(#[source] io::Error),

    /// Waiting for the process to exit failed.
    #[error("failed to wait for port-forward process: {0}")]
    Wait(#[source] io::Error),
}
