//! Single-slot shutdown channel between the orchestrator and the tunnel worker.

use std::fmt;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

/// Why the tunnel is being shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The run finished, successfully or not.
    Completed,
    /// The operator interrupted the process.
    Interrupted,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Completed => f.write_str("completed"),
            ShutdownReason::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// Non-blocking sending half of the shutdown channel.
///
/// Sends never block: if a request is already queued, or the worker is gone,
/// the new request is dropped and `false` is returned.
#[derive(Debug, Clone)]
pub struct ShutdownSender {
    tx: SyncSender<ShutdownReason>,
}

impl ShutdownSender {
    /// Queue a shutdown request. Returns `true` if it was enqueued.
    pub fn request(&self, reason: ShutdownReason) -> bool {
        match self.tx.try_send(reason) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Create the single-slot channel.
pub(crate) fn channel() -> (ShutdownSender, Receiver<ShutdownReason>) {
    let (tx, rx) = mpsc::sync_channel(1);
    (ShutdownSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_wins() {
        let (tx, rx) = channel();

        assert!(tx.request(ShutdownReason::Interrupted));
        assert!(!tx.request(ShutdownReason::Completed));

        assert_eq!(rx.recv().unwrap(), ShutdownReason::Interrupted);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_request_after_receiver_dropped() {
        let (tx, rx) = channel();
        drop(rx);
        assert!(!tx.request(ShutdownReason::Completed));
    }
}
