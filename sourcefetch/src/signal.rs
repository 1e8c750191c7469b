//! Relays operator interrupts into the tunnel's shutdown channel.
//!
//! A run is marked in flight from just before the tunnel starts until its
//! teardown has finished. While the tunnel is up the relay is armed with the
//! tunnel's [`ShutdownSender`], so an interrupt travels the same path as a
//! planned shutdown and the orchestrator still joins the worker before
//! returning. An interrupt that lands before arming is forwarded on arm.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::tunnel::{ShutdownReason, ShutdownSender};

/// Cloneable interrupt relay, typically shared with a Ctrl-C handler.
#[derive(Debug, Clone, Default)]
pub struct InterruptRelay {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    sender: Mutex<Option<ShutdownSender>>,
    interrupted: AtomicBool,
    in_flight: AtomicBool,
}

impl InterruptRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a run as in flight. Interrupts are recorded and absorbed until
    /// [`disarm`](Self::disarm), even before a sender is armed.
    pub fn begin(&self) {
        self.inner.in_flight.store(true, Ordering::SeqCst);
    }

    /// Forward interrupts to `sender`, including one already recorded.
    pub fn arm(&self, sender: ShutdownSender) {
        let mut guard = self.inner.sender.lock();
        if self.was_interrupted() && sender.request(ShutdownReason::Interrupted) {
            warn!("Interrupted during tunnel start, stopping port forwarding");
        }
        *guard = Some(sender);
        debug!("Interrupt relay armed");
    }

    /// Stop forwarding interrupts and end the in-flight run.
    pub fn disarm(&self) {
        let mut guard = self.inner.sender.lock();
        self.inner.in_flight.store(false, Ordering::SeqCst);
        if guard.take().is_some() {
            debug!("Interrupt relay disarmed");
        }
    }

    /// Whether a run is between [`begin`](Self::begin) and
    /// [`disarm`](Self::disarm).
    pub fn is_in_flight(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_armed(&self) -> bool {
        self.inner.sender.lock().is_some()
    }

    /// Record an interrupt and forward it if armed.
    ///
    /// Returns `false` when no run is in flight, meaning there is no tunnel
    /// to tear down and the caller may exit immediately.
    pub fn trigger(&self) -> bool {
        self.inner.interrupted.store(true, Ordering::SeqCst);

        let guard = self.inner.sender.lock();
        match guard.as_ref() {
            Some(sender) => {
                if sender.request(ShutdownReason::Interrupted) {
                    warn!("Interrupted, stopping port forwarding");
                } else {
                    debug!("Shutdown already in progress");
                }
                true
            }
            None => self.is_in_flight(),
        }
    }

    /// Whether [`trigger`](Self::trigger) has been called.
    pub fn was_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::SeqCst)
    }
}
