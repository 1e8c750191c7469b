//! TCP readiness probing for the local end of a tunnel.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::error::{TunnelError, TunnelResult};

/// Default time to wait for the tunnel to accept connections.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay between connection attempts.
pub const DEFAULT_READY_INTERVAL: Duration = Duration::from_millis(200);

/// How long, and how often, to poll the local port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessProbe {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_READY_TIMEOUT,
            interval: DEFAULT_READY_INTERVAL,
        }
    }
}

impl ReadinessProbe {
    /// Create a probe with the given overall timeout and default interval.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Poll `127.0.0.1:<port>` until it accepts a connection.
    ///
    /// `abort` is checked before every attempt; returning `Some(error)` stops
    /// the probe early (e.g. when the tunnel process already exited).
    pub fn wait<F>(&self, port: u16, mut abort: F) -> TunnelResult<()>
    where
        F: FnMut() -> Option<TunnelError>,
    {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            if let Some(err) = abort() {
                return Err(err);
            }

            attempts += 1;
            let connect_timeout = self.interval.max(Duration::from_millis(10));
            if TcpStream::connect_timeout(&addr, connect_timeout).is_ok() {
                debug!(
                    port,
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Tunnel is accepting connections"
                );
                return Ok(());
            }

            if started.elapsed() >= self.timeout {
                return Err(TunnelError::NotReady {
                    port,
                    waited: self.timeout,
                });
            }

            thread::sleep(self.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn fast_probe(timeout_ms: u64) -> ReadinessProbe {
        ReadinessProbe {
            timeout: Duration::from_millis(timeout_ms),
            interval: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_default_probe() {
        let probe = ReadinessProbe::default();
        assert_eq!(probe.timeout, Duration::from_secs(10));
        assert_eq!(probe.interval, Duration::from_millis(200));
    }

    #[test]
    fn test_ready_when_listening() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(fast_probe(1000).wait(port, || None).is_ok());
    }

    #[test]
    fn test_times_out_when_nothing_listens() {
        // Bind then drop to get a port that is very likely closed.
        let port = {
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = fast_probe(150).wait(port, || None).unwrap_err();
        assert!(matches!(err, TunnelError::NotReady { port: p, .. } if p == port));
    }

    #[test]
    fn test_abort_short_circuits() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let err = fast_probe(1000)
            .wait(port, || {
                Some(TunnelError::ExitedEarly {
                    status: "exit status: 1".to_string(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, TunnelError::ExitedEarly { .. }));
    }
}
