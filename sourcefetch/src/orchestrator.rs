//! Sequencing of a single fetch run.
//!
//! ```text
//! Idle -> TunnelStarting -> TunnelActive -> Resolving -> Downloading
//!      -> Extracting -> TunnelStopping -> Done | Failed
//! ```
//!
//! Once the tunnel has started, every path (success, readiness failure,
//! staging, resolution, download or extraction errors, operator interrupt)
//! passes through `TunnelStopping` exactly once. A failed start ends in
//! `Failed` without a stop.

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, error, info};

use crate::config::FetchConfig;
use crate::error::{RunError, RunResult};
use crate::fetch::{ArtifactFetcher, FetchError, FetchResult, FetchSummary, HttpFetcher};
use crate::request::FetchRequest;
use crate::signal::InterruptRelay;
use crate::source::{self, ArtifactUrl, KubeStatusResolver, StatusUrlResolver};
use crate::staging::StagingDirectory;
use crate::tunnel::{KubectlPortForward, ReadinessProbe, TunnelHandle, TunnelSupervisor};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    TunnelStarting,
    TunnelActive,
    Resolving,
    Downloading,
    Extracting,
    TunnelStopping,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::TunnelStarting => "tunnel-starting",
            Phase::TunnelActive => "tunnel-active",
            Phase::Resolving => "resolving",
            Phase::Downloading => "downloading",
            Phase::Extracting => "extracting",
            Phase::TunnelStopping => "tunnel-stopping",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Directory the artifact was extracted into.
    pub staging_dir: PathBuf,
    /// URL the artifact was downloaded from.
    pub url: ArtifactUrl,
    pub summary: FetchSummary,
}

/// Runs tunnel, resolution and download in order, always tearing the
/// tunnel down once it was started.
#[derive(Debug)]
pub struct Orchestrator<S, R, F> {
    supervisor: S,
    resolver: R,
    fetcher: F,
    probe: ReadinessProbe,
    staging_root: PathBuf,
    relay: Option<InterruptRelay>,
}

impl Orchestrator<KubectlPortForward, KubeStatusResolver, HttpFetcher> {
    /// Production wiring from runtime settings.
    pub fn from_config(config: &FetchConfig) -> FetchResult<Self> {
        Ok(Self::new(
            config.port_forward(),
            config.status_resolver(),
            config.http_fetcher()?,
        )
        .with_readiness_probe(config.readiness_probe())
        .with_staging_root(config.staging_root()))
    }
}

impl<S, R, F> Orchestrator<S, R, F>
where
    S: TunnelSupervisor,
    R: StatusUrlResolver,
    F: ArtifactFetcher,
{
    pub fn new(supervisor: S, resolver: R, fetcher: F) -> Self {
        Self {
            supervisor,
            resolver,
            fetcher,
            probe: ReadinessProbe::default(),
            staging_root: std::env::temp_dir(),
            relay: None,
        }
    }

    pub fn with_readiness_probe(mut self, probe: ReadinessProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Directory under which staging directories are created.
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = root.into();
        self
    }

    /// Forward interrupts into the tunnel's shutdown channel while it is up.
    pub fn with_interrupt_relay(mut self, relay: InterruptRelay) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Fetch the artifact described by `request`.
    pub fn run(&self, request: &FetchRequest) -> RunResult<FetchOutcome> {
        let mut phase = PhaseTracker::default();

        if let Some(relay) = &self.relay {
            relay.begin();
        }
        phase.enter(Phase::TunnelStarting);
        let handle = match self.supervisor.start(request.tunnel()) {
            Ok(handle) => handle,
            Err(err) => {
                self.end_relay();
                phase.enter(Phase::Failed);
                return Err(RunError::TunnelStart(err));
            }
        };
        phase.enter(Phase::TunnelActive);

        if let (Some(relay), Some(sender)) = (&self.relay, handle.shutdown_sender()) {
            relay.arm(sender);
        }

        let result = self.fetch_through(&handle, request, &mut phase);

        phase.enter(Phase::TunnelStopping);
        let teardown = handle.stop();
        self.end_relay();

        let result = match (result, teardown) {
            (result, Ok(())) => result,
            (Ok(_), Err(stop_err)) => Err(RunError::Teardown(stop_err)),
            (Err(err), Err(stop_err)) => {
                error!(error = %stop_err, "Failed to stop port forwarding");
                Err(err)
            }
        };

        let result = match result {
            Err(err) if self.interrupted() && !matches!(err, RunError::Teardown(_)) => {
                debug!(error = %err, "Run failed after interrupt");
                Err(RunError::Interrupted)
            }
            other => other,
        };

        match &result {
            Ok(outcome) => {
                phase.enter(Phase::Done);
                info!(
                    dir = %outcome.staging_dir.display(),
                    entries = outcome.summary.entries,
                    "Fetch complete"
                );
            }
            Err(_) => phase.enter(Phase::Failed),
        }
        result
    }

    /// Everything that happens while the tunnel is up.
    fn fetch_through(
        &self,
        handle: &S::Handle,
        request: &FetchRequest,
        phase: &mut PhaseTracker,
    ) -> RunResult<FetchOutcome> {
        handle
            .wait_ready(&self.probe)
            .map_err(RunError::TunnelNotReady)?;

        let staging = StagingDirectory::create(&self.staging_root, request)?;
        info!(dir = %staging.path().display(), "Created staging directory");

        phase.enter(Phase::Resolving);
        let url = source::resolve_artifact_url(request, handle.local_port(), &self.resolver)?;

        phase.enter(Phase::Downloading);
        info!(url = %url, "Downloading artifact");
        let summary = match self.fetcher.fetch(&url, staging.path()) {
            Ok(summary) => summary,
            Err(err) => {
                if matches!(err, FetchError::Extraction { .. }) {
                    phase.enter(Phase::Extracting);
                }
                return Err(err.into());
            }
        };
        phase.enter(Phase::Extracting);

        Ok(FetchOutcome {
            staging_dir: staging.into_path(),
            url,
            summary,
        })
    }

    fn end_relay(&self) {
        if let Some(relay) = &self.relay {
            relay.disarm();
        }
    }

    fn interrupted(&self) -> bool {
        self.relay
            .as_ref()
            .is_some_and(InterruptRelay::was_interrupted)
    }
}

/// Logs phase transitions.
#[derive(Debug)]
struct PhaseTracker {
    current: Phase,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            current: Phase::Idle,
        }
    }
}

impl PhaseTracker {
    fn enter(&mut self, next: Phase) {
        debug!(from = %self.current, to = %next, "Phase transition");
        self.current = next;
    }
}
