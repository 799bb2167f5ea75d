//! The fetch/compare/reconcile loop.

use std::time::Duration;

use tracing::{info, warn};

use sroof_core::{
    FlowStore, RawTopology, ReconcileReport, Reconciler, Srgb, SrResult, TopologyGraph,
    TopologySource,
};

/// Ceiling for the transport-error backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Daemon settings.
#[derive(Debug, Clone, Copy)]
pub struct DaemonConfig {
    /// Time between topology polls.
    pub poll_interval: Duration,
    /// SRGB the engine allocates segment IDs from.
    pub srgb: Srgb,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            srgb: Srgb::default(),
        }
    }
}

/// The daemon: owns the collaborators and the last reconciled
/// snapshot.
pub struct SrDaemon<S, T> {
    store: S,
    source: T,
    reconciler: Reconciler,
    config: DaemonConfig,
    /// Snapshot the installed state currently reflects.
    last: TopologyGraph,
}

impl<S: FlowStore, T: TopologySource> SrDaemon<S, T> {
    /// Creates a daemon; no I/O happens until [`Self::sync_once`] or
    /// [`Self::run`].
    pub fn new(config: DaemonConfig, store: S, source: T) -> Self {
        Self {
            store,
            source,
            reconciler: Reconciler::new(config.srgb),
            config,
            last: TopologyGraph::new(),
        }
    }

    /// The snapshot installed state currently reflects.
    pub fn last_snapshot(&self) -> &TopologyGraph {
        &self.last
    }

    async fn fetch_graph(&self) -> SrResult<TopologyGraph> {
        let raw: RawTopology = self.source.fetch_topology().await?;
        Ok(TopologyGraph::from_raw(&raw))
    }

    /// Fetches the topology and runs a full installation against it,
    /// trusting no previously installed state.
    pub async fn sync_once(&mut self) -> SrResult<ReconcileReport> {
        let graph = self.fetch_graph().await?;
        info!(switches = graph.switch_count(), "running full installation");
        let report = self.reconciler.full_sync(&graph, &self.store).await;
        self.last = graph;
        Ok(report)
    }

    /// Fetches the topology and runs one incremental pass against the
    /// last reconciled snapshot. Structurally unchanged topology is a
    /// no-op.
    pub async fn step(&mut self) -> SrResult<ReconcileReport> {
        let graph = self.fetch_graph().await?;
        let report = self.reconciler.reconcile(&self.last, &graph, &self.store).await;
        if !report.skipped {
            info!(
                installed = report.installed,
                removed = report.removed,
                failed = report.failed,
                "topology change reconciled"
            );
            self.last = graph;
        }
        Ok(report)
    }

    /// Runs the daemon until ctrl-c: initial full sync (retried with
    /// backoff until the controller answers), then the poll loop.
    /// Transport errors back off without touching installed state;
    /// an in-flight pass always finishes before shutdown.
    pub async fn run(&mut self) -> SrResult<()> {
        let mut backoff = self.config.poll_interval;
        loop {
            match self.sync_once().await {
                Ok(report) => {
                    info!(installed = report.installed, failed = report.failed, "initial convergence done");
                    break;
                }
                Err(err) => {
                    warn!(%err, delay = ?backoff, "initial topology fetch failed, backing off");
                    if !sleep_or_shutdown(backoff).await {
                        return Ok(());
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        backoff = self.config.poll_interval;
        loop {
            if !sleep_or_shutdown(backoff).await {
                info!("shutdown requested, stopping after completed pass");
                return Ok(());
            }
            match self.step().await {
                Ok(_) => backoff = self.config.poll_interval,
                Err(err) => {
                    // Stale or partial topology is worse than waiting.
                    warn!(%err, delay = ?backoff, "topology fetch failed, backing off");
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }
}

/// Sleeps for `delay`; returns false if ctrl-c arrived instead.
async fn sleep_or_shutdown(delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = tokio::signal::ctrl_c() => false,
    }
}
