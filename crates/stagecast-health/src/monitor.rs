//! Interval-driven endpoint health monitoring.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::HealthError;
use crate::probe::EndpointProbe;

/// Fixed probing interval.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Displayed reachability of the monitored endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbeStatus {
    /// A probe is pending and no result applies yet.
    Checking,

    /// The last completed probe reached the endpoint.
    Online,

    /// The last completed probe failed.
    Offline,
}

/// Observable snapshot of the monitor.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointHealthState {
    /// Current displayed status.
    pub status: ProbeStatus,

    /// Endpoint currently being probed.
    pub endpoint: String,

    /// Completion time of the probe whose result is displayed.
    pub last_checked_at: Option<DateTime<Utc>>,

    /// Ordered fallback endpoints offered to the operator.
    pub candidate_endpoints: Vec<String>,
}

struct MonitorState {
    status: ProbeStatus,
    endpoint: String,
    last_checked_at: Option<DateTime<Utc>>,
    candidates: Vec<String>,

    /// Generation handed to the next launched probe.
    next_generation: u64,

    /// Results from probes launched before the latest refresh no
    /// longer mean anything and are discarded on completion.
    generation_floor: u64,
}

struct MonitorInner {
    probe: Arc<dyn EndpointProbe>,
    state: Mutex<MonitorState>,
    watch_tx: watch::Sender<EndpointHealthState>,
}

impl MonitorInner {
    fn snapshot(state: &MonitorState) -> EndpointHealthState {
        EndpointHealthState {
            status: state.status,
            endpoint: state.endpoint.clone(),
            last_checked_at: state.last_checked_at,
            candidate_endpoints: state.candidates.clone(),
        }
    }

    fn publish(&self, state: &MonitorState) {
        // Receivers may all be gone; the monitor keeps probing anyway.
        let _ = self.watch_tx.send(Self::snapshot(state));
    }

    /// Apply a completed probe's result. Last completion wins among
    /// probes launched since the latest refresh.
    fn apply_result(&self, generation: u64, online: bool) {
        let mut state = self.state.lock();

        if generation < state.generation_floor {
            debug!(generation, "Discarding stale probe result");
            return;
        }

        state.status = if online {
            ProbeStatus::Online
        } else {
            ProbeStatus::Offline
        };
        state.last_checked_at = Some(Utc::now());

        debug!(status = ?state.status, endpoint = %state.endpoint, "Probe completed");
        self.publish(&state);
    }
}

/// Polls an ingestion endpoint on a fixed interval and offers fallback
/// endpoints when it is unreachable.
///
/// Probes are fire-and-forget: a probe in flight is not cancelled by
/// the next scheduled one, and overlapping completions resolve
/// last-completion-wins.
pub struct EndpointHealthMonitor {
    inner: Arc<MonitorInner>,
    watch_rx: watch::Receiver<EndpointHealthState>,
    on_select: Box<dyn Fn(&str) + Send + Sync>,
    task: JoinHandle<()>,
}

impl EndpointHealthMonitor {
    /// Spawn a monitor probing `endpoint` every `interval`.
    ///
    /// `on_select` is invoked when the operator switches to a fallback
    /// endpoint; the switch itself triggers no probe, the next cycle or
    /// a manual refresh picks it up.
    pub fn spawn(
        probe: Arc<dyn EndpointProbe>,
        endpoint: String,
        candidate_endpoints: Vec<String>,
        interval: Duration,
        on_select: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        let state = MonitorState {
            status: ProbeStatus::Checking,
            endpoint,
            last_checked_at: None,
            candidates: candidate_endpoints,
            next_generation: 0,
            generation_floor: 0,
        };
        let (watch_tx, watch_rx) = watch::channel(MonitorInner::snapshot(&state));

        let inner = Arc::new(MonitorInner {
            probe,
            state: Mutex::new(state),
            watch_tx,
        });

        let task = {
            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    // First tick fires immediately, covering the probe
                    // on mount.
                    ticker.tick().await;
                    launch_probe(&inner);
                }
            })
        };

        info!("Endpoint health monitor started");
        Self {
            inner,
            watch_rx,
            on_select: Box::new(on_select),
            task,
        }
    }

    /// Subscribe to state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<EndpointHealthState> {
        self.watch_rx.clone()
    }

    /// Current state snapshot.
    pub fn state(&self) -> EndpointHealthState {
        self.watch_rx.borrow().clone()
    }

    /// Re-probe now. The displayed status becomes Checking immediately
    /// and any in-flight probe's eventual result is discarded.
    pub fn refresh(&self) {
        {
            let mut state = self.inner.state.lock();
            state.generation_floor = state.next_generation;
            state.status = ProbeStatus::Checking;
            self.inner.publish(&state);
        }
        launch_probe(&self.inner);
    }

    /// Switch the monitored endpoint to one of the fallbacks and notify
    /// the embedder. Does not probe; see [`refresh`](Self::refresh).
    pub fn select_endpoint(&self, endpoint: &str) -> Result<(), HealthError> {
        if endpoint.trim().is_empty() {
            return Err(HealthError::InvalidEndpoint(
                "endpoint must be a non-empty string".to_string(),
            ));
        }

        {
            let mut state = self.inner.state.lock();
            state.endpoint = endpoint.to_string();
            info!(endpoint, "Endpoint selected");
            self.inner.publish(&state);
        }
        (self.on_select)(endpoint);
        Ok(())
    }
}

impl Drop for EndpointHealthMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Launch one fire-and-forget probe against the current endpoint.
fn launch_probe(inner: &Arc<MonitorInner>) {
    let (generation, endpoint) = {
        let mut state = inner.state.lock();
        let generation = state.next_generation;
        state.next_generation += 1;
        (generation, state.endpoint.clone())
    };

    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        let online = inner.probe.check(&endpoint).await;
        inner.apply_result(generation, online);
    });
}
