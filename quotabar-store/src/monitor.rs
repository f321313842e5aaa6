//! Quota monitor.
//!
//! Runs refresh cycles over the enabled providers and keeps the latest
//! snapshot, status and error for each one.
//!
//! ## Refresh Cycle
//!
//! 1. Take the next sequence number and copy the enabled probe set.
//! 2. Run every probe concurrently, each bounded by the probe timeout.
//! 3. Apply all results in one write-locked step. Results stamped with an
//!    older sequence than the stored one are discarded.
//! 4. Broadcast degrading transitions and bump the change counter.
//!
//! Probe tasks never touch the state map; they only return values.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tracing::{debug, info, instrument, warn};

use quotabar_core::{ProbeError, ProbeErrorKind, ProviderKind, QuotaStatus, UsageSnapshot};
use quotabar_providers::ProviderRegistry;

use crate::transition::StatusTransition;

/// Default per-probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(45);

/// Default bound on a whole refresh.
pub const DEFAULT_REFRESH_DEADLINE: Duration = Duration::from_secs(60);

const TRANSITION_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Config
// ============================================================================

/// Timing configuration for the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Upper bound for a single probe call.
    pub probe_timeout: Duration,
    /// Upper bound for a whole refresh.
    pub refresh_deadline: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            refresh_deadline: DEFAULT_REFRESH_DEADLINE,
        }
    }
}

impl MonitorConfig {
    /// The timeout each probe actually gets.
    pub fn effective_probe_timeout(&self) -> Duration {
        self.probe_timeout.min(self.refresh_deadline)
    }
}

// ============================================================================
// Provider State
// ============================================================================

/// Where a provider stands after the latest refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ProviderHealth {
    /// Never probed successfully or unsuccessfully.
    Unprobed,
    /// Latest probe succeeded.
    Status(QuotaStatus),
    /// Latest probe failed; an older snapshot may still be held.
    Failed(ProbeErrorKind),
}

/// Everything the monitor knows about one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderState {
    /// Provider identity.
    pub provider: ProviderKind,
    /// Last good snapshot. Kept across failures.
    pub snapshot: Option<UsageSnapshot>,
    /// Status of `snapshot`.
    pub status: Option<QuotaStatus>,
    /// Error from the latest probe, cleared on success.
    pub last_error: Option<ProbeError>,
    /// Sequence of the refresh that last wrote this entry.
    pub sequence: u64,
    /// When a probe last produced `snapshot`.
    pub last_success_at: Option<DateTime<Utc>>,
    /// When a probe result, success or failure, was last applied.
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl ProviderState {
    fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            snapshot: None,
            status: None,
            last_error: None,
            sequence: 0,
            last_success_at: None,
            last_attempt_at: None,
        }
    }

    /// The state-machine view of this entry.
    pub fn health(&self) -> ProviderHealth {
        match (&self.last_error, self.status) {
            (Some(err), _) => ProviderHealth::Failed(err.kind()),
            (None, Some(status)) => ProviderHealth::Status(status),
            (None, None) => ProviderHealth::Unprobed,
        }
    }
}

// ============================================================================
// Refresh Report
// ============================================================================

/// Result of one probe within a refresh.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    /// Provider that was probed.
    pub provider: ProviderKind,
    /// New status, or the error.
    pub result: Result<QuotaStatus, ProbeError>,
    /// Time the probe took, timeout included.
    pub elapsed: Duration,
    /// False if the write was discarded as stale.
    pub applied: bool,
}

/// Summary of one refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    /// Sequence number of this refresh.
    pub sequence: u64,
    /// When the refresh started.
    pub started_at: DateTime<Utc>,
    /// One entry per probed provider.
    pub outcomes: Vec<ProbeOutcome>,
    /// Status changes, degrading and improving.
    pub transitions: Vec<StatusTransition>,
}

impl RefreshReport {
    /// Number of probes that succeeded.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Number of probes that failed.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Outcome for one provider.
    pub fn outcome(&self, provider: ProviderKind) -> Option<&ProbeOutcome> {
        self.outcomes.iter().find(|o| o.provider == provider)
    }

    /// Only the alert-worthy transitions.
    pub fn degrading(&self) -> impl Iterator<Item = &StatusTransition> {
        self.transitions.iter().filter(|t| t.is_degrading())
    }
}

// ============================================================================
// Monitor
// ============================================================================

/// Coordinates refreshes and owns per-provider state.
#[derive(Debug)]
pub struct QuotaMonitor {
    registry: Arc<ProviderRegistry>,
    config: MonitorConfig,
    states: RwLock<HashMap<ProviderKind, ProviderState>>,
    refresh_lock: Mutex<()>,
    sequence: AtomicU64,
    transitions: broadcast::Sender<StatusTransition>,
    changes: watch::Sender<u64>,
}

impl QuotaMonitor {
    /// Creates a monitor over a registry.
    pub fn new(registry: Arc<ProviderRegistry>, config: MonitorConfig) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        let (changes, _) = watch::channel(0);
        Self {
            registry,
            config,
            states: RwLock::new(HashMap::new()),
            refresh_lock: Mutex::new(()),
            sequence: AtomicU64::new(0),
            transitions,
            changes,
        }
    }

    /// The registry this monitor probes.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Timing configuration.
    pub fn config(&self) -> MonitorConfig {
        self.config
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Runs a refresh, waiting for any refresh already in flight to finish
    /// first.
    pub async fn refresh(&self) -> RefreshReport {
        let _guard = self.refresh_lock.lock().await;
        self.run_refresh().await
    }

    /// Runs a refresh unless one is already in flight, in which case the
    /// request is coalesced into it and `None` is returned.
    pub async fn try_refresh(&self) -> Option<RefreshReport> {
        let Ok(_guard) = self.refresh_lock.try_lock() else {
            debug!("Refresh already in flight, coalescing");
            return None;
        };
        Some(self.run_refresh().await)
    }

    /// Returns true while a refresh is running.
    pub fn is_refreshing(&self) -> bool {
        self.refresh_lock.try_lock().is_err()
    }

    #[instrument(skip(self))]
    async fn run_refresh(&self) -> RefreshReport {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let started_at = Utc::now();
        let probes = self.registry.enabled_probes().await;
        let timeout = self.config.effective_probe_timeout();

        info!(sequence, providers = probes.len(), "Refresh started");

        let tasks = probes.into_iter().map(|(kind, probe)| async move {
            let start = Instant::now();
            let result = match tokio::time::timeout(timeout, probe.probe()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(provider = %kind, ?timeout, "Probe timed out");
                    Err(ProbeError::Timeout(timeout))
                }
            };
            (kind, result, start.elapsed())
        });
        let results = join_all(tasks).await;

        let report = self.apply(sequence, started_at, results).await;
        info!(
            sequence,
            succeeded = report.succeeded(),
            failed = report.failed(),
            transitions = report.transitions.len(),
            "Refresh finished"
        );
        report
    }

    /// Writes a refresh's results. The only place state is mutated.
    async fn apply(
        &self,
        sequence: u64,
        started_at: DateTime<Utc>,
        results: Vec<(ProviderKind, Result<UsageSnapshot, ProbeError>, Duration)>,
    ) -> RefreshReport {
        let mut outcomes = Vec::with_capacity(results.len());
        let mut transitions = Vec::new();

        {
            let mut states = self.states.write().await;
            let now = Utc::now();

            for (provider, result, elapsed) in results {
                let state = states
                    .entry(provider)
                    .or_insert_with(|| ProviderState::new(provider));

                if state.sequence > sequence {
                    warn!(
                        provider = %provider,
                        stored = state.sequence,
                        incoming = sequence,
                        "Discarding stale probe result"
                    );
                    outcomes.push(ProbeOutcome {
                        provider,
                        result: result.map(|s| s.status()),
                        elapsed,
                        applied: false,
                    });
                    continue;
                }

                state.sequence = sequence;
                state.last_attempt_at = Some(now);

                let outcome = match result {
                    Ok(snapshot) => {
                        let status = snapshot.status();
                        if let Some(t) =
                            StatusTransition::detect(provider, state.status, status, sequence)
                        {
                            transitions.push(t);
                        }
                        debug!(provider = %provider, %status, "Snapshot stored");
                        state.snapshot = Some(snapshot);
                        state.status = Some(status);
                        state.last_error = None;
                        state.last_success_at = Some(now);
                        Ok(status)
                    }
                    Err(err) => {
                        warn!(provider = %provider, error = %err, "Probe failed");
                        state.last_error = Some(err.clone());
                        Err(err)
                    }
                };

                outcomes.push(ProbeOutcome {
                    provider,
                    result: outcome,
                    elapsed,
                    applied: true,
                });
            }
        }

        for transition in transitions.iter().filter(|t| t.is_degrading()) {
            info!(%transition, "Status degraded");
            // No receivers is fine.
            let _ = self.transitions.send(transition.clone());
        }
        self.changes.send_modify(|version| *version += 1);

        RefreshReport {
            sequence,
            started_at,
            outcomes,
            transitions,
        }
    }

    // ========================================================================
    // Readers
    // ========================================================================

    /// State of one provider, if it has ever been probed.
    pub async fn state(&self, provider: ProviderKind) -> Option<ProviderState> {
        self.states.read().await.get(&provider).cloned()
    }

    /// States of all probed providers, ordered by provider.
    pub async fn states(&self) -> Vec<ProviderState> {
        let mut states: Vec<_> = self.states.read().await.values().cloned().collect();
        states.sort_by_key(|s| s.provider);
        states
    }

    /// Last good snapshot of a provider.
    pub async fn snapshot(&self, provider: ProviderKind) -> Option<UsageSnapshot> {
        self.states
            .read()
            .await
            .get(&provider)
            .and_then(|s| s.snapshot.clone())
    }

    /// Status of a provider's last good snapshot.
    pub async fn status(&self, provider: ProviderKind) -> Option<QuotaStatus> {
        self.states.read().await.get(&provider).and_then(|s| s.status)
    }

    /// Error from a provider's latest probe.
    pub async fn last_error(&self, provider: ProviderKind) -> Option<ProbeError> {
        self.states
            .read()
            .await
            .get(&provider)
            .and_then(|s| s.last_error.clone())
    }

    /// Sequence number of the latest refresh started.
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Subscribes to degrading transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusTransition> {
        self.transitions.subscribe()
    }

    /// Subscribes to a counter bumped after every applied refresh.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Tears down long-lived probe sessions.
    pub async fn shutdown(&self) {
        info!("Shutting down quota monitor");
        self.registry.shutdown().await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quotabar_core::{QuotaType, UsageQuota};
    use quotabar_fetch::QuotaProbe;
    use quotabar_providers::ProviderRecord;
    use std::sync::atomic::AtomicUsize;

    /// What a stub probe does on each call.
    #[derive(Clone)]
    enum Behavior {
        Remaining(f64),
        Fail(ProbeError),
        Hang,
    }

    struct StubProbe {
        kind: ProviderKind,
        behaviors: std::sync::Mutex<Vec<Behavior>>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StubProbe {
        /// Plays `behaviors` in order, repeating the last one.
        fn new(kind: ProviderKind, behaviors: Vec<Behavior>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                behaviors: std::sync::Mutex::new(behaviors),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn delayed(kind: ProviderKind, behavior: Behavior, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                kind,
                behaviors: std::sync::Mutex::new(vec![behavior]),
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn next(&self) -> Behavior {
            let mut behaviors = self.behaviors.lock().unwrap();
            if behaviors.len() > 1 {
                behaviors.remove(0)
            } else {
                behaviors[0].clone()
            }
        }
    }

    #[async_trait]
    impl QuotaProbe for StubProbe {
        fn provider(&self) -> ProviderKind {
            self.kind
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn probe(&self) -> Result<UsageSnapshot, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let behavior = self.next();
            tokio::time::sleep(self.delay).await;
            match behavior {
                Behavior::Remaining(pct) => {
                    let quota = UsageQuota::new(self.kind, QuotaType::Session, pct)?;
                    Ok(UsageSnapshot::new(self.kind, vec![quota])?)
                }
                Behavior::Fail(err) => Err(err),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    fn monitor(probes: Vec<Arc<StubProbe>>, probe_timeout: Duration) -> QuotaMonitor {
        let records = probes
            .into_iter()
            .map(|p| ProviderRecord::new(p as Arc<dyn QuotaProbe>, true))
            .collect();
        QuotaMonitor::new(
            Arc::new(ProviderRegistry::new(records)),
            MonitorConfig {
                probe_timeout,
                refresh_deadline: Duration::from_secs(30),
            },
        )
    }

    #[tokio::test]
    async fn test_unprobed_provider_has_no_state() {
        let m = monitor(vec![], Duration::from_secs(1));
        assert!(m.state(ProviderKind::Claude).await.is_none());
        assert!(m.snapshot(ProviderKind::Claude).await.is_none());
        assert_eq!(ProviderState::new(ProviderKind::Claude).health(), ProviderHealth::Unprobed);
    }

    #[tokio::test]
    async fn test_mixed_refresh_scenario() {
        let claude = StubProbe::new(
            ProviderKind::Claude,
            vec![Behavior::Remaining(70.0), Behavior::Hang],
        );
        let codex = StubProbe::new(
            ProviderKind::Codex,
            vec![Behavior::Remaining(80.0), Behavior::Remaining(15.0)],
        );
        let gemini = StubProbe::new(ProviderKind::Gemini, vec![Behavior::Remaining(60.0)]);
        let m = monitor(vec![claude, codex, gemini], Duration::from_millis(200));

        let first = m.refresh().await;
        assert_eq!(first.succeeded(), 3);
        assert_eq!(first.degrading().count(), 0);

        let mut alerts = m.subscribe();
        let second = m.refresh().await;

        // Claude: timed out, previous snapshot kept.
        let claude_state = m.state(ProviderKind::Claude).await.unwrap();
        assert!(matches!(claude_state.last_error, Some(ProbeError::Timeout(_))));
        assert_eq!(claude_state.status, Some(QuotaStatus::Healthy));
        assert!(claude_state.snapshot.is_some());
        assert_eq!(claude_state.health(), ProviderHealth::Failed(ProbeErrorKind::Timeout));

        // Codex: degraded to critical, one alert.
        assert_eq!(m.status(ProviderKind::Codex).await, Some(QuotaStatus::Critical));
        let degrading: Vec<_> = second.degrading().collect();
        assert_eq!(degrading.len(), 1);
        assert_eq!(degrading[0].provider, ProviderKind::Codex);
        assert_eq!(degrading[0].from, Some(QuotaStatus::Healthy));

        let alert = alerts.try_recv().unwrap();
        assert_eq!(alert.provider, ProviderKind::Codex);
        assert_eq!(alert.to, QuotaStatus::Critical);
        assert!(alerts.try_recv().is_err());

        // Gemini: healthy, no alert.
        assert_eq!(m.status(ProviderKind::Gemini).await, Some(QuotaStatus::Healthy));
        assert!(m.last_error(ProviderKind::Gemini).await.is_none());
    }

    #[tokio::test]
    async fn test_hanging_probe_does_not_delay_others() {
        let slow = StubProbe::new(ProviderKind::Claude, vec![Behavior::Hang]);
        let fast = StubProbe::delayed(
            ProviderKind::Codex,
            Behavior::Remaining(90.0),
            Duration::from_millis(10),
        );
        let m = monitor(vec![slow, fast], Duration::from_millis(300));

        let start = Instant::now();
        let report = m.refresh().await;
        assert!(start.elapsed() < Duration::from_secs(2));

        let codex = report.outcome(ProviderKind::Codex).unwrap();
        assert!(codex.result.is_ok());
        assert!(codex.elapsed < Duration::from_millis(300));

        let claude = report.outcome(ProviderKind::Claude).unwrap();
        assert!(matches!(claude.result, Err(ProbeError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_failure_keeps_snapshot_and_success_clears_error() {
        let probe = StubProbe::new(
            ProviderKind::Gemini,
            vec![
                Behavior::Remaining(40.0),
                Behavior::Fail(ProbeError::parse("garbled")),
                Behavior::Remaining(90.0),
            ],
        );
        let m = monitor(vec![probe], Duration::from_secs(1));

        m.refresh().await;
        m.refresh().await;
        let state = m.state(ProviderKind::Gemini).await.unwrap();
        assert_eq!(state.status, Some(QuotaStatus::Warning));
        assert_eq!(state.last_error, Some(ProbeError::parse("garbled")));

        let report = m.refresh().await;
        assert!(m.last_error(ProviderKind::Gemini).await.is_none());
        assert_eq!(m.status(ProviderKind::Gemini).await, Some(QuotaStatus::Healthy));
        assert_eq!(report.transitions.len(), 1);
        assert!(!report.transitions[0].is_degrading());
    }

    #[tokio::test]
    async fn test_failure_advances_only_attempt_time() {
        let probe = StubProbe::new(
            ProviderKind::Claude,
            vec![
                Behavior::Remaining(80.0),
                Behavior::Fail(ProbeError::execution("exited")),
            ],
        );
        let m = monitor(vec![probe], Duration::from_secs(1));

        m.refresh().await;
        let first = m.state(ProviderKind::Claude).await.unwrap();
        assert!(first.last_success_at.is_some());
        assert_eq!(first.last_success_at, first.last_attempt_at);

        tokio::time::sleep(Duration::from_millis(5)).await;
        m.refresh().await;
        let second = m.state(ProviderKind::Claude).await.unwrap();
        assert_eq!(second.last_success_at, first.last_success_at);
        assert!(second.last_attempt_at > first.last_attempt_at);
        assert!(second.snapshot.is_some());
    }

    #[tokio::test]
    async fn test_first_observation_alerts_when_not_healthy() {
        let probe = StubProbe::new(ProviderKind::Codex, vec![Behavior::Remaining(0.0)]);
        let m = monitor(vec![probe], Duration::from_secs(1));

        let report = m.refresh().await;
        let degrading: Vec<_> = report.degrading().collect();
        assert_eq!(degrading.len(), 1);
        assert_eq!(degrading[0].from, None);
        assert_eq!(degrading[0].to, QuotaStatus::Depleted);
    }

    #[tokio::test]
    async fn test_enablement_applies_to_next_refresh() {
        let claude = StubProbe::new(ProviderKind::Claude, vec![Behavior::Remaining(90.0)]);
        let codex = StubProbe::new(ProviderKind::Codex, vec![Behavior::Remaining(90.0)]);
        let m = monitor(vec![claude.clone(), codex.clone()], Duration::from_secs(1));

        m.refresh().await;
        m.registry().set_enabled(ProviderKind::Codex, false).await;
        let report = m.refresh().await;

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(claude.calls.load(Ordering::SeqCst), 2);
        assert_eq!(codex.calls.load(Ordering::SeqCst), 1);
        // The disabled provider keeps its last state.
        assert!(m.snapshot(ProviderKind::Codex).await.is_some());
    }

    #[tokio::test]
    async fn test_disable_during_refresh_does_not_affect_it() {
        let codex = StubProbe::delayed(
            ProviderKind::Codex,
            Behavior::Remaining(90.0),
            Duration::from_millis(100),
        );
        let m = Arc::new(monitor(vec![codex.clone()], Duration::from_secs(1)));

        let running = tokio::spawn({
            let m = Arc::clone(&m);
            async move { m.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        m.registry().set_enabled(ProviderKind::Codex, false).await;

        let report = running.await.unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert!(report.outcomes[0].result.is_ok());

        let next = m.refresh().await;
        assert!(next.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_stale_results_are_discarded() {
        let m = monitor(vec![], Duration::from_secs(1));
        let snapshot = |pct| {
            let quota = UsageQuota::new(ProviderKind::Codex, QuotaType::Session, pct).unwrap();
            UsageSnapshot::new(ProviderKind::Codex, vec![quota]).unwrap()
        };

        m.apply(5, Utc::now(), vec![(ProviderKind::Codex, Ok(snapshot(90.0)), Duration::ZERO)])
            .await;
        let report = m
            .apply(3, Utc::now(), vec![(ProviderKind::Codex, Ok(snapshot(5.0)), Duration::ZERO)])
            .await;

        assert!(!report.outcomes[0].applied);
        assert!(report.transitions.is_empty());
        let state = m.state(ProviderKind::Codex).await.unwrap();
        assert_eq!(state.sequence, 5);
        assert_eq!(state.status, Some(QuotaStatus::Healthy));
    }

    #[tokio::test]
    async fn test_try_refresh_coalesces() {
        let slow = StubProbe::delayed(
            ProviderKind::Claude,
            Behavior::Remaining(90.0),
            Duration::from_millis(200),
        );
        let m = Arc::new(monitor(vec![slow.clone()], Duration::from_secs(1)));

        let running = tokio::spawn({
            let m = Arc::clone(&m);
            async move { m.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(m.is_refreshing());
        assert!(m.try_refresh().await.is_none());

        let report = running.await.unwrap();
        assert_eq!(report.sequence, 1);
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
        assert!(!m.is_refreshing());
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_are_serialized() {
        let probe = StubProbe::delayed(
            ProviderKind::Codex,
            Behavior::Remaining(50.0),
            Duration::from_millis(50),
        );
        let m = Arc::new(monitor(vec![probe], Duration::from_secs(1)));

        let (a, b) = tokio::join!(m.refresh(), m.refresh());
        let mut sequences = [a.sequence, b.sequence];
        sequences.sort_unstable();
        assert_eq!(sequences, [1, 2]);
        assert_eq!(m.state(ProviderKind::Codex).await.unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn test_change_counter_bumps() {
        let probe = StubProbe::new(ProviderKind::Codex, vec![Behavior::Remaining(50.0)]);
        let m = monitor(vec![probe], Duration::from_secs(1));
        let rx = m.subscribe_changes();

        m.refresh().await;
        m.refresh().await;
        assert_eq!(*rx.borrow(), 2);
        assert_eq!(m.last_sequence(), 2);
    }
}
