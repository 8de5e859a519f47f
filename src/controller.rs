//! Controller runtime driving reconcile passes.
//!
//! Change notifications and scheduled requeues arrive as [`Trigger`]s on a
//! channel. Notifications go through the per-blueprint debouncer, requeues
//! bypass it. Passes for different blueprints run concurrently; a blueprint
//! never has two passes at once. A trigger for a blueprint whose pass is in
//! flight marks it dirty and the pass runs again once the current one ends.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{BlueprintError, Result};
use crate::policy::RequeueDecision;
use crate::reconciler::{PassReport, Reconciler};
use crate::scheduling::{DebounceRegistry, ErrorBackoff};

/// Capacity of the trigger channel.
const TRIGGER_BUFFER: usize = 256;

/// A request to reconcile a blueprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The blueprint or something it depends on changed.
    Notify(String),
    /// A pass asked to run again.
    Requeue(String),
}

impl Trigger {
    /// Returns the blueprint this trigger is for.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Notify(key) | Self::Requeue(key) => key,
        }
    }
}

/// Sends triggers to a running [`Controller`].
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Trigger>,
}

impl ControllerHandle {
    /// Notifies the controller that a blueprint changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller has stopped.
    pub async fn notify(&self, id: impl Into<String>) -> Result<()> {
        self.send(Trigger::Notify(id.into())).await
    }

    /// Sends a trigger.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller has stopped.
    pub async fn send(&self, trigger: Trigger) -> Result<()> {
        self.tx
            .send(trigger)
            .await
            .map_err(|e| BlueprintError::internal(format!("controller stopped, dropped {:?}", e.0)))
    }
}

/// Per-blueprint statistics of a controller run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BlueprintSummary {
    /// Passes that ran to the end.
    pub passes: usize,
    /// Passes that ended with an error.
    pub failures: usize,
    /// Decision of the last pass.
    pub last_decision: Option<String>,
}

/// Statistics of a controller run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ControllerSummary {
    /// Notifications received.
    pub notifications: usize,
    /// Notifications absorbed by the debouncer.
    pub debounced: usize,
    /// Per-blueprint statistics.
    pub blueprints: BTreeMap<String, BlueprintSummary>,
}

/// Bookkeeping of the run loop.
#[derive(Debug, Default)]
struct RunState {
    in_flight: HashSet<String>,
    dirty: HashSet<String>,
    scheduled: HashMap<String, ScheduledRequeue>,
    summary: ControllerSummary,
}

/// The single pending requeue timer of a blueprint.
#[derive(Debug)]
struct ScheduledRequeue {
    deadline: Instant,
    timer: AbortHandle,
}

/// Event loop scheduling reconcile passes.
#[derive(Debug)]
pub struct Controller {
    reconciler: Arc<Reconciler>,
    debounce: Arc<DebounceRegistry>,
    backoff: Arc<ErrorBackoff>,
    tx: mpsc::Sender<Trigger>,
    rx: mpsc::Receiver<Trigger>,
}

impl Controller {
    /// Creates a controller and a handle to feed it.
    #[must_use]
    pub fn new(
        reconciler: Arc<Reconciler>,
        debounce: Arc<DebounceRegistry>,
        backoff: Arc<ErrorBackoff>,
    ) -> (Self, ControllerHandle) {
        let (tx, rx) = mpsc::channel(TRIGGER_BUFFER);
        let handle = ControllerHandle { tx: tx.clone() };
        let controller = Self {
            reconciler,
            debounce,
            backoff,
            tx,
            rx,
        };
        (controller, handle)
    }

    /// Runs until `shutdown` turns true or its sender is dropped.
    ///
    /// Passes still in flight at shutdown are dropped; nothing they had not
    /// persisted yet is written.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ControllerSummary {
        let mut passes: JoinSet<(String, PassReport)> = JoinSet::new();
        let mut timers: JoinSet<()> = JoinSet::new();
        let mut state = RunState::default();

        info!(window = ?self.debounce.window(), "controller started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(joined) = passes.join_next(), if !passes.is_empty() => {
                    match joined {
                        Ok((key, report)) => {
                            self.finish_pass(&mut state, &mut passes, &mut timers, key, report);
                        }
                        Err(err) => error!(error = %err, "reconcile task failed"),
                    }
                }
                Some(_) = timers.join_next(), if !timers.is_empty() => {}
                Some(trigger) = self.rx.recv() => {
                    self.handle_trigger(&mut state, &mut passes, &mut timers, trigger);
                }
            }
        }

        let cancelled = passes.len();
        passes.shutdown().await;
        timers.shutdown().await;
        info!(cancelled, "controller stopped");

        state.summary
    }

    fn handle_trigger(
        &self,
        state: &mut RunState,
        passes: &mut JoinSet<(String, PassReport)>,
        timers: &mut JoinSet<()>,
        trigger: Trigger,
    ) {
        debug!(blueprint = trigger.key(), ?trigger, "trigger received");
        let key = match trigger {
            Trigger::Notify(key) => {
                state.summary.notifications += 1;
                if !self.debounce.allow_or_mark(&key) {
                    state.summary.debounced += 1;
                    debug!(blueprint = %key, "notification debounced");
                    if !state.in_flight.contains(&key) {
                        let (due, remaining) = self.debounce.should_requeue(&key);
                        if due {
                            self.schedule(state, timers, &key, remaining);
                        }
                    }
                    return;
                }
                key
            }
            Trigger::Requeue(key) => {
                state.scheduled.remove(&key);
                key
            }
        };

        if state.in_flight.contains(&key) {
            debug!(blueprint = %key, "pass in flight, marking dirty");
            state.dirty.insert(key);
            return;
        }

        self.start_pass(state, passes, key);
    }

    fn start_pass(&self, state: &mut RunState, passes: &mut JoinSet<(String, PassReport)>, key: String) {
        debug!(blueprint = %key, "starting reconcile pass");
        state.in_flight.insert(key.clone());
        let reconciler = Arc::clone(&self.reconciler);
        passes.spawn(async move {
            let report = reconciler.reconcile(&key).await;
            (key, report)
        });
    }

    fn finish_pass(
        &self,
        state: &mut RunState,
        passes: &mut JoinSet<(String, PassReport)>,
        timers: &mut JoinSet<()>,
        key: String,
        report: PassReport,
    ) {
        state.in_flight.remove(&key);

        let summary = state.summary.blueprints.entry(key.clone()).or_default();
        summary.passes += 1;
        if report.error.is_some() {
            summary.failures += 1;
        }
        summary.last_decision = Some(report.decision.to_string());

        let delay = match report.decision {
            RequeueDecision::NoFurtherAction => {
                self.backoff.reset(&key);
                None
            }
            RequeueDecision::RequeueAfter(delay) => {
                self.backoff.reset(&key);
                Some(delay)
            }
            RequeueDecision::ErrorRetry(err) => {
                let delay = self.backoff.next_delay(&key);
                warn!(blueprint = %key, error = %err, ?delay, "reconcile failed, backing off");
                Some(delay)
            }
        };

        if state.dirty.remove(&key) {
            self.start_pass(state, passes, key);
            return;
        }

        let (trailing, remaining) = self.debounce.should_requeue(&key);
        let next = match (delay, trailing.then_some(remaining)) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        if let Some(delay) = next {
            self.schedule(state, timers, &key, delay);
        }
    }

    /// Arms the requeue timer of `key`, keeping whichever deadline is earlier.
    fn schedule(&self, state: &mut RunState, timers: &mut JoinSet<()>, key: &str, delay: Duration) {
        let Some(deadline) = Instant::now().checked_add(delay) else {
            debug!(blueprint = %key, ?delay, "requeue delay out of range, not scheduling");
            return;
        };

        if let Some(existing) = state.scheduled.get(key) {
            if existing.deadline <= deadline {
                debug!(blueprint = %key, "earlier requeue already scheduled");
                return;
            }
            debug!(blueprint = %key, "replacing later requeue");
            existing.timer.abort();
        }

        debug!(blueprint = %key, ?delay, "scheduling requeue");
        let tx = self.tx.clone();
        let trigger = Trigger::Requeue(key.to_string());
        let timer = timers.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if tx.send(trigger).await.is_err() {
                debug!("controller stopped before requeue fired");
            }
        });
        state
            .scheduled
            .insert(key.to_string(), ScheduledRequeue { deadline, timer });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlueprintConfig, BlueprintSpec, ResourceVersion, StateDiff};
    use crate::reconciler::{DiffProvider, DryRunExecutor};
    use crate::state::MockBlueprintRepository;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KEY: &str = "blueprint-1";

    #[derive(Debug)]
    struct CountingProvider {
        calls: AtomicUsize,
        delay: Duration,
        fail: fn() -> Option<BlueprintError>,
    }

    impl CountingProvider {
        fn new(delay: Duration, fail: fn() -> Option<BlueprintError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DiffProvider for CountingProvider {
        async fn determine_state_diff(&self, _spec: &BlueprintSpec) -> Result<StateDiff> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.fail)().map_or_else(|| Ok(StateDiff::default()), Err)
        }
    }

    fn repository() -> MockBlueprintRepository {
        let mut repository = MockBlueprintRepository::new();
        repository.expect_list().returning(|| Ok(Vec::new()));
        repository.expect_get().returning(|id| {
            let config = BlueprintConfig {
                dry_run: true,
                ..BlueprintConfig::default()
            };
            let mut spec = BlueprintSpec::new(id, config);
            spec.set_resource_version(ResourceVersion::new("v1"));
            Ok(spec)
        });
        repository.expect_update().returning(|spec| {
            spec.drain_events();
            Ok(())
        });
        repository.expect_backend_type().return_const("mock");
        repository
    }

    struct Fixture {
        provider: Arc<CountingProvider>,
        handle: ControllerHandle,
        stop: watch::Sender<bool>,
        task: tokio::task::JoinHandle<ControllerSummary>,
    }

    impl Fixture {
        fn start(provider: Arc<CountingProvider>, window: Duration, backoff: ErrorBackoff) -> Self {
            let reconciler = Reconciler::new(
                Arc::new(repository()),
                provider.clone(),
                Arc::new(DryRunExecutor),
            );
            let (controller, handle) = Controller::new(
                Arc::new(reconciler),
                Arc::new(DebounceRegistry::new(window)),
                Arc::new(backoff),
            );
            let (stop, shutdown) = watch::channel(false);
            let task = tokio::spawn(controller.run(shutdown));
            Self {
                provider,
                handle,
                stop,
                task,
            }
        }

        async fn stop(self) -> ControllerSummary {
            self.stop.send(true).expect("controller should be running");
            self.task.await.expect("controller task panicked")
        }
    }

    fn never_fails() -> Option<BlueprintError> {
        None
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_coalesced_into_one_trailing_pass() {
        let provider = CountingProvider::new(Duration::ZERO, never_fails);
        let fixture = Fixture::start(provider, Duration::from_secs(10), ErrorBackoff::default());

        for _ in 0..5 {
            fixture.handle.notify(KEY).await.expect("send failed");
        }
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(fixture.provider.calls(), 2);
        let summary = fixture.stop().await;
        assert_eq!(summary.notifications, 5);
        assert_eq!(summary.debounced, 4);
        assert_eq!(summary.blueprints[KEY].passes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_notification_runs_once() {
        let provider = CountingProvider::new(Duration::ZERO, never_fails);
        let fixture = Fixture::start(provider, Duration::from_secs(10), ErrorBackoff::default());

        fixture.handle.notify(KEY).await.expect("send failed");
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(fixture.provider.calls(), 1);
        let summary = fixture.stop().await;
        assert_eq!(
            summary.blueprints[KEY].last_decision.as_deref(),
            Some("no further action")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeue_decision_is_scheduled() {
        fn not_up_to_date() -> Option<BlueprintError> {
            Some(BlueprintError::NotUpToDate {
                message: String::from("dogu cr not reconciled yet"),
            })
        }
        let provider = CountingProvider::new(Duration::ZERO, not_up_to_date);
        let fixture = Fixture::start(provider, Duration::from_secs(1), ErrorBackoff::default());

        fixture.handle.notify(KEY).await.expect("send failed");
        tokio::time::sleep(Duration::from_secs(25)).await;

        assert_eq!(fixture.provider.calls(), 3);
        let summary = fixture.stop().await;
        assert_eq!(summary.blueprints[KEY].failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_back_off_exponentially() {
        fn internal() -> Option<BlueprintError> {
            Some(BlueprintError::internal("api server unavailable"))
        }
        let provider = CountingProvider::new(Duration::ZERO, internal);
        let backoff = ErrorBackoff::new(Duration::from_secs(1), Duration::from_secs(4));
        let fixture = Fixture::start(provider, Duration::from_secs(1), backoff);

        fixture.handle.notify(KEY).await.expect("send failed");
        tokio::time::sleep(Duration::from_millis(8500)).await;

        // passes at 0s, 1s, 3s and 7s
        assert_eq!(fixture.provider.calls(), 4);
        fixture.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_pass_is_not_held_back_by_backoff() {
        fn internal() -> Option<BlueprintError> {
            Some(BlueprintError::internal("api server unavailable"))
        }
        let provider = CountingProvider::new(Duration::ZERO, internal);
        let backoff = ErrorBackoff::new(Duration::from_secs(200), Duration::from_secs(600));
        let fixture = Fixture::start(provider, Duration::from_secs(10), backoff);

        fixture.handle.notify(KEY).await.expect("send failed");
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fixture.provider.calls(), 1);

        // debounced, owed at the end of the window instead of after the backoff
        fixture.handle.notify(KEY).await.expect("send failed");
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(fixture.provider.calls(), 2);
        let summary = fixture.stop().await;
        assert_eq!(summary.debounced, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_during_pass_reruns_once() {
        let provider = CountingProvider::new(Duration::from_secs(1), never_fails);
        let fixture = Fixture::start(provider, Duration::ZERO, ErrorBackoff::default());

        for _ in 0..3 {
            fixture.handle.notify(KEY).await.expect("send failed");
        }
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(fixture.provider.calls(), 2);
        fixture.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_blueprints_are_reconciled_independently() {
        let provider = CountingProvider::new(Duration::ZERO, never_fails);
        let fixture = Fixture::start(provider, Duration::from_secs(10), ErrorBackoff::default());

        fixture.handle.notify("blueprint-a").await.expect("send failed");
        fixture.handle.notify("blueprint-b").await.expect("send failed");
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(fixture.provider.calls(), 2);
        let summary = fixture.stop().await;
        assert_eq!(summary.debounced, 0);
        assert_eq!(summary.blueprints.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_pass_in_flight() {
        let provider = CountingProvider::new(Duration::from_secs(3600), never_fails);
        let fixture = Fixture::start(provider, Duration::from_secs(10), ErrorBackoff::default());

        fixture.handle.notify(KEY).await.expect("send failed");
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(fixture.provider.calls(), 1);
        let summary = fixture.stop().await;
        assert!(summary.blueprints.is_empty());
    }
}
