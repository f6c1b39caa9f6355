//! The adaptive refresh control loop.
//!
//! ```text
//!            tick() (fixed cadence, never awaits upstream)
//!               │
//!   ┌───────────┼────────────────────────────────────────────┐
//!   │ reap finished jobs → evict expired → observe sessions  │
//!   │        → collect due tasks (IDLE/BACKOFF → PENDING)     │
//!   └───────────┬────────────────────────────────────────────┘
//!               │ one job per market chunk
//!               ▼
//!   JoinSet job: worker permit → IN_FLIGHT → executor (quote batch + details)
//!               │
//!               ▼
//!   complete(): store.apply_result per kind → task IDLE | BACKOFF → stats
//! ```
//!
//! Locks are std mutexes held only for bookkeeping, never across an await,
//! and never two at once. A job dropped before it finishes (panic, abort)
//! fails its remaining members, so no task stays in flight.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

use decidra_market_data::{
    normalize, parse_upstream_state, DataKind, InstrumentId, Market, MarketDataClient, RawResult,
    RefreshError, RefreshResult, SessionState, TradingCalendar,
};

use super::executor::RefreshExecutor;
use super::mode::RefreshMode;
use super::policy::{backoff_delay, refresh_interval};
use super::session_tracker::SessionTracker;
use super::stats::RefreshStats;
use super::task::RefreshTask;
use crate::clock::Clock;
use crate::config::RefreshConfig;
use crate::errors::Result;
use crate::events::{WatchlistEvent, WatchlistEventSink};
use crate::state::{ApplyOutcome, InstrumentStateStore};

/// A market's session changed between two ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTransition {
    pub market: Market,
    pub from: SessionState,
    pub to: SessionState,
}

/// What one [`RefreshScheduler::tick`] did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Instruments handed to a job.
    pub dispatched: usize,
    /// Jobs spawned.
    pub jobs: usize,
    pub transitions: Vec<SessionTransition>,
    pub evicted: Vec<InstrumentId>,
}

/// Drives refreshes for every tracked instrument.
///
/// Cloning is cheap; clones share the same tasks, store and worker pool.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    config: RefreshConfig,
    clock: Arc<dyn Clock>,
    executor: RefreshExecutor,
    store: Arc<InstrumentStateStore>,
    tasks: Mutex<HashMap<InstrumentId, RefreshTask>>,
    sessions: Mutex<SessionTracker>,
    stats: Mutex<HashMap<InstrumentId, RefreshStats>>,
    workers: Semaphore,
    jobs: Mutex<JoinSet<()>>,
}

/// One dispatched instrument: its id and whether detail kinds are due.
struct Dispatch {
    id: InstrumentId,
    visible: bool,
}

impl RefreshScheduler {
    pub fn new(
        config: RefreshConfig,
        client: Arc<dyn MarketDataClient>,
        store: Arc<InstrumentStateStore>,
        calendar: TradingCalendar,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let executor = RefreshExecutor::new(client, config.request_timeout);
        info!(
            "Refresh scheduler using client '{}' ({} workers, batch {:?}, push {})",
            executor.client_id(),
            config.max_concurrent_requests,
            executor.capabilities().batch_kinds,
            executor.capabilities().supports_push
        );

        let inner = SchedulerInner {
            sessions: Mutex::new(SessionTracker::new(calendar, config.upstream_state_ttl)),
            workers: Semaphore::new(config.max_concurrent_requests),
            config,
            clock,
            executor,
            store,
            tasks: Mutex::new(HashMap::new()),
            stats: Mutex::new(HashMap::new()),
            jobs: Mutex::new(JoinSet::new()),
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<InstrumentStateStore> {
        &self.inner.store
    }

    // ========================================================================
    // Tracking
    // ========================================================================

    /// Starts refreshing `id`. The first refresh is due immediately.
    ///
    /// Tracking an instrument inside its eviction grace period revives it.
    /// Returns true if the instrument was not tracked before.
    pub fn track(&self, id: &InstrumentId) -> bool {
        let now = self.inner.clock.now();
        let session = self.inner.lock_sessions().current(id.market(), now);
        self.inner.store.register(id);

        let newly_tracked = {
            let mut tasks = self.inner.lock_tasks();
            match tasks.get_mut(id) {
                Some(task) if task.is_retired() => {
                    task.retired_at = None;
                    task.next_due = task.next_due.min(now);
                    debug!("Revived refresh task for {}", id);
                    true
                }
                Some(_) => false,
                None => {
                    let mut task = RefreshTask::new(id.clone(), now);
                    task.session = Some(session);
                    tasks.insert(id.clone(), task);
                    debug!("Tracking {} ({})", id, session);
                    true
                }
            }
        };

        if newly_tracked {
            self.inner
                .store
                .set_session(id, session, RefreshMode::for_session(session));
            if RefreshMode::for_session(session) == RefreshMode::Realtime {
                self.spawn_subscription(vec![id.clone()], true);
            }
        }
        newly_tracked
    }

    /// Stops refreshing `id`.
    ///
    /// An in-flight refresh completes but its result is discarded. The
    /// snapshot stays readable until the eviction grace period has passed.
    pub fn untrack(&self, id: &InstrumentId) -> bool {
        let now = self.inner.clock.now();
        let retired = {
            let mut tasks = self.inner.lock_tasks();
            match tasks.get_mut(id) {
                Some(task) if !task.is_retired() => {
                    task.retired_at = Some(now);
                    Some(task.session)
                }
                _ => None,
            }
        };

        let Some(session) = retired else {
            return false;
        };
        self.inner.store.retire(id, now);
        debug!("Untracked {}, evicting after {:?}", id, self.inner.config.eviction_grace);

        if session.map(RefreshMode::for_session) == Some(RefreshMode::Realtime) {
            self.spawn_subscription(vec![id.clone()], false);
        }
        true
    }

    /// Flags `id` as shown on screen (or not).
    ///
    /// Visible instruments get the shorter interval while their market trades
    /// and refresh the detail kinds. A healthy task is rescheduled at once.
    pub fn set_visible(&self, id: &InstrumentId, visible: bool) -> bool {
        let config = &self.inner.config;
        let mut tasks = self.inner.lock_tasks();
        let Some(task) = tasks.get_mut(id).filter(|task| !task.is_retired()) else {
            return false;
        };
        if task.visible == visible {
            return true;
        }

        task.visible = visible;
        if task.follows_session() {
            if let Some(session) = task.session {
                task.reschedule(refresh_interval(config, session, visible));
            }
        }
        true
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Runs one scheduling pass.
    ///
    /// Never waits on upstream calls: due tasks are handed to jobs on the
    /// current tokio runtime. Without a runtime nothing is dispatched.
    pub fn tick(&self) -> TickReport {
        let now = self.inner.clock.now();
        let mut report = TickReport::default();

        self.reap_finished();
        report.evicted = self.evict_expired(now);
        report.transitions = self.observe_sessions(now);

        if Handle::try_current().is_err() {
            warn!("Refresh tick outside a tokio runtime, nothing dispatched");
            return report;
        }

        for (_, chunk) in self.collect_due(now) {
            report.dispatched += chunk.len();
            report.jobs += 1;
            let cycle = CycleGuard::new(Arc::clone(&self.inner), &chunk);
            self.spawn_job(run_cycle(cycle, chunk));
        }

        if report.dispatched > 0 {
            debug!("Tick dispatched {} instrument(s) in {} job(s)", report.dispatched, report.jobs);
        }
        report
    }

    /// Calls [`tick`](Self::tick) every `period` until the handle is aborted.
    pub fn spawn_ticker(&self, period: Duration) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                scheduler.tick();
            }
        })
    }

    /// Waits for every dispatched job to finish.
    pub async fn flush(&self) {
        loop {
            let mut jobs = std::mem::take(&mut *self.inner.lock_jobs());
            if jobs.is_empty() {
                return;
            }
            while let Some(joined) = jobs.join_next().await {
                if let Err(e) = joined {
                    error!("Refresh job failed: {}", e);
                }
            }
        }
    }

    fn reap_finished(&self) {
        let mut jobs = self.inner.lock_jobs();
        while let Some(joined) = jobs.try_join_next() {
            if let Err(e) = joined {
                error!("Refresh job failed: {}", e);
            }
        }
    }

    fn evict_expired(&self, now: DateTime<Utc>) -> Vec<InstrumentId> {
        let grace = self.inner.config.eviction_grace;
        let expired: Vec<InstrumentId> = {
            let mut tasks = self.inner.lock_tasks();
            let expired: Vec<InstrumentId> = tasks
                .values()
                .filter(|task| !task.in_flight)
                .filter(|task| {
                    task.retired_at
                        .is_some_and(|at| super::policy::due_after(at, grace) <= now)
                })
                .map(|task| task.instrument.clone())
                .collect();
            for id in &expired {
                tasks.remove(id);
            }
            expired
        };

        if !expired.is_empty() {
            let mut stats = self.inner.lock_stats();
            for id in &expired {
                stats.remove(id);
            }
        }
        for id in &expired {
            self.inner.store.evict(id);
        }
        expired
    }

    /// Classifies every market with tracked instruments and applies changes.
    ///
    /// A changed session reschedules every healthy task of that market
    /// relative to its last completion, so the new cadence holds from this
    /// tick on.
    fn observe_sessions(&self, now: DateTime<Utc>) -> Vec<SessionTransition> {
        let markets: HashSet<Market> = self
            .inner
            .lock_tasks()
            .values()
            .filter(|task| !task.is_retired())
            .map(|task| task.instrument.market())
            .collect();
        if markets.is_empty() {
            return Vec::new();
        }

        let mut states = HashMap::with_capacity(markets.len());
        let mut transitions = Vec::new();
        {
            let mut sessions = self.inner.lock_sessions();
            for market in markets {
                let (state, previous) = sessions.observe(market, now);
                states.insert(market, state);
                if let Some(from) = previous {
                    info!("{} market session {} -> {}", market, from, state);
                    transitions.push(SessionTransition {
                        market,
                        from,
                        to: state,
                    });
                }
            }
        }

        let config = &self.inner.config;
        let mut changed = Vec::new();
        let mut mode_changes: HashMap<Market, (bool, Vec<InstrumentId>)> = HashMap::new();
        {
            let mut tasks = self.inner.lock_tasks();
            for task in tasks.values_mut().filter(|task| !task.is_retired()) {
                let Some(&state) = states.get(&task.instrument.market()) else {
                    continue;
                };
                let previous = task.session.replace(state);
                if previous == Some(state) {
                    continue;
                }
                if task.follows_session() {
                    task.reschedule(refresh_interval(config, state, task.visible));
                }
                changed.push((task.instrument.clone(), state));

                let mode = RefreshMode::for_session(state);
                if previous.map(RefreshMode::for_session) != Some(mode) {
                    mode_changes
                        .entry(task.instrument.market())
                        .or_insert_with(|| (mode == RefreshMode::Realtime, Vec::new()))
                        .1
                        .push(task.instrument.clone());
                }
            }
        }

        for (id, state) in &changed {
            self.inner
                .store
                .set_session(id, *state, RefreshMode::for_session(*state));
        }
        for (_, (subscribe, ids)) in mode_changes {
            self.spawn_subscription(ids, subscribe);
        }
        transitions
    }

    /// Moves every due task to PENDING and groups them into job chunks.
    fn collect_due(&self, now: DateTime<Utc>) -> Vec<(Market, Vec<Dispatch>)> {
        let capabilities = self.inner.executor.capabilities();
        let chunk_size = if capabilities.supports_batch(DataKind::Quote) {
            self.inner
                .config
                .max_batch_size
                .min(capabilities.max_batch_size)
                .max(1)
        } else {
            1
        };

        let mut by_market: BTreeMap<Market, Vec<Dispatch>> = BTreeMap::new();
        {
            let mut tasks = self.inner.lock_tasks();
            for task in tasks.values_mut() {
                if task.begin_dispatch(now) {
                    by_market
                        .entry(task.instrument.market())
                        .or_default()
                        .push(Dispatch {
                            id: task.instrument.clone(),
                            visible: task.visible,
                        });
                }
            }
        }

        let mut chunks = Vec::new();
        for (market, mut due) in by_market {
            due.sort_by(|a, b| a.id.cmp(&b.id));
            let mut due = due.into_iter().peekable();
            while due.peek().is_some() {
                chunks.push((market, due.by_ref().take(chunk_size).collect()));
            }
        }
        chunks
    }

    fn spawn_job<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if Handle::try_current().is_err() {
            warn!("No tokio runtime, refresh job dropped");
            return false;
        }
        self.inner.lock_jobs().spawn(job);
        true
    }

    fn spawn_subscription(&self, ids: Vec<InstrumentId>, subscribe: bool) {
        if ids.is_empty() || !self.inner.executor.capabilities().supports_push {
            return;
        }
        let inner = Arc::clone(&self.inner);
        self.spawn_job(async move {
            let kinds = [DataKind::Quote];
            let outcome = if subscribe {
                inner.executor.subscribe(&ids, &kinds).await
            } else {
                inner.executor.unsubscribe(&ids, &kinds).await
            };
            match outcome {
                Ok(()) => debug!(
                    "{} {} instrument(s) for pushed quotes",
                    if subscribe { "Subscribed" } else { "Unsubscribed" },
                    ids.len()
                ),
                Err(e) => warn!(
                    "Failed to {} {} instrument(s), polling continues: {}",
                    if subscribe { "subscribe" } else { "unsubscribe" },
                    ids.len(),
                    e
                ),
            }
        });
    }

    // ========================================================================
    // Inputs from the upstream
    // ========================================================================

    /// Applies a pushed payload to the store. Scheduling is not affected.
    pub fn ingest_push(&self, id: &InstrumentId, kind: DataKind, raw: &RawResult) -> ApplyOutcome {
        match normalize(raw, kind) {
            result @ RefreshResult::Ok(_) => {
                self.inner
                    .store
                    .apply_result(id, kind, &result, self.inner.clock.now())
            }
            RefreshResult::Empty => ApplyOutcome::Ignored,
            RefreshResult::Failed(e) => {
                debug!("Dropping pushed {} for {}: {}", kind, id, e);
                ApplyOutcome::Ignored
            }
        }
    }

    /// Records an upstream-reported market state.
    ///
    /// The hint overrides the calendar for that market until it is older than
    /// the configured TTL; the next tick applies it. Unknown labels are
    /// ignored and return `None`.
    pub fn report_upstream_state(&self, market: Market, label: &str) -> Option<SessionState> {
        let Some(state) = parse_upstream_state(label) else {
            debug!("Ignoring unknown {} market state '{}'", market, label);
            return None;
        };
        let now = self.inner.clock.now();
        self.inner.lock_sessions().record_hint(market, state, now);
        Some(state)
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn task(&self, id: &InstrumentId) -> Option<RefreshTask> {
        self.inner.lock_tasks().get(id).cloned()
    }

    /// All tasks, including retired ones awaiting eviction, ordered by instrument.
    pub fn tasks(&self) -> Vec<RefreshTask> {
        let mut tasks: Vec<RefreshTask> = self.inner.lock_tasks().values().cloned().collect();
        tasks.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        tasks
    }

    pub fn stats(&self, id: &InstrumentId) -> Option<RefreshStats> {
        self.inner.lock_stats().get(id).cloned()
    }

    /// The session the scheduler would use for `market` right now.
    pub fn session(&self, market: Market) -> SessionState {
        let now = self.inner.clock.now();
        self.inner.lock_sessions().current(market, now)
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner
            .lock_tasks()
            .values()
            .filter(|task| task.in_flight)
            .count()
    }
}

impl WatchlistEventSink for RefreshScheduler {
    fn emit(&self, event: WatchlistEvent) {
        match event {
            WatchlistEvent::InstrumentTracked { instrument } => {
                self.track(&instrument);
            }
            WatchlistEvent::InstrumentUntracked { instrument } => {
                self.untrack(&instrument);
            }
        }
    }
}

// ============================================================================
// Jobs
// ============================================================================

/// One refresh cycle for a chunk of same-market instruments.
/// Completes the members of a job that has not finished them yet.
///
/// Dropped without finishing (panic, abort, or a cancelled `flush`), it
/// fails every remaining member so none stays in flight.
struct CycleGuard {
    inner: Arc<SchedulerInner>,
    pending: Vec<InstrumentId>,
}

impl CycleGuard {
    fn new(inner: Arc<SchedulerInner>, chunk: &[Dispatch]) -> Self {
        Self {
            inner,
            pending: chunk.iter().map(|d| d.id.clone()).collect(),
        }
    }

    fn finish(&mut self, id: &InstrumentId, results: Vec<(DataKind, RefreshResult)>, latency: Duration) {
        self.pending.retain(|pending| pending != id);
        self.inner.complete(id, results, latency);
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        warn!(
            "Refresh job ended with {} instrument(s) unfinished, failing them",
            self.pending.len()
        );
        let error = RefreshError::upstream("refresh job ended before completing");
        for id in std::mem::take(&mut self.pending) {
            let failed = RefreshResult::Failed(error.clone());
            self.inner.complete(&id, vec![(DataKind::Quote, failed)], Duration::ZERO);
        }
    }
}

async fn run_cycle(mut cycle: CycleGuard, chunk: Vec<Dispatch>) {
    let inner = Arc::clone(&cycle.inner);
    let _permit = inner.workers.acquire().await.ok();
    {
        let mut tasks = inner.lock_tasks();
        for dispatch in &chunk {
            if let Some(task) = tasks.get_mut(&dispatch.id) {
                task.mark_started();
            }
        }
    }

    let started = Instant::now();
    let ids: Vec<InstrumentId> = chunk.iter().map(|d| d.id.clone()).collect();
    let mut results: HashMap<InstrumentId, Vec<(DataKind, RefreshResult)>> = inner
        .executor
        .execute_batch(DataKind::Quote, &ids)
        .await
        .into_iter()
        .map(|(id, result)| (id, vec![(DataKind::Quote, result)]))
        .collect();

    let details = join_all(
        chunk
            .iter()
            .filter(|d| d.visible)
            .map(|d| fetch_details(&inner, &d.id)),
    )
    .await;
    for (id, kinds) in details {
        results.entry(id).or_default().extend(kinds);
    }
    let latency = started.elapsed();

    for id in ids {
        let kinds = results.remove(&id).unwrap_or_default();
        cycle.finish(&id, kinds, latency);
    }
}

async fn fetch_details(
    inner: &SchedulerInner,
    id: &InstrumentId,
) -> (InstrumentId, Vec<(DataKind, RefreshResult)>) {
    let kinds = &inner.config.detail_kinds;
    let results = join_all(kinds.iter().map(|kind| inner.executor.execute(id, *kind))).await;
    (id.clone(), kinds.iter().copied().zip(results).collect())
}

impl SchedulerInner {
    /// Applies one instrument's cycle results and moves its task on.
    fn complete(&self, id: &InstrumentId, results: Vec<(DataKind, RefreshResult)>, latency: Duration) {
        let now = self.clock.now();
        for (kind, result) in &results {
            self.store.apply_result(id, *kind, result, now);
        }

        let empty = RefreshResult::Empty;
        let outcome = results
            .iter()
            .map(|(_, result)| result)
            .fold(None, |worst: Option<&RefreshResult>, result| {
                Some(worst.map_or(result, |w| w.worst(result)))
            })
            .unwrap_or(&empty);

        let fallback_session = self.lock_sessions().current(id.market(), now);
        let threshold = self.config.degraded_after_failures;
        let degraded = {
            let mut tasks = self.lock_tasks();
            let Some(task) = tasks.get_mut(id) else {
                debug!("Refresh of {} completed after its task was removed", id);
                return;
            };
            if task.is_retired() {
                task.complete_discarded(now);
                debug!("Discarded refresh result for untracked {}", id);
                return;
            }

            match outcome {
                RefreshResult::Failed(e) => {
                    let delay = backoff_delay(&self.config, task.consecutive_failures.saturating_add(1));
                    let failures = task.complete_failure(now, delay);
                    debug!("Refresh of {} failed ({}), retrying in {:?}", id, e, delay);
                    if failures == threshold {
                        warn!("{} degraded after {} consecutive failures: {}", id, failures, e);
                    }
                    (failures >= threshold).then_some(true)
                }
                RefreshResult::Ok(_) | RefreshResult::Empty => {
                    let was_degraded = task.consecutive_failures >= threshold;
                    let session = task.session.unwrap_or(fallback_session);
                    let interval = refresh_interval(&self.config, session, task.visible);
                    task.complete_success(now, interval);
                    if was_degraded {
                        info!("{} recovered", id);
                    }
                    was_degraded.then_some(false)
                }
            }
        };

        if let Some(flag) = degraded {
            self.store.set_degraded(id, flag);
        }
        self.lock_stats()
            .entry(id.clone())
            .or_default()
            .record(outcome, latency);
    }

    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<InstrumentId, RefreshTask>> {
        self.tasks.lock().unwrap_or_else(|poisoned| {
            warn!("Refresh task mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_sessions(&self) -> MutexGuard<'_, SessionTracker> {
        self.sessions.lock().unwrap_or_else(|poisoned| {
            warn!("Session tracker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_stats(&self) -> MutexGuard<'_, HashMap<InstrumentId, RefreshStats>> {
        self.stats.lock().unwrap_or_else(|poisoned| {
            warn!("Refresh stats mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_jobs(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.jobs.lock().unwrap_or_else(|poisoned| {
            warn!("Refresh job set mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
