use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use decidra_market_data::{InstrumentId, SessionState};

/// Scheduling state of a refresh task.
///
/// ```text
/// IDLE ──due──► PENDING ──worker──► IN_FLIGHT ──Ok/Empty──► IDLE
///                  ▲                      │
///                  │                      └──Failed──► BACKOFF
///                  └────────────due──────────────────────┘
/// ```
///
/// `PENDING` means dispatched but waiting for a worker slot. The in-flight
/// flag is already set in `PENDING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Idle,
    Pending,
    InFlight,
    Backoff,
}

/// Per-instrument scheduling state.
#[derive(Clone, Debug, PartialEq)]
pub struct RefreshTask {
    pub instrument: InstrumentId,
    pub state: TaskState,
    pub next_due: DateTime<Utc>,
    pub interval: Duration,
    pub consecutive_failures: u32,
    /// Sole guard against concurrent refreshes of one instrument.
    pub in_flight: bool,
    /// Shown on screen; shortens the interval and adds detail kinds.
    pub visible: bool,
    /// Session the interval was computed for.
    pub session: Option<SessionState>,
    pub last_completed_at: Option<DateTime<Utc>>,
    /// Set when the instrument left its last group.
    pub retired_at: Option<DateTime<Utc>>,
}

impl RefreshTask {
    /// A new task, due immediately.
    pub fn new(instrument: InstrumentId, now: DateTime<Utc>) -> Self {
        Self {
            instrument,
            state: TaskState::Idle,
            next_due: now,
            interval: Duration::ZERO,
            consecutive_failures: 0,
            in_flight: false,
            visible: false,
            session: None,
            last_completed_at: None,
            retired_at: None,
        }
    }

    pub fn is_retired(&self) -> bool {
        self.retired_at.is_some()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.in_flight
            && !self.is_retired()
            && matches!(self.state, TaskState::Idle | TaskState::Backoff)
            && self.next_due <= now
    }

    /// Healthy tasks follow session changes; backing-off ones keep their delay.
    pub fn follows_session(&self) -> bool {
        !self.in_flight && !self.is_retired() && self.consecutive_failures == 0
    }

    /// IDLE/BACKOFF → PENDING. Returns false if not due.
    pub(crate) fn begin_dispatch(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.state = TaskState::Pending;
        self.in_flight = true;
        true
    }

    /// PENDING → IN_FLIGHT once a worker picks the task up.
    pub(crate) fn mark_started(&mut self) {
        if self.state == TaskState::Pending {
            self.state = TaskState::InFlight;
        }
    }

    pub(crate) fn complete_success(&mut self, now: DateTime<Utc>, interval: Duration) {
        self.in_flight = false;
        self.state = TaskState::Idle;
        self.consecutive_failures = 0;
        self.interval = interval;
        self.last_completed_at = Some(now);
        self.next_due = super::policy::due_after(now, interval);
    }

    /// Returns the new consecutive failure count.
    pub(crate) fn complete_failure(&mut self, now: DateTime<Utc>, delay: Duration) -> u32 {
        self.in_flight = false;
        self.state = TaskState::Backoff;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_completed_at = Some(now);
        self.next_due = super::policy::due_after(now, delay);
        self.consecutive_failures
    }

    /// Completion for a retired task: clear the flag, schedule nothing.
    pub(crate) fn complete_discarded(&mut self, now: DateTime<Utc>) {
        self.in_flight = false;
        self.state = TaskState::Idle;
        self.last_completed_at = Some(now);
    }

    /// Applies a new interval, rebasing `next_due` on the last completion.
    ///
    /// A task that has never completed stays due.
    pub(crate) fn reschedule(&mut self, interval: Duration) {
        self.interval = interval;
        if let Some(base) = self.last_completed_at {
            self.next_due = super::policy::due_after(base, interval);
        }
    }
}
