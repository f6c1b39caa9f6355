use std::time::Duration;

use decidra_market_data::RefreshResult;

/// Running counters for one instrument's refresh cycles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RefreshStats {
    pub attempts: u64,
    pub successes: u64,
    pub empties: u64,
    pub failures: u64,
    pub last_latency: Option<Duration>,
    total_latency: Duration,
}

impl RefreshStats {
    pub fn record(&mut self, outcome: &RefreshResult, latency: Duration) {
        self.attempts += 1;
        match outcome {
            RefreshResult::Ok(_) => self.successes += 1,
            RefreshResult::Empty => self.empties += 1,
            RefreshResult::Failed(_) => self.failures += 1,
        }
        self.last_latency = Some(latency);
        self.total_latency = self.total_latency.saturating_add(latency);
    }

    pub fn average_latency(&self) -> Option<Duration> {
        let attempts = u32::try_from(self.attempts).ok().filter(|n| *n > 0)?;
        Some(self.total_latency / attempts)
    }

    /// Share of cycles that did not fail, in `[0, 1]`.
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        (self.successes + self.empties) as f64 / self.attempts as f64
    }
}
