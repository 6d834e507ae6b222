use serde::Serialize;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Percent of the budget at which the first usage warning fires
pub const ELEVATED_USAGE_PERCENT: f64 = 60.0;
/// Percent of the budget at which the second usage warning fires
pub const CRITICAL_USAGE_PERCENT: f64 = 80.0;

/// Enforces a minimum interval between consecutive model calls.
///
/// Callers that arrive early block until the interval has elapsed. The lock is
/// held while sleeping so concurrent callers are released one at a time.
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        RateGate {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Block until a call may be made, then stamp the call time. Returns the time spent waiting.
    pub fn wait_turn(&self) -> Duration {
        let mut last_call = self
            .last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut waited = Duration::ZERO;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                waited = self.min_interval - elapsed;
                debug!(wait_ms = waited.as_millis() as u64, "rate gate: waiting");
                std::thread::sleep(waited);
            }
        }
        *last_call = Some(Instant::now());
        waited
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub used: u64,
    pub limit: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageAlert {
    Elevated,
    Critical,
}

impl UsageAlert {
    fn level(self) -> u8 {
        match self {
            UsageAlert::Elevated => 1,
            UsageAlert::Critical => 2,
        }
    }
}

/// Cumulative consumption counter. Observational only: it never blocks a call.
#[derive(Debug)]
pub struct UsageTracker {
    used: AtomicU64,
    limit: u64,
    alerted: AtomicU8,
}

impl UsageTracker {
    pub fn new(limit: u64) -> Self {
        UsageTracker {
            used: AtomicU64::new(0),
            limit,
            alerted: AtomicU8::new(0),
        }
    }

    /// Add `units` and return the alert crossed by this update, if any.
    ///
    /// Each alert fires at most once per tracker.
    pub fn record(&self, units: u64) -> Option<UsageAlert> {
        let used = self.used.fetch_add(units, Ordering::SeqCst) + units;
        let percent = percent_of(used, self.limit);

        let alert = if percent >= CRITICAL_USAGE_PERCENT {
            UsageAlert::Critical
        } else if percent >= ELEVATED_USAGE_PERCENT {
            UsageAlert::Elevated
        } else {
            return None;
        };

        let previous = self.alerted.fetch_max(alert.level(), Ordering::SeqCst);
        if alert.level() <= previous {
            return None;
        }

        match alert {
            UsageAlert::Elevated => warn!(
                used,
                limit = self.limit,
                "model usage passed {ELEVATED_USAGE_PERCENT}% of budget"
            ),
            UsageAlert::Critical => warn!(
                used,
                limit = self.limit,
                "model usage passed {CRITICAL_USAGE_PERCENT}% of budget, consider raising the budget"
            ),
        }
        Some(alert)
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let used = self.used.load(Ordering::SeqCst);
        UsageSnapshot {
            used,
            limit: self.limit,
            percent: percent_of(used, self.limit),
        }
    }
}

fn percent_of(used: u64, limit: u64) -> f64 {
    // zero limit means no budget configured
    if limit == 0 {
        return 0.0;
    }
    used as f64 / limit as f64 * 100.0
}

/// Process-wide state shared by every recommendation fetcher.
///
/// Build one per process (or per test) and hand it to fetchers behind an `Arc`.
#[derive(Debug)]
pub struct RecommendationContext {
    pub rate_gate: RateGate,
    pub usage: UsageTracker,
}

impl RecommendationContext {
    pub fn new(min_interval: Duration, usage_limit: u64) -> Self {
        RecommendationContext {
            rate_gate: RateGate::new(min_interval),
            usage: UsageTracker::new(usage_limit),
        }
    }
}
