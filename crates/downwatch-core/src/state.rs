use std::time::Duration;

use tokio::time::Instant;

use crate::config::DEFAULT_FAILURES;

/// Mutable availability bookkeeping for one monitor.
#[derive(Debug, Clone)]
pub(crate) struct MonitorState {
    pub available: Option<bool>,
    pub ping: Option<Duration>,
    pub uptime: Option<Duration>,
    pub unavailability: Option<Duration>,
    pub consecutive_failures: u32,
    /// Set once the current down-streak has emitted its outage.
    pub outage_signaled: bool,
    pub streak_start: Instant,
    pub last_success: Instant,
    /// Bumped on stop/restart so results from cancelled cycles are dropped.
    pub epoch: u64,
}

impl MonitorState {
    pub fn new(now: Instant) -> Self {
        Self {
            available: None,
            ping: None,
            uptime: None,
            unavailability: None,
            consecutive_failures: DEFAULT_FAILURES,
            outage_signaled: false,
            streak_start: now,
            last_success: now,
            epoch: 0,
        }
    }

    /// Records a reachable response and returns the current uptime.
    pub fn record_success(&mut self, now: Instant, ping: Duration) -> Duration {
        if self.outage_signaled {
            self.streak_start = now;
        }

        self.consecutive_failures = 0;
        self.outage_signaled = false;
        self.available = Some(true);
        self.last_success = now;
        self.ping = Some(ping);

        let uptime = now.saturating_duration_since(self.streak_start);
        self.uptime = Some(uptime);
        uptime
    }

    /// Records a failed or timed out check.
    ///
    /// Returns the unavailability when this failure is the one that moves the
    /// monitor into an outage, `None` inside the retry window or when the outage
    /// was already signaled.
    pub fn record_failure(&mut self, now: Instant, retries: u32) -> Option<Duration> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures <= retries {
            return None;
        }

        let down_for = now.saturating_duration_since(self.last_success);
        self.available = Some(false);
        self.unavailability = Some(down_for);

        if self.outage_signaled {
            return None;
        }
        self.outage_signaled = true;
        Some(down_for)
    }
}

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outage_needs_more_failures_than_retries() {
        let start = Instant::now();
        let mut state = MonitorState::new(start);

        for n in 1..=3 {
            assert_eq!(state.record_failure(start, 3), None, "failure {n} is inside the window");
        }
        assert_eq!(state.available, None);

        let outage = state.record_failure(start + Duration::from_secs(12), 3);

        assert_eq!(outage, Some(Duration::from_secs(12)));
        assert_eq!(state.available, Some(false));
        assert_eq!(state.consecutive_failures, 4);
    }

    #[test]
    fn outage_is_signaled_once_per_down_streak() {
        let start = Instant::now();
        let mut state = MonitorState::new(start);

        let signaled = (0..8)
            .filter_map(|i| state.record_failure(start + Duration::from_secs(i), 3))
            .count();

        assert_eq!(signaled, 1);
        assert_eq!(state.unavailability, Some(Duration::from_secs(7)));
    }

    #[test]
    fn success_resets_failures_and_starts_a_new_streak_after_outage() {
        let start = Instant::now();
        let mut state = MonitorState::new(start);
        state.record_success(start + Duration::from_secs(3), Duration::from_millis(40));
        for i in 0..4 {
            state.record_failure(start + Duration::from_secs(6 + i), 3);
        }

        let uptime = state.record_success(start + Duration::from_secs(20), Duration::from_millis(55));

        assert_eq!(uptime, Duration::ZERO);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.available, Some(true));
        assert_eq!(state.ping, Some(Duration::from_millis(55)));
        assert!(!state.outage_signaled);
    }

    #[test]
    fn failures_inside_the_window_keep_the_up_streak() {
        let start = Instant::now();
        let mut state = MonitorState::new(start);
        state.record_failure(start + Duration::from_secs(3), 3);
        state.record_failure(start + Duration::from_secs(6), 3);

        let uptime = state.record_success(start + Duration::from_secs(9), Duration::from_millis(10));

        assert_eq!(uptime, Duration::from_secs(9));
        assert_eq!(state.consecutive_failures, 0);
    }
}
