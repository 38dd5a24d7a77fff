//! Bounded crash-restart policy.
//!
//! Each crash is recorded with its time. Crashes older than the window are
//! forgotten; once the window holds more than `max_attempts` crashes the
//! policy gives up and the supervisor stays crashed.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::RestartConfig;
use crate::resilience::backoff::calculate_backoff;

#[derive(Debug, Clone)]
pub struct RestartPolicy {
    pub enabled: bool,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub window: Duration,
}

impl From<&RestartConfig> for RestartPolicy {
    fn from(config: &RestartConfig) -> Self {
        Self {
            enabled: config.enabled,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts,
            window: Duration::from_secs(config.window_secs),
        }
    }
}

/// What to do after a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Restart after `delay`; this is restart number `attempt` in the window.
    Retry { attempt: u32, delay: Duration },
    /// Too many crashes in the window.
    GiveUp { crashes: u32 },
    /// Automatic restarts are switched off.
    Disabled,
}

#[derive(Debug)]
pub struct RestartTracker {
    policy: RestartPolicy,
    crashes: VecDeque<Instant>,
}

impl RestartTracker {
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            crashes: VecDeque::new(),
        }
    }

    /// Record a crash at `now` and decide whether to restart.
    pub fn record_crash(&mut self, now: Instant) -> RestartDecision {
        if !self.policy.enabled {
            return RestartDecision::Disabled;
        }

        self.crashes.push_back(now);
        while let Some(&oldest) = self.crashes.front() {
            if now.saturating_duration_since(oldest) > self.policy.window {
                self.crashes.pop_front();
            } else {
                break;
            }
        }

        let attempt = self.crashes.len() as u32;
        if attempt > self.policy.max_attempts {
            return RestartDecision::GiveUp { crashes: attempt };
        }

        let delay = calculate_backoff(
            attempt,
            self.policy.base_delay.as_millis() as u64,
            self.policy.max_delay.as_millis() as u64,
        );
        RestartDecision::Retry { attempt, delay }
    }

    /// Crashes currently counted against the window.
    #[cfg(test)]
    fn attempts(&self) -> u32 {
        self.crashes.len() as u32
    }

    pub fn reset(&mut self) {
        self.crashes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RestartPolicy {
        RestartPolicy {
            enabled: true,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            max_attempts,
            window: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_backoff_grows_then_gives_up() {
        let mut tracker = RestartTracker::new(policy(5));
        let start = Instant::now();
        let mut previous = Duration::ZERO;

        for n in 1..=5 {
            match tracker.record_crash(start + Duration::from_secs(n)) {
                RestartDecision::Retry { attempt, delay } => {
                    assert_eq!(attempt, n as u32);
                    assert!(delay >= previous);
                    assert!(delay <= Duration::from_millis(1000));
                    previous = delay;
                }
                other => panic!("expected retry, got {other:?}"),
            }
        }

        assert_eq!(
            tracker.record_crash(start + Duration::from_secs(6)),
            RestartDecision::GiveUp { crashes: 6 }
        );
    }

    #[test]
    fn test_old_crashes_leave_the_window() {
        let mut tracker = RestartTracker::new(policy(2));
        let start = Instant::now();

        tracker.record_crash(start);
        tracker.record_crash(start + Duration::from_secs(1));
        let decision = tracker.record_crash(start + Duration::from_secs(120));

        assert!(matches!(decision, RestartDecision::Retry { attempt: 1, .. }));
        assert_eq!(tracker.attempts(), 1);
    }

    #[test]
    fn test_disabled_policy() {
        let mut p = policy(3);
        p.enabled = false;
        let mut tracker = RestartTracker::new(p);
        assert_eq!(tracker.record_crash(Instant::now()), RestartDecision::Disabled);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut tracker = RestartTracker::new(policy(1));
        let now = Instant::now();
        tracker.record_crash(now);
        tracker.reset();
        assert!(matches!(tracker.record_crash(now), RestartDecision::Retry { attempt: 1, .. }));
    }
}
