//! Admission control for provider calls
//!
//! The governor owns the provider's rate budget. Every provider call goes
//! through [`Governor::admit`], which suspends the caller until the call fits
//! the budget:
//!
//! 1. If the window has run for longer than its length, it restarts.
//! 2. If the window is full, wait for it to end, then restart it.
//! 3. If the previous call was less than the minimum interval ago, wait out the gap.
//! 4. Record the call.
//!
//! On top of the fixed window, admissions are kept in a log so that no
//! rolling window of the same length ever holds more than the budget, even
//! across a window boundary. A provider-signalled rate limit adds a penalty
//! deadline that blocks the next admission independently of the window.

use crate::{clock::Clock, config::RateBudget};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Why an admission has to wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitReason {
    Penalty,
    WindowFull,
    MinInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Granted { count_in_window: u32 },
    Wait { duration: Duration, reason: WaitReason },
}

#[derive(Debug)]
struct GovernorState {
    last_request_at: Option<Instant>,
    window_start: Instant,
    count_in_window: u32,
    penalty_until: Option<Instant>,
    recent: VecDeque<Instant>,
}

impl GovernorState {
    fn new(now: Instant) -> Self {
        Self {
            last_request_at: None,
            window_start: now,
            count_in_window: 0,
            penalty_until: None,
            recent: VecDeque::new(),
        }
    }

    fn restart_window(&mut self, now: Instant) {
        self.window_start = now;
        self.count_in_window = 0;
    }

    fn try_admit(&mut self, now: Instant, budget: &RateBudget) -> Admission {
        let max = budget.max_per_window.max(1);

        if let Some(until) = self.penalty_until {
            if now < until {
                return Admission::Wait {
                    duration: until - now,
                    reason: WaitReason::Penalty,
                };
            }
            self.penalty_until = None;
        }

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed > budget.window {
            self.restart_window(now);
        } else if self.count_in_window >= max {
            let remaining = budget.window - elapsed;
            if !remaining.is_zero() {
                return Admission::Wait {
                    duration: remaining,
                    reason: WaitReason::WindowFull,
                };
            }
            self.restart_window(now);
        }

        while let Some(oldest) = self.recent.front() {
            if now.saturating_duration_since(*oldest) >= budget.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
        if let Some(oldest) = self.recent.front() {
            if self.recent.len() >= max as usize {
                return Admission::Wait {
                    duration: (*oldest + budget.window) - now,
                    reason: WaitReason::WindowFull,
                };
            }
        }

        if let Some(last) = self.last_request_at {
            let gap = now.saturating_duration_since(last);
            if gap < budget.min_interval {
                return Admission::Wait {
                    duration: budget.min_interval - gap,
                    reason: WaitReason::MinInterval,
                };
            }
        }

        self.last_request_at = Some(now);
        self.count_in_window += 1;
        self.recent.push_back(now);
        Admission::Granted {
            count_in_window: self.count_in_window,
        }
    }
}

/// Point-in-time view of the governor counters
#[derive(Debug, Clone, PartialEq)]
pub struct GovernorSnapshot {
    pub count_in_window: u32,
    pub max_per_window: u32,
    pub window_elapsed: Duration,
    pub penalty_remaining: Option<Duration>,
}

/// Rate governor for a single provider
pub struct Governor {
    budget: RateBudget,
    clock: Arc<dyn Clock>,
    state: Mutex<GovernorState>,
    /// Serializes `admit` callers; held across suspensions
    admission: tokio::sync::Mutex<()>,
}

impl Governor {
    pub fn new(budget: RateBudget, clock: Arc<dyn Clock>) -> Self {
        let state = GovernorState::new(clock.now());
        Self {
            budget,
            clock,
            state: Mutex::new(state),
            admission: tokio::sync::Mutex::new(()),
        }
    }

    /// Lock the state mutex, recovering from poison if necessary.
    fn lock_state(&self) -> MutexGuard<'_, GovernorState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Governor state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Suspends until the next provider call is permitted, then records it
    ///
    /// The state lock is only held while deciding, never while sleeping, so
    /// `reset` and `snapshot` stay responsive during long waits.
    pub async fn admit(&self) {
        let _turn = self.admission.lock().await;

        loop {
            let decision = {
                let now = self.clock.now();
                self.lock_state().try_admit(now, &self.budget)
            };

            match decision {
                Admission::Granted { count_in_window } => {
                    tracing::debug!(
                        count_in_window,
                        max_per_window = self.budget.max_per_window,
                        "Provider call admitted"
                    );
                    return;
                }
                Admission::Wait { duration, reason } => {
                    match reason {
                        WaitReason::WindowFull => tracing::warn!(
                            wait_ms = duration.as_millis() as u64,
                            "Rate window exhausted, waiting"
                        ),
                        WaitReason::Penalty => tracing::warn!(
                            wait_ms = duration.as_millis() as u64,
                            "Serving rate-limit penalty"
                        ),
                        WaitReason::MinInterval => tracing::debug!(
                            wait_ms = duration.as_millis() as u64,
                            "Throttling provider call"
                        ),
                    }
                    self.clock.sleep(duration).await;
                }
            }
        }
    }

    /// Records a provider-signalled rate limit
    ///
    /// The next admission is held back for the configured penalty.
    pub fn penalize(&self) {
        let until = self.clock.now() + self.budget.penalty;
        let mut state = self.lock_state();
        state.penalty_until = Some(match state.penalty_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
        tracing::warn!(
            penalty_ms = self.budget.penalty.as_millis() as u64,
            "Provider rate limited us, applying penalty"
        );
    }

    /// Restarts the window and forgets the penalty and admission log
    ///
    /// The minimum spacing to the last admitted call is still honoured.
    pub fn reset(&self) {
        let now = self.clock.now();
        let mut state = self.lock_state();
        state.restart_window(now);
        state.penalty_until = None;
        state.recent.clear();
    }

    pub fn snapshot(&self) -> GovernorSnapshot {
        let now = self.clock.now();
        let state = self.lock_state();
        GovernorSnapshot {
            count_in_window: state.count_in_window,
            max_per_window: self.budget.max_per_window,
            window_elapsed: now.saturating_duration_since(state.window_start),
            penalty_remaining: state
                .penalty_until
                .filter(|until| *until > now)
                .map(|until| until - now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::manual::ManualClock;

    fn governor() -> (Governor, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (Governor::new(RateBudget::default(), clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_first_admission_is_immediate() {
        let (governor, clock) = governor();
        governor.admit().await;
        assert!(clock.sleeps().is_empty());
        assert_eq!(governor.snapshot().count_in_window, 1);
    }

    #[tokio::test]
    async fn test_min_interval_between_admissions() {
        let (governor, clock) = governor();
        governor.admit().await;
        governor.admit().await;
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);

        clock.advance(Duration::from_millis(500));
        governor.admit().await;
        assert_eq!(clock.sleeps()[1], Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_full_window_waits_for_window_end() {
        let (governor, clock) = governor();
        let start = clock.now();

        for _ in 0..10 {
            governor.admit().await;
        }
        assert_eq!(clock.now() - start, Duration::from_secs(18));

        governor.admit().await;
        assert_eq!(clock.now() - start, Duration::from_secs(60));
        assert_eq!(clock.sleeps().last(), Some(&Duration::from_secs(42)));
        assert_eq!(governor.snapshot().count_in_window, 1);
    }

    #[tokio::test]
    async fn test_idle_window_restarts() {
        let (governor, clock) = governor();
        for _ in 0..5 {
            governor.admit().await;
        }
        clock.advance(Duration::from_secs(61));

        governor.admit().await;
        let snapshot = governor.snapshot();
        assert_eq!(snapshot.count_in_window, 1);
        assert_eq!(snapshot.window_elapsed, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_rolling_bound_holds_across_window_boundary() {
        let (governor, clock) = governor();
        let start = clock.now();
        let mut admitted = Vec::new();

        governor.admit().await;
        admitted.push(clock.now());
        clock.advance(Duration::from_secs(42));
        for _ in 0..11 {
            governor.admit().await;
            admitted.push(clock.now());
        }

        for (i, first) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .filter(|t| **t - *first < Duration::from_secs(60))
                .count();
            assert!(in_window <= 10, "{} admissions within 60s", in_window);
        }
        assert!(*admitted.last().unwrap() - start >= Duration::from_secs(102));
    }

    #[tokio::test]
    async fn test_penalty_delays_next_admission() {
        let (governor, clock) = governor();
        governor.admit().await;
        governor.penalize();
        assert_eq!(
            governor.snapshot().penalty_remaining,
            Some(Duration::from_secs(5))
        );

        clock.advance(Duration::from_secs(3));
        governor.admit().await;
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);
        assert_eq!(governor.snapshot().penalty_remaining, None);
    }

    #[tokio::test]
    async fn test_reset_reopens_window() {
        let (governor, clock) = governor();
        for _ in 0..10 {
            governor.admit().await;
        }
        governor.penalize();
        governor.reset();

        let before = clock.total_slept();
        governor.admit().await;
        assert_eq!(clock.total_slept() - before, Duration::from_secs(2));
        assert_eq!(governor.snapshot().count_in_window, 1);
    }
}
