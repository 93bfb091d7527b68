//! Recovery breaker for the scan loop
//!
//! Failed cycles are retried with backoff. Once consecutive failures exceed
//! the retry budget the breaker opens for good; only a process restart
//! (with a fresh breaker) resumes scanning.

use serde::{Deserialize, Serialize};

/// Breaker state
///
/// ```text
/// [RUNNING] ──cycle failed──→ [RECOVERING {attempt: 1}]
///                                      │
///                                      ├── cycle ok ──→ [RUNNING]
///                                      │
///                                      └── cycle failed ──→ [RECOVERING {attempt: n+1}]
///                                                                │
///                                                                ↓
///                                                attempt > max_retries? ──→ [FAULTED]
/// ```
///
/// `FAULTED` absorbs every event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryState {
    /// Cycles are succeeding
    #[default]
    Running,
    /// Retrying after `attempt` consecutive failures
    Recovering {
        /// Consecutive failures so far
        attempt: u32,
    },
    /// Retry budget exhausted
    Faulted,
}

/// Events fed into the breaker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryEvent {
    /// A cycle committed or found nothing to do
    CycleSucceeded,
    /// A cycle failed or stalled
    CycleFailed,
}

/// Tracks consecutive cycle failures against the retry budget
#[derive(Debug)]
pub struct RecoveryBreaker {
    state: RecoveryState,
    max_retries: u32,
    consecutive_failures: u64,
    total_failures: u64,
}

impl RecoveryBreaker {
    /// Create a breaker allowing `max_retries` retries after the first failure
    pub fn new(max_retries: u32) -> Self {
        Self {
            state: RecoveryState::Running,
            max_retries,
            consecutive_failures: 0,
            total_failures: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// Check if the budget is exhausted
    pub fn is_faulted(&self) -> bool {
        matches!(self.state, RecoveryState::Faulted)
    }

    /// Current retry attempt, 0 when running
    pub fn attempt(&self) -> u32 {
        match self.state {
            RecoveryState::Recovering { attempt } => attempt,
            _ => 0,
        }
    }

    /// Process an event and transition state
    pub fn process_event(&mut self, event: RecoveryEvent) -> RecoveryState {
        let new_state = self.next_state(event);

        match event {
            RecoveryEvent::CycleFailed => {
                self.consecutive_failures += 1;
                self.total_failures += 1;
            }
            RecoveryEvent::CycleSucceeded => {
                self.consecutive_failures = 0;
            }
        }

        self.state = new_state;
        new_state
    }

    /// Pure transition function
    fn next_state(&self, event: RecoveryEvent) -> RecoveryState {
        match (self.state, event) {
            (RecoveryState::Running, RecoveryEvent::CycleSucceeded) => RecoveryState::Running,
            (RecoveryState::Running, RecoveryEvent::CycleFailed) => {
                if self.max_retries == 0 {
                    RecoveryState::Faulted
                } else {
                    RecoveryState::Recovering { attempt: 1 }
                }
            }

            (RecoveryState::Recovering { .. }, RecoveryEvent::CycleSucceeded) => {
                RecoveryState::Running
            }
            (RecoveryState::Recovering { attempt }, RecoveryEvent::CycleFailed) => {
                if attempt >= self.max_retries {
                    RecoveryState::Faulted
                } else {
                    RecoveryState::Recovering {
                        attempt: attempt + 1,
                    }
                }
            }

            (state, _) => state,
        }
    }

    /// Failures since the last success
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures
    }

    /// Failures since creation, recovered ones included
    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_to_recovering() {
        let mut breaker = RecoveryBreaker::new(3);
        breaker.process_event(RecoveryEvent::CycleFailed);
        assert_eq!(breaker.state(), RecoveryState::Recovering { attempt: 1 });
        assert_eq!(breaker.attempt(), 1);
    }

    #[test]
    fn test_recovering_to_running() {
        let mut breaker = RecoveryBreaker::new(3);
        breaker.process_event(RecoveryEvent::CycleFailed);
        breaker.process_event(RecoveryEvent::CycleSucceeded);
        assert_eq!(breaker.state(), RecoveryState::Running);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(breaker.total_failures(), 1);
    }

    #[test]
    fn test_faults_after_retry_budget() {
        let mut breaker = RecoveryBreaker::new(3);

        // Initial failure plus three retries
        for expected in 1..=3 {
            breaker.process_event(RecoveryEvent::CycleFailed);
            assert_eq!(
                breaker.state(),
                RecoveryState::Recovering { attempt: expected }
            );
        }

        breaker.process_event(RecoveryEvent::CycleFailed);
        assert!(breaker.is_faulted());
        assert_eq!(breaker.consecutive_failures(), 4);
    }

    #[test]
    fn test_zero_retries_faults_immediately() {
        let mut breaker = RecoveryBreaker::new(0);
        breaker.process_event(RecoveryEvent::CycleFailed);
        assert!(breaker.is_faulted());
    }

    #[test]
    fn test_faulted_ignores_success() {
        let mut breaker = RecoveryBreaker::new(0);
        breaker.process_event(RecoveryEvent::CycleFailed);

        breaker.process_event(RecoveryEvent::CycleSucceeded);
        assert!(breaker.is_faulted());
        assert_eq!(breaker.total_failures(), 1);
    }
}
