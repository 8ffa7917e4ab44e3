use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::constants::gasless::{COOLDOWN_SECS, FAILURE_THRESHOLD};
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "closed"),
            BreakerState::Open => write!(f, "open"),
            BreakerState::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the breaker
    pub failure_threshold: u32,
    /// Time spent open before a trial request is admitted
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: FAILURE_THRESHOLD,
            cooldown: Duration::from_secs(COOLDOWN_SECS),
        }
    }
}

/// Read-only copy of the breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failure_count: u32,
    pub last_failure_time: Option<Instant>,
    pub trial_in_flight: bool,
}

/// Admission ticket for one logical operation.
///
/// A half-open trial permit that is dropped without being settled frees the trial slot so
/// the next caller can probe the service.
#[must_use]
#[derive(Debug)]
pub struct Permit {
    trial_slot: Option<Arc<AtomicBool>>,
}

impl Permit {
    pub fn is_trial(&self) -> bool {
        self.trial_slot.is_some()
    }

    fn disarm(&mut self) {
        self.trial_slot = None;
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(slot) = self.trial_slot.take() {
            debug!("Half-open trial abandoned, releasing trial slot");
            slot.store(false, Ordering::SeqCst);
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: BreakerState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    trial_slot: Arc<AtomicBool>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: BreakerState::Closed,
            failure_count: 0,
            last_failure_time: None,
            trial_slot: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Admit a request or reject it with the remaining cooldown
    pub fn try_acquire(&mut self, now: Instant) -> Result<Permit> {
        match self.state {
            BreakerState::Closed => Ok(Permit { trial_slot: None }),
            BreakerState::Open => {
                let opened_at = self.last_failure_time.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed < self.config.cooldown {
                    return Err(Error::CircuitBreakerOpen {
                        retry_after: self.config.cooldown - elapsed,
                    });
                }
                info!("Circuit breaker cooldown elapsed, admitting trial request");
                self.state = BreakerState::HalfOpen;
                self.acquire_trial()
            }
            BreakerState::HalfOpen => self.acquire_trial(),
        }
    }

    fn acquire_trial(&mut self) -> Result<Permit> {
        if self
            .trial_slot
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::CircuitBreakerOpen {
                retry_after: Duration::ZERO,
            });
        }
        Ok(Permit {
            trial_slot: Some(Arc::clone(&self.trial_slot)),
        })
    }

    /// The remote answered definitively
    pub fn record_success(&mut self, mut permit: Permit) {
        let was_trial = permit.is_trial();
        permit.disarm();
        if self.state != BreakerState::Closed {
            info!("Circuit breaker closed after successful {} request", self.state);
        }
        self.state = BreakerState::Closed;
        self.failure_count = 0;
        self.last_failure_time = None;
        if was_trial {
            self.trial_slot.store(false, Ordering::SeqCst);
        }
    }

    /// The remote looked unhealthy for a whole operation
    pub fn record_failure(&mut self, mut permit: Permit, now: Instant) {
        // Only the trial holder owns the slot; permits issued while closed leave it alone
        if permit.is_trial() {
            self.trial_slot.store(false, Ordering::SeqCst);
        }
        permit.disarm();
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_time = Some(now);

        let should_open = self.state == BreakerState::HalfOpen
            || self.failure_count >= self.config.failure_threshold;
        if should_open && self.state != BreakerState::Open {
            warn!(
                "Circuit breaker opened after {} consecutive failure(s)",
                self.failure_count
            );
            self.state = BreakerState::Open;
        } else if self.state == BreakerState::Open {
            debug!("Failure recorded while open, cooldown restarted");
        }
    }

    /// Operator override: back to Closed with no history
    pub fn reset(&mut self) {
        self.state = BreakerState::Closed;
        self.failure_count = 0;
        self.last_failure_time = None;
        self.trial_slot.store(false, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            failure_count: self.failure_count,
            last_failure_time: self.last_failure_time,
            trial_in_flight: self.trial_slot.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig::default())
    }

    #[test]
    fn test_opens_after_threshold() {
        let mut breaker = breaker();
        let now = Instant::now();

        for _ in 0..2 {
            let permit = breaker.try_acquire(now).unwrap();
            breaker.record_failure(permit, now);
            assert_eq!(breaker.state(), BreakerState::Closed);
        }
        let permit = breaker.try_acquire(now).unwrap();
        breaker.record_failure(permit, now);
        assert_eq!(breaker.state(), BreakerState::Open);

        match breaker.try_acquire(now + Duration::from_secs(20)) {
            Err(Error::CircuitBreakerOpen { retry_after }) => {
                assert_eq!(retry_after, Duration::from_secs(100));
            }
            other => panic!("expected open breaker, got {other:?}"),
        }
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut breaker = breaker();
        let now = Instant::now();

        let permit = breaker.try_acquire(now).unwrap();
        breaker.record_failure(permit, now);
        let permit = breaker.try_acquire(now).unwrap();
        breaker.record_success(permit);

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.failure_count, 0);
        assert!(snapshot.last_failure_time.is_none());
    }

    #[test]
    fn test_half_open_admits_single_trial() {
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(10),
        });
        let now = Instant::now();
        let permit = breaker.try_acquire(now).unwrap();
        breaker.record_failure(permit, now);

        let later = now + Duration::from_secs(10);
        let trial = breaker.try_acquire(later).unwrap();
        assert!(trial.is_trial());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(breaker.try_acquire(later).is_err());

        // Failing trial reopens the breaker
        breaker.record_failure(trial, later);
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.try_acquire(later).is_err());
    }

    #[test]
    fn test_dropped_trial_releases_slot() {
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(10),
        });
        let now = Instant::now();
        let permit = breaker.try_acquire(now).unwrap();
        breaker.record_failure(permit, now);

        let later = now + Duration::from_secs(10);
        let trial = breaker.try_acquire(later).unwrap();
        assert!(breaker.snapshot().trial_in_flight);
        drop(trial);

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, BreakerState::HalfOpen);
        assert_eq!(snapshot.failure_count, 1);
        assert!(!snapshot.trial_in_flight);

        let retry = breaker.try_acquire(later).unwrap();
        breaker.record_success(retry);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_closed_permit_settling_keeps_trial_slot() {
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(10),
        });
        let now = Instant::now();
        let stale = breaker.try_acquire(now).unwrap();
        let opener = breaker.try_acquire(now).unwrap();
        breaker.record_failure(opener, now);

        let later = now + Duration::from_secs(10);
        let trial = breaker.try_acquire(later).unwrap();
        assert!(trial.is_trial());

        // A permit from before the breaker opened settles while the trial is in flight
        breaker.record_failure(stale, later);
        assert!(breaker.snapshot().trial_in_flight);

        // Still only one trial until the first one settles
        let later = later + Duration::from_secs(10);
        assert!(breaker.try_acquire(later).is_err());

        drop(trial);
        let second = breaker.try_acquire(later).unwrap();
        assert!(second.is_trial());
        breaker.record_success(second);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_closed_permit_success_keeps_trial_slot() {
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(10),
        });
        let now = Instant::now();
        let stale = breaker.try_acquire(now).unwrap();
        let opener = breaker.try_acquire(now).unwrap();
        breaker.record_failure(opener, now);

        let later = now + Duration::from_secs(10);
        let trial = breaker.try_acquire(later).unwrap();
        breaker.record_success(stale);
        assert!(breaker.snapshot().trial_in_flight);

        breaker.record_success(trial);
        assert!(!breaker.snapshot().trial_in_flight);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_reset() {
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(60),
        });
        let now = Instant::now();
        let permit = breaker.try_acquire(now).unwrap();
        breaker.record_failure(permit, now);
        assert_eq!(breaker.state(), BreakerState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire(now).is_ok());
    }
}
