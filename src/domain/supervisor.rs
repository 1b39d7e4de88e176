//! Supervisor policy
//!
//! Maps an observed failure to a [`Directive`]. The decision only reads the
//! policy and the failing instance's own [`SupervisorState`], so it can be
//! evaluated inside the actor without any shared state.

use std::{
    collections::VecDeque,
    time::{Duration, Instant}
};

use serde::{Deserialize, Serialize};

use crate::domain::error::ActorError;

/// Where a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Constructor or `on_start` failed
    Construction,
    /// `receive` returned an error or panicked
    Processing
}

/// What to do with the failing instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    /// Drop the failing message and keep the current state
    Resume,
    /// Replace the instance with a freshly constructed one
    Restart,
    /// Stop only the failing instance
    Stop,
    /// Stop the instance and take the runtime down; reserved for construction failures
    Escalate
}

/// Per-instance failure history inside the rolling window
#[derive(Debug, Clone, Default)]
pub struct SupervisorState {
    failures:       VecDeque<Instant>,
    total_failures: u64,
    restarts:       u64
}

impl SupervisorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failures currently counted against the budget
    pub fn recent_failures(&self) -> usize {
        self.failures.len()
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    pub fn record_restart(&mut self) {
        self.restarts += 1;
    }

    /// Record a failure at `now` and return the count inside the window
    fn record(&mut self, now: Instant, within: Duration) -> usize {
        self.prune(now, within);
        self.failures.push_back(now);
        self.total_failures += 1;
        self.failures.len()
    }

    /// Successful processing clears the history once the window has elapsed
    pub fn record_success(&mut self, now: Instant, within: Duration) {
        if let Some(last) = self.failures.back() {
            if now.saturating_duration_since(*last) >= within {
                self.failures.clear();
            }
        }
    }

    fn prune(&mut self, now: Instant, within: Duration) {
        while let Some(oldest) = self.failures.front() {
            if now.saturating_duration_since(*oldest) >= within {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    fn clear(&mut self) {
        self.failures.clear();
    }
}

/// Serializable budget settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub max_failures: u32,
    pub window_ms:    u64,
    pub on_failure:   Directive,
    pub on_exhausted: Directive
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self { max_failures: 3, window_ms: 3_000, on_failure: Directive::Resume, on_exhausted: Directive::Stop }
    }
}

/// Failure-handling policy attached to one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorPolicy {
    max_failures: u32,
    within:       Duration,
    on_failure:   Directive,
    on_exhausted: Directive
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}

impl SupervisorPolicy {
    /// Resume ordinary failures, stop the instance once `max_failures` land inside `within`
    pub fn new(max_failures: u32, within: Duration) -> Self {
        Self { max_failures, within, on_failure: Directive::Resume, on_exhausted: Directive::Stop }
    }

    pub fn from_config(config: &SupervisorConfig) -> Result<Self, ActorError> {
        Self::new(config.max_failures, Duration::from_millis(config.window_ms))
            .with_failure_directive(config.on_failure)?
            .with_exhausted_directive(config.on_exhausted)?
            .validated()
    }

    /// Directive for failures that stay within budget
    pub fn with_failure_directive(mut self, directive: Directive) -> Result<Self, ActorError> {
        if directive == Directive::Escalate {
            return Err(ActorError::InvalidConfig("only construction failures escalate".to_string()));
        }
        self.on_failure = directive;
        Ok(self)
    }

    /// Directive once the budget is exhausted; resuming is not a valid choice here
    pub fn with_exhausted_directive(mut self, directive: Directive) -> Result<Self, ActorError> {
        match directive {
            Directive::Resume => {
                return Err(ActorError::InvalidConfig("an exhausted retry budget cannot resume".to_string()));
            }
            Directive::Escalate => {
                return Err(ActorError::InvalidConfig("only construction failures escalate".to_string()));
            }
            Directive::Restart | Directive::Stop => {}
        }
        self.on_exhausted = directive;
        Ok(self)
    }

    /// Shorthand for a policy that restarts instead of stopping on exhaustion
    pub fn restarting(max_failures: u32, within: Duration) -> Self {
        Self { on_exhausted: Directive::Restart, ..Self::new(max_failures, within) }
    }

    pub fn validated(self) -> Result<Self, ActorError> {
        if self.max_failures == 0 {
            return Err(ActorError::InvalidConfig("max_failures must be at least 1".to_string()));
        }
        if self.within.is_zero() {
            return Err(ActorError::InvalidConfig("failure window must be non-zero".to_string()));
        }
        Ok(self)
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    pub fn within(&self) -> Duration {
        self.within
    }

    /// Decide the fate of an instance after a failure observed at `now`
    pub fn decide(&self, kind: FailureKind, state: &mut SupervisorState, now: Instant) -> Directive {
        let recent = state.record(now, self.within);

        if kind == FailureKind::Construction {
            return Directive::Escalate;
        }

        if recent >= self.max_failures as usize {
            state.clear();
            return self.on_exhausted;
        }

        self.on_failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    #[test]
    fn test_construction_failure_always_escalates() {
        let policy = SupervisorPolicy::restarting(10, Duration::from_secs(60));
        let mut state = SupervisorState::new();

        assert_eq!(policy.decide(FailureKind::Construction, &mut state, Instant::now()), Directive::Escalate);
    }

    #[test]
    fn test_default_policy_resumes_within_budget() {
        let policy = SupervisorPolicy::default();
        let mut state = SupervisorState::new();
        let base = Instant::now();

        assert_eq!(policy.decide(FailureKind::Processing, &mut state, at(base, 0)), Directive::Resume);
        assert_eq!(policy.decide(FailureKind::Processing, &mut state, at(base, 500)), Directive::Resume);
        assert_eq!(state.recent_failures(), 2);
    }

    #[test]
    fn test_third_failure_inside_window_exhausts_budget() {
        let base = Instant::now();

        let stopping = SupervisorPolicy::default();
        let mut state = SupervisorState::new();
        stopping.decide(FailureKind::Processing, &mut state, at(base, 0));
        stopping.decide(FailureKind::Processing, &mut state, at(base, 1_000));
        assert_eq!(stopping.decide(FailureKind::Processing, &mut state, at(base, 2_000)), Directive::Stop);

        let restarting = SupervisorPolicy::restarting(3, Duration::from_secs(3));
        let mut state = SupervisorState::new();
        restarting.decide(FailureKind::Processing, &mut state, at(base, 0));
        restarting.decide(FailureKind::Processing, &mut state, at(base, 1_000));
        assert_eq!(restarting.decide(FailureKind::Processing, &mut state, at(base, 2_000)), Directive::Restart);
        assert_eq!(state.recent_failures(), 0);
    }

    #[test]
    fn test_failure_after_window_is_fresh() {
        let policy = SupervisorPolicy::restarting(3, Duration::from_secs(3));
        let mut state = SupervisorState::new();
        let base = Instant::now();

        policy.decide(FailureKind::Processing, &mut state, at(base, 0));
        policy.decide(FailureKind::Processing, &mut state, at(base, 100));
        policy.decide(FailureKind::Processing, &mut state, at(base, 200));

        assert_eq!(policy.decide(FailureKind::Processing, &mut state, at(base, 3_500)), Directive::Resume);
        assert_eq!(state.recent_failures(), 1);
        assert_eq!(state.total_failures(), 4);
    }

    #[test]
    fn test_old_failures_fall_out_of_window() {
        let policy = SupervisorPolicy::default();
        let mut state = SupervisorState::new();
        let base = Instant::now();

        policy.decide(FailureKind::Processing, &mut state, at(base, 0));
        policy.decide(FailureKind::Processing, &mut state, at(base, 1_000));
        assert_eq!(policy.decide(FailureKind::Processing, &mut state, at(base, 3_100)), Directive::Resume);
        assert_eq!(state.recent_failures(), 2);
    }

    #[test]
    fn test_success_after_window_resets_history() {
        let policy = SupervisorPolicy::default();
        let mut state = SupervisorState::new();
        let base = Instant::now();

        policy.decide(FailureKind::Processing, &mut state, at(base, 0));
        state.record_success(at(base, 1_000), policy.within());
        assert_eq!(state.recent_failures(), 1);

        state.record_success(at(base, 3_000), policy.within());
        assert_eq!(state.recent_failures(), 0);
    }

    #[test]
    fn test_policy_validation() {
        assert!(SupervisorPolicy::new(0, Duration::from_secs(1)).validated().is_err());
        assert!(SupervisorPolicy::new(1, Duration::ZERO).validated().is_err());
        assert!(SupervisorPolicy::default().with_exhausted_directive(Directive::Resume).is_err());
        assert!(SupervisorPolicy::default().with_exhausted_directive(Directive::Escalate).is_err());
        assert!(SupervisorPolicy::default().with_failure_directive(Directive::Escalate).is_err());
        assert!(SupervisorPolicy::default().with_failure_directive(Directive::Stop).is_ok());

        let policy = SupervisorPolicy::from_config(&SupervisorConfig::default()).unwrap();
        assert_eq!(policy, SupervisorPolicy::default());
    }
}
