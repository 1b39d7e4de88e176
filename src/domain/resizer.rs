//! Pool sizing
//!
//! [`PoolConfig`] is the registration contract; [`Resizer`] turns observed
//! per-worker load into a size delta that never leaves `[lower, upper_bound]`.

use serde::{Deserialize, Serialize};

use crate::domain::error::ActorError;

/// Initial size and hard ceiling of a worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub instance_count: usize,
    pub upper_bound:    usize
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { instance_count: 10, upper_bound: 100 }
    }
}

impl PoolConfig {
    pub fn new(instance_count: usize, upper_bound: usize) -> Self {
        Self { instance_count, upper_bound }
    }

    /// `instance_count` must be at least one and strictly below `upper_bound`
    pub fn validate(&self) -> Result<(), ActorError> {
        if self.instance_count == 0 {
            return Err(ActorError::InvalidConfig("instance_count must be at least 1".to_string()));
        }
        if self.instance_count >= self.upper_bound {
            return Err(ActorError::InvalidConfig(format!(
                "instance_count ({}) must be lower than upper_bound ({})",
                self.instance_count, self.upper_bound
            )));
        }
        Ok(())
    }
}

/// Elasticity heuristic settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizerConfig {
    /// Floor for shrinking; `None` keeps the pool at its initial size or above
    pub lower_bound:         Option<usize>,
    /// In-flight messages at which a worker counts as busy
    pub pressure_threshold:  usize,
    /// Growth fraction when every worker is busy
    pub rampup_rate:         f64,
    /// Busy fraction below which the pool shrinks
    pub backoff_threshold:   f64,
    /// Shrink fraction
    pub backoff_rate:        f64,
    /// Evaluate resizing on every n-th routed message
    pub messages_per_resize: u64
}

impl Default for ResizerConfig {
    fn default() -> Self {
        Self {
            lower_bound:         None,
            pressure_threshold:  1,
            rampup_rate:         0.2,
            backoff_threshold:   0.3,
            backoff_rate:        0.1,
            messages_per_resize: 10
        }
    }
}

impl ResizerConfig {
    pub fn validate(&self) -> Result<(), ActorError> {
        if self.messages_per_resize == 0 {
            return Err(ActorError::InvalidConfig("messages_per_resize must be at least 1".to_string()));
        }
        if self.pressure_threshold == 0 {
            return Err(ActorError::InvalidConfig("pressure_threshold must be at least 1".to_string()));
        }
        if self.lower_bound == Some(0) {
            return Err(ActorError::InvalidConfig("lower_bound must be at least 1".to_string()));
        }
        if self.rampup_rate < 0.0 || self.backoff_rate < 0.0 || self.backoff_threshold < 0.0 {
            return Err(ActorError::InvalidConfig("resizer rates must not be negative".to_string()));
        }
        Ok(())
    }
}

/// Load-driven size calculator for one pool
#[derive(Debug, Clone)]
pub struct Resizer {
    lower:    usize,
    upper:    usize,
    config:   ResizerConfig,
    messages: u64
}

impl Resizer {
    pub fn new(pool: PoolConfig, config: ResizerConfig) -> Self {
        let lower = config.lower_bound.unwrap_or(pool.instance_count).clamp(1, pool.upper_bound.max(1));
        Self { lower, upper: pool.upper_bound.max(lower), config, messages: 0 }
    }

    pub fn lower(&self) -> usize {
        self.lower
    }

    pub fn upper(&self) -> usize {
        self.upper
    }

    /// Count one routed message and report whether a resize is due
    pub fn tick(&mut self) -> bool {
        let due = self.messages % self.config.messages_per_resize == 0;
        self.messages = self.messages.wrapping_add(1);
        due
    }

    /// Size delta for workers with the given in-flight counts
    pub fn resize(&self, in_flight: &[usize]) -> isize {
        let current = in_flight.len();
        let pressure = in_flight.iter().filter(|load| **load >= self.config.pressure_threshold).count();
        let proposed = self.rampup(pressure, current) + self.backoff(pressure, current);
        let target = (current as isize + proposed).clamp(self.lower as isize, self.upper as isize);

        target - current as isize
    }

    fn rampup(&self, pressure: usize, current: usize) -> isize {
        if current == 0 || pressure < current {
            return 0;
        }
        (self.config.rampup_rate * current as f64).ceil() as isize
    }

    fn backoff(&self, pressure: usize, current: usize) -> isize {
        if current == 0 || self.config.backoff_threshold <= 0.0 || self.config.backoff_rate <= 0.0 {
            return 0;
        }
        if (pressure as f64 / current as f64) < self.config.backoff_threshold {
            (-self.config.backoff_rate * current as f64).floor() as isize
        } else {
            0
        }
    }
}
