//! Scheduler configuration

use std::time::Duration;
use tracewarden_core::{ConfigError, Timestamp};

/// Default thread name for spawned schedulers
pub const DEFAULT_THREAD_NAME: &str = "tracewarden-scheduler";

/// How often and for how long a [`PeriodicScheduler`](crate::PeriodicScheduler) runs
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Time between invocations
    pub period: Duration,
    /// Stop once the clock reaches this time
    pub deadline: Option<Timestamp>,
    /// Stop after this many invocations
    pub limit: Option<u64>,
    /// Name of the thread created by `spawn`
    pub name: String,
}

impl SchedulerConfig {
    /// Run every `period`, forever
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: None,
            limit: None,
            name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Run every `secs` seconds
    pub fn from_secs_f64(secs: f64) -> Result<Self, ConfigError> {
        let period = Duration::try_from_secs_f64(secs)
            .map_err(|e| {
                ConfigError::Invalid(format!("invalid scheduler period {}: {}", secs, e))
            })?;
        let config = Self::new(period);
        config.validate()?;
        Ok(config)
    }

    /// Stop at `deadline`
    pub fn deadline(mut self, deadline: Timestamp) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stop after `limit` invocations
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Name the spawned thread
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reject a zero period
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period.is_zero() {
            return Err(ConfigError::Invalid(
                "scheduler period must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
