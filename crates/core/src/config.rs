//! Sampler configuration
//!
//! Configuration is supplied by the embedding agent. It can be built in code
//! with the builder-style setters or parsed from TOML:
//!
//! ```
//! use tracewarden_core::SamplerConfig;
//!
//! let config = SamplerConfig::from_toml_str(r#"
//!     sampling_rate = 5
//!     trace_threshold_secs = 1.0
//!     diagnostic_mode = true
//! "#).unwrap();
//! assert_eq!(config.sampling_rate, 5);
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default cap on extra data (SQL text, cache keys) per segment
pub const DEFAULT_MAX_EXTRA_DATA_LEN: usize = 16384;

/// How SQL text attached to segments is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSql {
    /// SQL is not recorded at all
    Off,
    /// SQL is recorded verbatim
    Raw,
    /// SQL is recorded, literals are replaced with `?` before harvest
    #[default]
    Obfuscated,
}

/// Configuration for trace building and sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Master switch for trace collection
    pub tracing_enabled: bool,
    /// Keep the most recent traces in a ring buffer and capture backtraces
    pub diagnostic_mode: bool,
    /// Emit the random sample once every `sampling_rate` harvests; 0 disables
    pub sampling_rate: u32,
    /// Traces shorter than this never occupy the slowest slot
    pub trace_threshold_secs: f64,
    /// Maximum segments a trace may carry
    pub max_segments_per_trace: usize,
    /// Queries at least this slow get a backtrace in diagnostic mode
    pub stack_trace_threshold_secs: f64,
    /// Maximum length of extra data on a single segment
    pub max_extra_data_len: usize,
    /// SQL recording mode
    pub record_sql: RecordSql,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            tracing_enabled: true,
            diagnostic_mode: false,
            sampling_rate: 10,
            trace_threshold_secs: 2.0,
            max_segments_per_trace: 2000,
            stack_trace_threshold_secs: 0.5,
            max_extra_data_len: DEFAULT_MAX_EXTRA_DATA_LEN,
            record_sql: RecordSql::default(),
        }
    }
}

impl SamplerConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    ///
    /// Missing keys take their default values.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: SamplerConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.trace_threshold_secs.is_finite() || self.trace_threshold_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "trace_threshold_secs must be a non-negative number, got {}",
                self.trace_threshold_secs
            )));
        }
        if !self.stack_trace_threshold_secs.is_finite() || self.stack_trace_threshold_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "stack_trace_threshold_secs must be a non-negative number, got {}",
                self.stack_trace_threshold_secs
            )));
        }
        if self.max_segments_per_trace == 0 {
            return Err(ConfigError::Invalid(
                "max_segments_per_trace must be at least 1".to_string(),
            ));
        }
        if self.max_extra_data_len == 0 {
            return Err(ConfigError::Invalid(
                "max_extra_data_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Slow-trace threshold as a [`Duration`]
    pub fn trace_threshold(&self) -> Duration {
        Duration::try_from_secs_f64(self.trace_threshold_secs).unwrap_or(Duration::ZERO)
    }

    /// Backtrace threshold as a [`Duration`]
    pub fn stack_trace_threshold(&self) -> Duration {
        Duration::try_from_secs_f64(self.stack_trace_threshold_secs).unwrap_or(Duration::ZERO)
    }

    /// Enable or disable trace collection
    pub fn tracing_enabled(mut self, enabled: bool) -> Self {
        self.tracing_enabled = enabled;
        self
    }

    /// Enable or disable diagnostic mode
    pub fn diagnostic_mode(mut self, enabled: bool) -> Self {
        self.diagnostic_mode = enabled;
        self
    }

    /// Set the random sampling cadence
    pub fn sampling_rate(mut self, rate: u32) -> Self {
        self.sampling_rate = rate;
        self
    }

    /// Set the slow-trace threshold
    pub fn trace_threshold_secs(mut self, secs: f64) -> Self {
        self.trace_threshold_secs = secs;
        self
    }

    /// Set the per-trace segment cap
    pub fn max_segments_per_trace(mut self, max: usize) -> Self {
        self.max_segments_per_trace = max;
        self
    }

    /// Set the backtrace threshold
    pub fn stack_trace_threshold_secs(mut self, secs: f64) -> Self {
        self.stack_trace_threshold_secs = secs;
        self
    }

    /// Set the per-segment extra data cap
    pub fn max_extra_data_len(mut self, len: usize) -> Self {
        self.max_extra_data_len = len;
        self
    }

    /// Set the SQL recording mode
    pub fn record_sql(mut self, mode: RecordSql) -> Self {
        self.record_sql = mode;
        self
    }
}
