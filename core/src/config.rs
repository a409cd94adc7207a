//! Campaign and orchestrator configuration types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default per-trial timeout
pub const DEFAULT_TRIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of consecutive trial errors tolerated before a campaign fails
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Default capacity of the per-campaign trial record buffer
pub const DEFAULT_RECORD_BUFFER: usize = 64;

/// Trial rate, given either as a frequency or as the spacing between trials
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialRate {
    /// Trials per second
    PerSecond(f64),

    /// Minimum delay between the start of consecutive trials
    Interval(Duration),
}

impl TrialRate {
    /// Minimum spacing between trials implied by this rate
    pub fn interval(&self) -> Duration {
        match *self {
            TrialRate::PerSecond(rps) => {
                Duration::try_from_secs_f64(1.0 / rps).unwrap_or(Duration::MAX)
            }
            TrialRate::Interval(d) => d,
        }
    }

    /// Rate expressed in trials per second
    pub fn per_second(&self) -> f64 {
        match *self {
            TrialRate::PerSecond(rps) => rps,
            TrialRate::Interval(d) => {
                let secs = d.as_secs_f64();
                if secs > 0.0 {
                    1.0 / secs
                } else {
                    f64::INFINITY
                }
            }
        }
    }
}

/// Termination bounds for a campaign. Whichever bound fires first wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignBounds {
    /// Maximum number of trials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u64>,

    /// Maximum wall-clock duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<Duration>,

    /// No bound required; the orchestrator applies its own ceiling
    #[serde(default)]
    pub unbounded: bool,
}

impl CampaignBounds {
    /// Bound by trial count only
    pub fn attempts(n: u64) -> Self {
        Self {
            max_attempts: Some(n),
            ..Default::default()
        }
    }

    /// Bound by duration only
    pub fn duration(d: Duration) -> Self {
        Self {
            max_duration: Some(d),
            ..Default::default()
        }
    }

    /// Explicitly unbounded
    pub fn unbounded() -> Self {
        Self {
            unbounded: true,
            ..Default::default()
        }
    }

    /// Add a trial count bound
    pub fn with_max_attempts(mut self, n: u64) -> Self {
        self.max_attempts = Some(n);
        self
    }

    /// Add a duration bound
    pub fn with_max_duration(mut self, d: Duration) -> Self {
        self.max_duration = Some(d);
        self
    }

    /// Estimated total attempts: the explicit count, duration × rate, or the
    /// smaller of the two. `None` when neither bound is set.
    pub fn estimated_max_attempts(&self, rate: &TrialRate) -> Option<u64> {
        let by_duration = self.max_duration.map(|d| {
            let estimate = (d.as_secs_f64() * rate.per_second()).round();
            if estimate.is_finite() {
                (estimate as u64).max(1)
            } else {
                u64::MAX
            }
        });

        match (self.max_attempts, by_duration) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Campaign configuration
///
/// Validated once, before the campaign is created, and never mutated after.
/// Tool-specific extras go in `params`; the engine does not read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Trial rate
    pub rate: TrialRate,

    /// Termination bounds
    pub bounds: CampaignBounds,

    /// Outcome model identifier
    #[serde(default)]
    pub outcome_model: String,

    /// First `Success` outcome ends the campaign (cracking semantics)
    #[serde(default)]
    pub success_terminal: bool,

    /// Uniform jitter added to each rate delay, as a fraction of the interval
    #[serde(default)]
    pub jitter: f64,

    /// Upper bound on a single outcome model call
    #[serde(default = "default_trial_timeout")]
    pub trial_timeout: Duration,

    /// Consecutive `Error` outcomes tolerated; one more fails the campaign
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    /// Overall error rate (0.0 - 1.0) above which the campaign fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_error_rate: Option<f64>,

    /// Attempts required before `max_error_rate` is evaluated
    #[serde(default = "default_error_rate_min_samples")]
    pub error_rate_min_samples: u64,

    /// Number of recent trial records retained
    #[serde(default = "default_record_buffer")]
    pub record_buffer: usize,

    /// Tool-specific parameters, opaque to the engine
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, serde_json::Value>,
}

fn default_trial_timeout() -> Duration {
    DEFAULT_TRIAL_TIMEOUT
}

fn default_max_consecutive_errors() -> u32 {
    DEFAULT_MAX_CONSECUTIVE_ERRORS
}

fn default_error_rate_min_samples() -> u64 {
    10
}

fn default_record_buffer() -> usize {
    DEFAULT_RECORD_BUFFER
}

impl CampaignConfig {
    /// Create a new config with the given rate and bounds
    pub fn new(rate: TrialRate, bounds: CampaignBounds) -> Self {
        Self {
            rate,
            bounds,
            outcome_model: String::new(),
            success_terminal: false,
            jitter: 0.0,
            trial_timeout: DEFAULT_TRIAL_TIMEOUT,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            max_error_rate: None,
            error_rate_min_samples: default_error_rate_min_samples(),
            record_buffer: DEFAULT_RECORD_BUFFER,
            params: BTreeMap::new(),
        }
    }

    /// Set the outcome model identifier
    pub fn with_outcome_model(mut self, model: impl Into<String>) -> Self {
        self.outcome_model = model.into();
        self
    }

    /// Treat the first success as terminal
    pub fn with_success_terminal(mut self, terminal: bool) -> Self {
        self.success_terminal = terminal;
        self
    }

    /// Set the rate jitter fraction
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the per-trial timeout
    pub fn with_trial_timeout(mut self, timeout: Duration) -> Self {
        self.trial_timeout = timeout;
        self
    }

    /// Set the consecutive error threshold
    pub fn with_max_consecutive_errors(mut self, n: u32) -> Self {
        self.max_consecutive_errors = n;
        self
    }

    /// Set the overall error rate threshold
    pub fn with_max_error_rate(mut self, rate: f64) -> Self {
        self.max_error_rate = Some(rate);
        self
    }

    /// Set the trial record buffer capacity
    pub fn with_record_buffer(mut self, capacity: usize) -> Self {
        self.record_buffer = capacity;
        self
    }

    /// Add a tool-specific parameter
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Look up a tool-specific parameter
    pub fn param(&self, key: &str) -> Option<&serde_json::Value> {
        self.params.get(key)
    }

    /// Estimated total attempts for progress reporting
    pub fn estimated_max_attempts(&self) -> Option<u64> {
        self.bounds.estimated_max_attempts(&self.rate)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.rate {
            TrialRate::PerSecond(rps) if !(rps.is_finite() && rps > 0.0) => {
                return Err(ConfigError::InvalidRate(format!(
                    "rate must be a positive number of trials per second, got {rps}"
                )));
            }
            TrialRate::Interval(d) if d.is_zero() => {
                return Err(ConfigError::InvalidRate(
                    "trial interval must be non-zero".into(),
                ));
            }
            _ => {}
        }

        let bounds = &self.bounds;
        if !bounds.unbounded && bounds.max_attempts.is_none() && bounds.max_duration.is_none() {
            return Err(ConfigError::InvalidBounds(
                "either max_attempts or max_duration is required unless unbounded".into(),
            ));
        }
        if bounds.max_attempts == Some(0) {
            return Err(ConfigError::InvalidBounds(
                "max_attempts must be at least 1".into(),
            ));
        }
        if bounds.max_duration.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::InvalidBounds(
                "max_duration must be non-zero".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::InvalidParameter(format!(
                "jitter must be within 0.0..=1.0, got {}",
                self.jitter
            )));
        }
        if self.trial_timeout.is_zero() {
            return Err(ConfigError::InvalidParameter(
                "trial_timeout must be non-zero".into(),
            ));
        }
        if self.max_consecutive_errors == 0 {
            return Err(ConfigError::InvalidParameter(
                "max_consecutive_errors must be at least 1".into(),
            ));
        }
        if let Some(rate) = self.max_error_rate {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(ConfigError::InvalidParameter(format!(
                    "max_error_rate must be within (0.0, 1.0], got {rate}"
                )));
            }
        }
        if self.record_buffer == 0 {
            return Err(ConfigError::InvalidParameter(
                "record_buffer must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum number of concurrently active campaigns
    pub max_concurrent: usize,

    /// History log capacity
    pub history_capacity: usize,

    /// Initial value of the terms-accepted policy flag
    pub terms_accepted: bool,

    /// Duration ceiling applied to campaigns configured as unbounded
    pub unbounded_ceiling_secs: u64,

    /// Queue size for channel-backed progress sinks
    pub progress_buffer: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            history_capacity: crate::history::DEFAULT_HISTORY_CAPACITY,
            terms_accepted: false,
            unbounded_ceiling_secs: 3600,
            progress_buffer: crate::progress::DEFAULT_PROGRESS_BUFFER,
        }
    }
}

impl OrchestratorConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the concurrency ceiling
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set the history capacity
    pub fn with_history_capacity(mut self, n: usize) -> Self {
        self.history_capacity = n;
        self
    }

    /// Set the initial terms-accepted flag
    pub fn with_terms_accepted(mut self, accepted: bool) -> Self {
        self.terms_accepted = accepted;
        self
    }

    /// Ceiling for unbounded campaigns
    pub fn unbounded_ceiling(&self) -> Duration {
        Duration::from_secs(self.unbounded_ceiling_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::InvalidParameter(
                "max_concurrent must be at least 1".into(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::InvalidParameter(
                "history_capacity must be at least 1".into(),
            ));
        }
        if self.unbounded_ceiling_secs == 0 {
            return Err(ConfigError::InvalidParameter(
                "unbounded_ceiling_secs must be at least 1".into(),
            ));
        }
        if self.progress_buffer == 0 {
            return Err(ConfigError::InvalidParameter(
                "progress_buffer must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid trial rate
    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    /// Invalid termination bounds
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    /// Any other out-of-range parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Config file could not be read
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("Cannot parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}
