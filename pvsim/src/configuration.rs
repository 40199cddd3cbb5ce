use std::{fs, path::Path};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{SimError, SimResult},
    trace::OperatingPoint,
};

/// Configuration struct controlling a simulation run. Limits of zero or
/// less are disabled.
#[derive(Debug, Default, Clone, Copy, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// the number of cycles a run may take
    #[builder(default)]
    pub cycle_limit: i64,
    /// the number of consecutive cycles without pending modules tolerated
    /// before the run stops
    #[builder(default)]
    pub idle_limit: i64,
    /// the number of propagation passes allowed within one cycle
    #[builder(default)]
    pub iteration_limit: i64,
    /// keep the cycle counter of the previous run instead of starting a
    /// fresh run
    #[builder(default)]
    pub continue_clock_sequence: bool,
    /// clock frequency and tick length used for tracing
    #[builder(default)]
    pub operating_point: OperatingPoint,
    #[builder(default)]
    pub logging: LoggingConfig,
}

impl SimConfig {
    /// Loads a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            SimError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        let freq = self.operating_point.frequency_hz;
        if !(freq.is_finite() && freq > 0.0) {
            return Err(SimError::Config(format!(
                "clock frequency must be positive, got {freq}"
            )));
        }
        Ok(())
    }

    pub fn get_logging_config(&self) -> LoggingConfig {
        self.logging
    }
}

/// Configuration struct describing what settings a logger should be created
/// with.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether or not to silence non-error messages. Will be overridden by
    /// `debug_logging` if set to true.
    pub quiet: bool,
    /// Whether or not to enable debug logging. If set to true, will override
    /// `quiet`.
    pub debug_logging: bool,
}

/// Turns a configured limit into `Some(limit)` if it is enabled.
pub(crate) fn enabled_limit(limit: i64) -> Option<u64> {
    u64::try_from(limit).ok().filter(|l| *l > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits() {
        assert_eq!(enabled_limit(-1), None);
        assert_eq!(enabled_limit(0), None);
        assert_eq!(enabled_limit(5), Some(5));
    }

    #[test]
    fn json_fields_are_optional() {
        let config: SimConfig =
            serde_json::from_str(r#"{ "cycle_limit": 12, "logging": { "quiet": true } }"#)
                .unwrap();
        assert_eq!(config.cycle_limit, 12);
        assert_eq!(config.iteration_limit, 0);
        assert!(config.logging.quiet && !config.logging.debug_logging);
        assert_eq!(config.operating_point.ticks_per_clock(), 10);
    }

    #[test]
    fn builder_defaults() {
        let config = SimConfig::builder().iteration_limit(5).build();
        assert_eq!(config.iteration_limit, 5);
        assert_eq!(config.cycle_limit, 0);
        assert!(!config.continue_clock_sequence);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_frequency() {
        let mut config = SimConfig::default();
        config.operating_point.frequency_hz = 0.0;
        assert!(matches!(config.validate(), Err(SimError::Config(_))));
    }
}
