//! Configuration for resolver components

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Environment variable that enables per-step resolution traces
pub const DEBUG_ENV_VAR: &str = "GRAPHLOCK_DEBUG";

/// Configuration consumed by the default resolver UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Seconds of wall time to observe before locking in the progress
    /// iteration rate
    pub progress_rate_secs: f64,

    /// Emit per-step resolution traces
    pub debug: bool,
}

impl ResolverConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the process environment.
    ///
    /// Setting [`DEBUG_ENV_VAR`] to any non-empty value enables per-step
    /// traces.
    pub fn from_env() -> Self {
        let debug = env::var(DEBUG_ENV_VAR)
            .map(|value| !value.is_empty())
            .unwrap_or(false);
        Self {
            debug,
            ..Self::default()
        }
    }

    /// The progress interval as a [`Duration`]
    pub fn progress_rate(&self) -> Duration {
        Duration::from_secs_f64(self.progress_rate_secs.max(0.0))
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            progress_rate_secs: 0.33,
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.progress_rate_secs, 0.33);
        assert!(!config.debug);
    }

    #[test]
    fn test_progress_rate_duration() {
        let config = ResolverConfig {
            progress_rate_secs: 2.0,
            debug: false,
        };
        assert_eq!(config.progress_rate(), Duration::from_secs(2));
    }

    #[test]
    fn test_negative_progress_rate_clamps_to_zero() {
        let config = ResolverConfig {
            progress_rate_secs: -1.0,
            debug: false,
        };
        assert_eq!(config.progress_rate(), Duration::ZERO);
    }

    #[test]
    fn test_from_env_reads_debug_toggle() {
        env::remove_var(DEBUG_ENV_VAR);
        assert!(!ResolverConfig::from_env().debug);

        env::set_var(DEBUG_ENV_VAR, "1");
        assert!(ResolverConfig::from_env().debug);
        env::remove_var(DEBUG_ENV_VAR);
    }
}
