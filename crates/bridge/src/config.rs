//! Bridge configuration: service connection plus job polling policy.

use std::time::Duration;

use geoengine_client::config::{env_opt, env_or, ClientConfig, ConfigError};

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default upper bound on the delay between polls when backing off.
pub const DEFAULT_POLL_MAX_DELAY_SECS: u64 = 60;

/// Default number of polls spent confirming a cancellation.
pub const DEFAULT_CANCEL_CONFIRM_POLLS: u32 = 3;

/// Tunable parameters for the job polling loop.
///
/// The defaults poll every 5 seconds, forever, and never give up on
/// transient service errors.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay between polls while the service answers normally.
    pub interval: Duration,
    /// Consecutive transient failures tolerated before the job is
    /// abandoned. `None` retries forever.
    pub max_transient_failures: Option<u32>,
    /// Factor applied to the delay after each consecutive transient
    /// failure. `1.0` keeps the interval fixed.
    pub backoff: f64,
    /// Upper bound on the backed-off delay.
    pub max_delay: Duration,
    /// Polls spent waiting for the service to confirm a cancellation
    /// before the job is reported cancelled locally. At least one poll
    /// always follows a cancellation request.
    pub cancel_confirm_polls: u32,
    /// Wall-clock bound on how long a submitted job is polled. `None`
    /// waits forever.
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_transient_failures: None,
            backoff: 1.0,
            max_delay: Duration::from_secs(DEFAULT_POLL_MAX_DELAY_SECS),
            cancel_confirm_polls: DEFAULT_CANCEL_CONFIRM_POLLS,
            timeout: None,
        }
    }
}

impl PollPolicy {
    /// A fixed-interval policy, mostly useful in tests.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Calculate the delay after another transient failure.
    ///
    /// The result is clamped to [`PollPolicy::max_delay`], and never
    /// drops below the base interval.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next_ms = (current.as_millis() as f64 * self.backoff) as u64;
        Duration::from_millis(next_ms)
            .min(self.max_delay)
            .max(self.interval.min(self.max_delay))
    }

    /// Whether `consecutive` transient failures exceed the allowed bound.
    pub fn exhausted(&self, consecutive: u32) -> bool {
        self.max_transient_failures
            .is_some_and(|max| consecutive > max)
    }

    /// Load the polling policy from environment variables with defaults.
    ///
    /// | Env Var                            | Default     |
    /// |------------------------------------|-------------|
    /// | `GEOENGINE_POLL_INTERVAL_SECS`     | `5`         |
    /// | `GEOENGINE_MAX_TRANSIENT_FAILURES` | unbounded   |
    /// | `GEOENGINE_POLL_BACKOFF`           | `1.0`       |
    /// | `GEOENGINE_POLL_MAX_DELAY_SECS`    | `60`        |
    /// | `GEOENGINE_CANCEL_CONFIRM_POLLS`   | `3`         |
    /// | `GEOENGINE_JOB_TIMEOUT_SECS`       | unbounded   |
    pub fn from_env() -> Result<Self, ConfigError> {
        let interval_secs = env_or("GEOENGINE_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let max_transient_failures = env_opt("GEOENGINE_MAX_TRANSIENT_FAILURES")?;
        let backoff: f64 = env_or("GEOENGINE_POLL_BACKOFF", 1.0)?;
        let max_delay_secs = env_or("GEOENGINE_POLL_MAX_DELAY_SECS", DEFAULT_POLL_MAX_DELAY_SECS)?;
        let cancel_confirm_polls =
            env_or("GEOENGINE_CANCEL_CONFIRM_POLLS", DEFAULT_CANCEL_CONFIRM_POLLS)?;
        let timeout_secs: Option<u64> = env_opt("GEOENGINE_JOB_TIMEOUT_SECS")?;

        let policy = Self {
            interval: Duration::from_secs(interval_secs),
            max_transient_failures,
            backoff,
            max_delay: Duration::from_secs(max_delay_secs),
            cancel_confirm_polls,
            timeout: timeout_secs.map(Duration::from_secs),
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Reject settings that would poll in a hot loop or skip steps of
    /// the lifecycle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(invalid(
                "GEOENGINE_POLL_INTERVAL_SECS",
                self.interval.as_secs(),
                "must be at least 1",
            ));
        }
        if !self.backoff.is_finite() || self.backoff < 1.0 {
            return Err(invalid(
                "GEOENGINE_POLL_BACKOFF",
                self.backoff,
                "must be a finite number >= 1.0",
            ));
        }
        if self.max_delay < self.interval {
            return Err(invalid(
                "GEOENGINE_POLL_MAX_DELAY_SECS",
                self.max_delay.as_secs(),
                "must not be below the poll interval",
            ));
        }
        if self.cancel_confirm_polls == 0 {
            return Err(invalid(
                "GEOENGINE_CANCEL_CONFIRM_POLLS",
                self.cancel_confirm_polls,
                "must be at least 1",
            ));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(invalid("GEOENGINE_JOB_TIMEOUT_SECS", 0, "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(var: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BridgeConfig {
    pub client: ClientConfig,
    pub poll: PollPolicy,
}

impl BridgeConfig {
    /// Load both halves of the configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client: ClientConfig::from_env()?,
            poll: PollPolicy::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_fixed_and_unbounded() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.next_delay(policy.interval), policy.interval);
        assert!(!policy.exhausted(u32::MAX));
    }

    #[test]
    fn next_delay_grows_and_clamps() {
        let policy = PollPolicy {
            backoff: 2.0,
            max_delay: Duration::from_secs(12),
            ..PollPolicy::default()
        };
        let mut delay = policy.interval;
        let expected = [10, 12, 12];
        for &secs in &expected {
            delay = policy.next_delay(delay);
            assert_eq!(delay.as_secs(), secs);
        }
    }

    #[test]
    fn exhausted_respects_bound() {
        let policy = PollPolicy {
            max_transient_failures: Some(2),
            ..PollPolicy::default()
        };
        assert!(!policy.exhausted(2));
        assert!(policy.exhausted(3));
    }

    #[test]
    fn default_policy_is_valid() {
        assert!(PollPolicy::default().validate().is_ok());
    }

    #[test]
    fn zero_cancel_confirm_polls_is_rejected() {
        let policy = PollPolicy {
            cancel_confirm_polls: 0,
            ..PollPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(ConfigError::Invalid { var: "GEOENGINE_CANCEL_CONFIRM_POLLS", .. })
        ));
    }

    #[test]
    fn max_delay_below_interval_is_rejected() {
        let policy = PollPolicy {
            backoff: 2.0,
            max_delay: Duration::ZERO,
            ..PollPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(ConfigError::Invalid { var: "GEOENGINE_POLL_MAX_DELAY_SECS", .. })
        ));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let policy = PollPolicy {
            timeout: Some(Duration::ZERO),
            ..PollPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn with_interval_keeps_other_defaults() {
        let policy = PollPolicy::with_interval(Duration::from_millis(10));
        assert_eq!(policy.interval, Duration::from_millis(10));
        assert_eq!(policy.cancel_confirm_polls, DEFAULT_CANCEL_CONFIRM_POLLS);
    }
}
