//! Capacity limits for the admission controller.
//!
//! Limits arrive as signed integers straight from configuration. Anything
//! non-positive is replaced by a default; every replacement is logged and
//! returned so callers can see what was applied.

use std::fmt;

use serde::Serialize;

use crate::config::AdmissionConfig;

pub const DEFAULT_MAX_RUNNING: usize = 100;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 100;
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Validated, immutable admission limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacityConfig {
    max_running: usize,
    max_in_flight: usize,
    retry_after_secs: u64,
}

/// Which limit a [`LimitSubstitution`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    MaxRunning,
    MaxInFlight,
    RetryAfter,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Limit::MaxRunning => "max_running",
            Limit::MaxInFlight => "max_in_flight",
            Limit::RetryAfter => "retry_after_secs",
        })
    }
}

/// A supplied limit that was replaced during construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitSubstitution {
    pub limit: Limit,
    pub supplied: i64,
    pub applied: u64,
}

impl CapacityConfig {
    /// Build limits, replacing invalid values with defaults and logging each
    /// replacement as a warning.
    pub fn new(max_running: i64, max_in_flight: i64, retry_after_secs: i64) -> Self {
        let (limits, substitutions) = Self::normalize(max_running, max_in_flight, retry_after_secs);
        for s in &substitutions {
            tracing::warn!(
                limit = %s.limit,
                supplied = s.supplied,
                applied = s.applied,
                "Invalid admission limit replaced"
            );
        }
        limits
    }

    /// Like [`CapacityConfig::new`] but returns the replacements instead of
    /// logging them.
    ///
    /// `max_in_flight` is raised to `max_running` when it is smaller.
    pub fn normalize(
        max_running: i64,
        max_in_flight: i64,
        retry_after_secs: i64,
    ) -> (Self, Vec<LimitSubstitution>) {
        let mut substitutions = Vec::new();

        let max_running = positive_or(
            max_running,
            DEFAULT_MAX_RUNNING as u64,
            Limit::MaxRunning,
            &mut substitutions,
        );
        let mut max_in_flight = positive_or(
            max_in_flight,
            DEFAULT_MAX_IN_FLIGHT as u64,
            Limit::MaxInFlight,
            &mut substitutions,
        );
        let retry_after_secs = positive_or(
            retry_after_secs,
            DEFAULT_RETRY_AFTER_SECS,
            Limit::RetryAfter,
            &mut substitutions,
        );

        if max_in_flight < max_running {
            substitutions.push(LimitSubstitution {
                limit: Limit::MaxInFlight,
                supplied: i64::try_from(max_in_flight).unwrap_or(i64::MAX),
                applied: max_running,
            });
            max_in_flight = max_running;
        }

        let limits = Self {
            max_running: to_usize(max_running),
            max_in_flight: to_usize(max_in_flight),
            retry_after_secs,
        };
        (limits, substitutions)
    }

    pub fn max_running(&self) -> usize {
        self.max_running
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_secs
    }
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            max_running: DEFAULT_MAX_RUNNING,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
        }
    }
}

impl From<&AdmissionConfig> for CapacityConfig {
    fn from(config: &AdmissionConfig) -> Self {
        Self::new(config.max_running, config.max_in_flight, config.retry_after_secs)
    }
}

fn positive_or(
    supplied: i64,
    default: u64,
    limit: Limit,
    substitutions: &mut Vec<LimitSubstitution>,
) -> u64 {
    match u64::try_from(supplied) {
        Ok(value) if value > 0 => value,
        _ => {
            substitutions.push(LimitSubstitution {
                limit,
                supplied,
                applied: default,
            });
            default
        }
    }
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_limits_pass_through() {
        let (limits, substitutions) = CapacityConfig::normalize(4, 16, 3);
        assert!(substitutions.is_empty());
        assert_eq!(limits.max_running(), 4);
        assert_eq!(limits.max_in_flight(), 16);
        assert_eq!(limits.retry_after_secs(), 3);
    }

    #[test]
    fn non_positive_limits_fall_back_to_defaults() {
        let (limits, substitutions) = CapacityConfig::normalize(0, -5, 0);
        assert_eq!(limits, CapacityConfig::default());
        assert_eq!(
            substitutions,
            vec![
                LimitSubstitution { limit: Limit::MaxRunning, supplied: 0, applied: 100 },
                LimitSubstitution { limit: Limit::MaxInFlight, supplied: -5, applied: 100 },
                LimitSubstitution { limit: Limit::RetryAfter, supplied: 0, applied: 1 },
            ]
        );
    }

    #[test]
    fn in_flight_raised_to_running() {
        let (limits, substitutions) = CapacityConfig::normalize(10, 2, 1);
        assert_eq!(limits.max_in_flight(), 10);
        assert_eq!(
            substitutions,
            vec![LimitSubstitution { limit: Limit::MaxInFlight, supplied: 2, applied: 10 }]
        );
    }

    #[test]
    fn defaulted_running_can_lift_in_flight() {
        let (limits, substitutions) = CapacityConfig::normalize(-1, 20, 1);
        assert_eq!(limits.max_running(), 100);
        assert_eq!(limits.max_in_flight(), 100);
        assert_eq!(substitutions.len(), 2);
    }

    #[test]
    fn new_always_succeeds() {
        let limits = CapacityConfig::new(0, 0, 0);
        assert_eq!(limits, CapacityConfig::default());
    }
}
