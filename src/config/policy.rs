use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::FixedBackoff;

/// Attempts made to submit a creation request before giving up
pub const DEFAULT_CREATE_ATTEMPTS: u32 = 3;

/// Delay between creation attempts in seconds
pub const DEFAULT_CREATE_RETRY_INTERVAL_SECS: u64 = 5;

/// Status polls made before declaring a timeout
pub const DEFAULT_POLL_ATTEMPTS: u32 = 200;

/// Delay between status polls in seconds (200 polls x 5 minutes is roughly 16.6 hours)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Per-request timeout for the HTTP client in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Retry and polling behaviour for one provisioning run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionPolicy {
    pub create: FixedBackoff,
    pub poll: FixedBackoff,
    /// Reject token renewals that do not come back with HTTP 200
    pub strict_renewal: bool,
    pub request_timeout: Duration,
}

impl Default for ProvisionPolicy {
    fn default() -> Self {
        PolicySettings::default().into_policy()
    }
}

/// On-disk form of [`ProvisionPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PolicySettings {
    pub create_attempts: u32,
    pub create_retry_interval_secs: u64,
    pub poll_attempts: u32,
    pub poll_interval_secs: u64,
    pub strict_renewal: bool,
    pub request_timeout_secs: u64,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            create_attempts: DEFAULT_CREATE_ATTEMPTS,
            create_retry_interval_secs: DEFAULT_CREATE_RETRY_INTERVAL_SECS,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            strict_renewal: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl PolicySettings {
    pub fn into_policy(self) -> ProvisionPolicy {
        ProvisionPolicy {
            create: FixedBackoff::new(
                self.create_attempts,
                Duration::from_secs(self.create_retry_interval_secs),
            ),
            poll: FixedBackoff::new(
                self.poll_attempts,
                Duration::from_secs(self.poll_interval_secs),
            ),
            strict_renewal: self.strict_renewal,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Returns the name of the first invalid field, if any.
    pub fn invalid_field(&self) -> Option<&'static str> {
        if self.create_attempts == 0 {
            Some("create-attempts")
        } else if self.poll_attempts == 0 {
            Some("poll-attempts")
        } else if self.request_timeout_secs == 0 {
            Some("request-timeout-secs")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_provisioning_budget() {
        let policy = ProvisionPolicy::default();
        assert_eq!(policy.create.max_attempts, 3);
        assert_eq!(policy.create.interval, Duration::from_secs(5));
        assert_eq!(policy.poll.max_attempts, 200);
        assert_eq!(policy.poll.interval, Duration::from_secs(300));
        assert!(!policy.strict_renewal);
    }

    #[test]
    fn test_poll_budget_is_about_sixteen_hours() {
        let budget = ProvisionPolicy::default().poll.total_wait();
        assert_eq!(budget, Duration::from_secs(199 * 300));
        assert!(budget > Duration::from_secs(16 * 3600));
    }

    #[test]
    fn test_invalid_field() {
        let settings = PolicySettings {
            poll_attempts: 0,
            ..Default::default()
        };
        assert_eq!(settings.invalid_field(), Some("poll-attempts"));
        assert_eq!(PolicySettings::default().invalid_field(), None);
    }
}
