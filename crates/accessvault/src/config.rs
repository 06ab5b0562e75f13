//! Controller and sweeper configuration.

use std::time::Duration;

use accessvault_core::{ValidationError, MILLIS_PER_SEC};
use serde::{Deserialize, Serialize};

const SECS_PER_DAY: u64 = 86_400;

/// What `extend_access` does with a grant whose expiry has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiredExtensionPolicy {
    /// Extend from the current time, making the grant active again.
    #[default]
    Reactivate,
    /// Refuse with `AccessDenied { reason: Expired }`.
    Reject,
}

/// Configuration for the access controller.
///
/// The master key is deliberately absent: it is injected separately and
/// never deserialized from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// How long past expiry a grant is kept before the sweeper deletes it.
    pub sweep_grace_secs: u64,
    /// Period of a spawned sweeper.
    pub sweep_interval_secs: u64,
    /// Behavior of `extend_access` on expired grants.
    pub expired_extension: ExpiredExtensionPolicy,
    /// Upper bound on a purchased duration.
    pub max_grant_duration_secs: u64,
    /// Upper bound on a single extension.
    pub max_extension_secs: u64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            sweep_grace_secs: 60 * SECS_PER_DAY,
            sweep_interval_secs: 3_600,
            expired_extension: ExpiredExtensionPolicy::Reactivate,
            max_grant_duration_secs: 10 * 365 * SECS_PER_DAY,
            max_extension_secs: 10 * 365 * SECS_PER_DAY,
        }
    }
}

impl AccessConfig {
    /// Check the values are usable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::ZeroDuration {
                field: "sweep_interval_secs",
            });
        }
        if self.max_grant_duration_secs == 0 {
            return Err(ValidationError::ZeroDuration {
                field: "max_grant_duration_secs",
            });
        }
        if self.max_extension_secs == 0 {
            return Err(ValidationError::ZeroDuration {
                field: "max_extension_secs",
            });
        }
        Ok(())
    }

    /// Sweep grace period in milliseconds, saturating.
    pub fn sweep_grace_millis(&self) -> i64 {
        i64::try_from(self.sweep_grace_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(MILLIS_PER_SEC)
    }

    /// Sweep grace period.
    pub fn sweep_grace(&self) -> Duration {
        Duration::from_secs(self.sweep_grace_secs)
    }

    /// Sweeper period.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Whether expired grants may be extended.
    pub fn allows_expired_extension(&self) -> bool {
        self.expired_extension == ExpiredExtensionPolicy::Reactivate
    }
}
