//! Clock-skew tolerance for token expiry checks.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Default tolerance: 5 minutes.
pub const DEFAULT_SKEW: Duration = Duration::from_secs(5 * 60);

/// Whether a token expiring at `expires_at` must be treated as expired at
/// `now`, given a tolerance of `skew`.
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>, skew: TimeDelta) -> bool {
    now.checked_add_signed(skew)
        .is_none_or(|deadline| deadline >= expires_at)
}

/// Configured tolerance window applied to every expiry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSkewPolicy {
    skew: TimeDelta,
}

impl ClockSkewPolicy {
    pub fn new(skew: Duration) -> Self {
        Self {
            skew: TimeDelta::from_std(skew).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn skew(&self) -> TimeDelta {
        self.skew
    }

    pub fn is_expired(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        is_expired(expires_at, now, self.skew)
    }
}

impl Default for ClockSkewPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SKEW)
    }
}
