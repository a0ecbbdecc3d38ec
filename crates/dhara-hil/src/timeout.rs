//! Deadline computation for a wait round.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dhara_config::ApprovalSection;
use tracing::warn;

/// Bounds used when deriving a wait deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// Used when neither an explicit timeout nor an expiry is known.
    pub default: Duration,
    /// Floor for an expiry-derived timeout.
    pub minimum: Duration,
    /// Added to an expiry-derived timeout to tolerate clock skew.
    pub skew_margin: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(600),
            minimum: Duration::from_secs(10),
            skew_margin: Duration::from_secs(5),
        }
    }
}

impl TimeoutPolicy {
    /// Build from the `[approval]` config section.
    #[must_use]
    pub fn from_config(section: &ApprovalSection) -> Self {
        Self {
            default: Duration::from_secs(section.default_timeout_secs),
            minimum: Duration::from_secs(section.min_timeout_secs),
            skew_margin: Duration::from_secs(section.clock_skew_margin_secs),
        }
    }
}

/// Pick the timeout for one wait round.
///
/// An explicit timeout always wins. Otherwise the time remaining until
/// `expires_at` plus the skew margin is used, never less than the policy
/// minimum. An absent or unparseable `expires_at` yields the policy default.
#[must_use]
pub fn effective_timeout(
    explicit: Option<Duration>,
    expires_at: Option<&str>,
    now: DateTime<Utc>,
    policy: &TimeoutPolicy,
) -> Duration {
    if let Some(timeout) = explicit {
        return timeout;
    }
    let Some(raw) = expires_at.filter(|s| !s.is_empty()) else {
        return policy.default;
    };
    let expiry = match DateTime::parse_from_rfc3339(raw) {
        Ok(expiry) => expiry.with_timezone(&Utc),
        Err(e) => {
            warn!(expires_at = raw, error = %e, "unparseable expires_at, using default timeout");
            return policy.default;
        },
    };

    // whole seconds, truncated toward zero
    let remaining = expiry.signed_duration_since(now).num_seconds();
    let margin = i64::try_from(policy.skew_margin.as_secs()).unwrap_or(i64::MAX);
    let derived = remaining.saturating_add(margin);
    let floor = policy.minimum.as_secs();
    Duration::from_secs(u64::try_from(derived).unwrap_or(0).max(floor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 22, 15, 0, 0).unwrap()
    }

    fn policy() -> TimeoutPolicy {
        TimeoutPolicy::default()
    }

    #[test]
    fn explicit_timeout_wins() {
        let timeout = effective_timeout(
            Some(Duration::from_secs(3)),
            Some("2026-02-22T16:00:00Z"),
            now(),
            &policy(),
        );
        assert_eq!(timeout, Duration::from_secs(3));
    }

    #[test]
    fn expiry_adds_margin() {
        let timeout = effective_timeout(None, Some("2026-02-22T15:05:00Z"), now(), &policy());
        assert_eq!(timeout, Duration::from_secs(305));
    }

    #[test]
    fn expiry_with_offset() {
        let timeout =
            effective_timeout(None, Some("2026-02-22T16:01:00+01:00"), now(), &policy());
        assert_eq!(timeout, Duration::from_secs(65));
    }

    #[test]
    fn past_expiry_uses_minimum() {
        let timeout = effective_timeout(None, Some("2026-02-22T14:59:30Z"), now(), &policy());
        assert_eq!(timeout, Duration::from_secs(10));
    }

    #[test]
    fn unparseable_expiry_uses_default() {
        let timeout = effective_timeout(None, Some("not-a-date"), now(), &policy());
        assert_eq!(timeout, Duration::from_secs(600));
    }

    #[test]
    fn naive_timestamp_uses_default() {
        let timeout = effective_timeout(None, Some("2026-02-22T15:05:00"), now(), &policy());
        assert_eq!(timeout, Duration::from_secs(600));
    }

    #[test]
    fn absent_expiry_uses_default() {
        assert_eq!(
            effective_timeout(None, None, now(), &policy()),
            Duration::from_secs(600)
        );
        assert_eq!(
            effective_timeout(None, Some(""), now(), &policy()),
            Duration::from_secs(600)
        );
    }

    #[test]
    fn policy_from_config() {
        let section = ApprovalSection {
            default_timeout_secs: 120,
            min_timeout_secs: 2,
            clock_skew_margin_secs: 0,
            ..ApprovalSection::default()
        };
        let policy = TimeoutPolicy::from_config(&section);
        assert_eq!(
            effective_timeout(None, Some("2026-02-22T15:00:01Z"), now(), &policy),
            Duration::from_secs(2)
        );
        assert_eq!(
            effective_timeout(None, None, now(), &policy),
            Duration::from_secs(120)
        );
    }
}
