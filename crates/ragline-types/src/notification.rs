//! User-visible status messages.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

/// Whether a notification reports success or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Good,
    Bad,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Good => write!(f, "good"),
            Severity::Bad => write!(f, "bad"),
        }
    }
}

/// A transient status message. Expires a fixed TTL after `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub text: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(text: impl Into<String>, severity: Severity, created_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            severity,
            created_at,
        }
    }

    /// True once the notification's age strictly exceeds `ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.created_at) > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_is_strictly_after_ttl() {
        let t0 = Utc::now();
        let n = Notification::new("saved", Severity::Good, t0);
        let ttl = Duration::seconds(5);
        assert!(!n.is_expired(t0, ttl));
        assert!(!n.is_expired(t0 + Duration::seconds(5), ttl));
        assert!(n.is_expired(t0 + Duration::milliseconds(5_001), ttl));
    }

    #[test]
    fn test_severity_serde() {
        assert_eq!(serde_json::to_string(&Severity::Bad).unwrap(), "\"bad\"");
    }
}
