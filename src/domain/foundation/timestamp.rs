//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Returns the duration from another timestamp to this one.
    ///
    /// Negative if `other` is after `self`.
    pub fn duration_since(&self, other: &Timestamp) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Creates a new timestamp by adding the specified number of days.
    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    pub fn plus_secs(&self, secs: i64) -> Self {
        Self(self.0 + Duration::seconds(secs))
    }

    pub fn minus_secs(&self, secs: i64) -> Self {
        Self(self.0 - Duration::seconds(secs))
    }

    /// Creates a timestamp from Unix seconds, if representable.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp(secs, 0).map(Self)
    }

    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// RFC 3339 rendering used in payment metadata.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_close_to_utc_now() {
        let ts = Timestamp::now();
        let diff = Utc::now().signed_duration_since(*ts.as_datetime());
        assert!(diff.num_seconds().abs() < 2);
    }

    #[test]
    fn ordering_helpers_agree() {
        let earlier = Timestamp::now();
        let later = earlier.plus_secs(10);
        assert!(earlier.is_before(&later));
        assert!(later.is_after(&earlier));
        assert!(earlier < later);
    }

    #[test]
    fn duration_since_is_signed() {
        let t = Timestamp::now();
        let later = t.plus_secs(61 * 60);
        assert_eq!(later.duration_since(&t).num_minutes(), 61);
        assert_eq!(t.duration_since(&later).num_minutes(), -61);
    }

    #[test]
    fn add_days_moves_forward() {
        let t = Timestamp::now();
        assert_eq!(t.add_days(30).duration_since(&t).num_days(), 30);
    }

    #[test]
    fn unix_secs_round_trip() {
        let t = Timestamp::from_unix_secs(1_700_000_000).unwrap();
        assert_eq!(t.as_unix_secs(), 1_700_000_000);
    }

    #[test]
    fn minus_secs_moves_backward() {
        let t = Timestamp::now();
        assert_eq!(t.duration_since(&t.minus_secs(120)).num_seconds(), 120);
    }
}
