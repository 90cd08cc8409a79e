// ── Staleness evaluation ──
//
// Pure classification of a single measurement's age. Applied per item,
// not per source: a source can be up while one of its modules went
// offline hours ago. Expired items are dropped from projection entirely
// rather than emitted with a sentinel value.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Freshness of one measurement relative to the stale threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Expired,
}

/// Classify a measurement: `Expired` when `now - measured_at` exceeds the
/// stale threshold (strictly -- a measurement exactly at the threshold is
/// still fresh). Measurements from the future are fresh.
pub fn classify(
    measured_at: DateTime<Utc>,
    now: DateTime<Utc>,
    stale_threshold: Duration,
) -> Freshness {
    let threshold = TimeDelta::from_std(stale_threshold).unwrap_or(TimeDelta::MAX);
    if now.signed_duration_since(measured_at) > threshold {
        Freshness::Expired
    } else {
        Freshness::Fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_secs(1800);

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).expect("valid timestamp")
    }

    #[test]
    fn recent_measurement_is_fresh() {
        assert_eq!(classify(at(10_000), at(10_060), THRESHOLD), Freshness::Fresh);
    }

    #[test]
    fn measurement_exactly_at_threshold_is_fresh() {
        assert_eq!(
            classify(at(10_000), at(10_000 + 1800), THRESHOLD),
            Freshness::Fresh
        );
    }

    #[test]
    fn measurement_past_threshold_is_expired() {
        assert_eq!(
            classify(at(10_000), at(10_000 + 1801), THRESHOLD),
            Freshness::Expired
        );
    }

    #[test]
    fn future_measurement_is_fresh() {
        assert_eq!(classify(at(20_000), at(10_000), THRESHOLD), Freshness::Fresh);
    }
}
