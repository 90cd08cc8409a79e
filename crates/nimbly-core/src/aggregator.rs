// ── Multi-source aggregation ──
//
// Fan-out wrapper over the per-source refresh caches. Each scrape
// triggers stale sources to refresh in the background and merges what is
// currently cached into one observation sequence. Sources are fully
// independent: no lock spans more than one of them, so a slow or failing
// source never blocks another source's scrape path.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::{RefreshCache, RefreshState};
use crate::model::SourceKind;
use crate::project::{LabelSchema, Observation, project};

/// Per-source health sample emitted on every collect.
///
/// Health is always reported for an enabled source, even when the cached
/// data is ancient -- the operator gets told the source is down, while
/// individual stale readings silently drop out of the data observations.
#[derive(Debug, Clone)]
pub struct SourceHealth {
    pub source: SourceKind,
    /// True when the last completed attempt produced no error and at
    /// least one refresh has ever succeeded.
    pub up: bool,
    pub refresh_interval: Duration,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_duration: Duration,
    /// When the currently served snapshot was committed.
    pub cache_updated: Option<DateTime<Utc>>,
}

/// Result of one collect pass: data observations plus health samples.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub observations: Vec<Observation>,
    pub health: Vec<SourceHealth>,
}

/// Owns one refresh cache per enabled data source.
pub struct Aggregator {
    sources: Vec<Arc<RefreshCache>>,
    stale_threshold: Duration,
}

impl Aggregator {
    /// Build from the enabled sources' caches. Disabled sources are
    /// simply never added -- they contribute neither data nor health.
    pub fn new(sources: Vec<Arc<RefreshCache>>, stale_threshold: Duration) -> Self {
        Self {
            sources,
            stale_threshold,
        }
    }

    /// One scrape pass: per source, trigger a refresh if due (the
    /// current scrape never waits on it), then project whatever snapshot
    /// is currently committed.
    pub fn collect(&self, now: DateTime<Utc>, schema: LabelSchema) -> Collection {
        let mut collection = Collection::default();

        for cache in &self.sources {
            cache.maybe_refresh(now);
            let state = cache.read();

            collection.health.push(SourceHealth {
                source: cache.kind(),
                up: state.is_up(),
                refresh_interval: cache.refresh_interval(),
                last_attempt: state.last_attempt,
                last_duration: state.last_duration,
                cache_updated: state.last_success,
            });

            if let Some(snapshot) = &state.snapshot {
                collection.observations.extend(project(
                    snapshot,
                    cache.kind(),
                    now,
                    self.stale_threshold,
                    schema,
                ));
            }
        }

        collection
    }

    /// Read-only view of every source's current state, for the debug
    /// endpoint. Never triggers a refresh.
    pub fn states(&self) -> Vec<(SourceKind, RefreshState)> {
        self.sources
            .iter()
            .map(|cache| (cache.kind(), cache.read()))
            .collect()
    }
}
