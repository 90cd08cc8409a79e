// ── Refresh cache ──
//
// One RefreshCache per data source. Scrape handling reads the committed
// state; refreshes run as detached background tasks and commit their
// result when done. The state lock is held only to copy state out or to
// flip bookkeeping fields -- never across the network fetch.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::CoreError;
use crate::model::{Snapshot, SourceKind};

/// Boxed fetch future returned by a [`SnapshotReader`].
pub type FetchFuture = futures_core::future::BoxFuture<'static, Result<Snapshot, CoreError>>;

/// The upstream fetch capability for one data source.
///
/// Credential acquisition is composed into the reader at wiring time; the
/// cache sees a single fallible fetch and treats every error uniformly.
/// One call performs exactly one attempt -- no retries.
pub trait SnapshotReader: Send + Sync + 'static {
    fn fetch(&self) -> FetchFuture;
}

impl<F> SnapshotReader for F
where
    F: Fn() -> FetchFuture + Send + Sync + 'static,
{
    fn fetch(&self) -> FetchFuture {
        self()
    }
}

/// Refresh bookkeeping plus the last committed snapshot for one source.
///
/// `last_success` is set if and only if `snapshot` is set; a recorded
/// `last_error` means the most recent attempt did not touch `snapshot`.
#[derive(Debug, Clone, Default)]
pub struct RefreshState {
    /// When the last refresh was triggered, successful or not.
    pub last_attempt: Option<DateTime<Utc>>,
    /// Error from the most recent completed attempt, if it failed.
    pub last_error: Option<String>,
    /// Wall-clock duration of the most recent completed attempt.
    pub last_duration: Duration,
    /// When the cached snapshot was committed.
    pub last_success: Option<DateTime<Utc>>,
    pub snapshot: Option<Arc<Snapshot>>,
}

impl RefreshState {
    /// Health indicator: the last completed attempt produced no error and
    /// at least one refresh has ever succeeded.
    pub fn is_up(&self) -> bool {
        self.last_error.is_none() && self.last_success.is_some()
    }
}

/// Per-source cache with single-flight background refresh.
pub struct RefreshCache {
    kind: SourceKind,
    reader: Box<dyn SnapshotReader>,
    refresh_interval: Duration,
    /// Never held across an await.
    state: RwLock<RefreshState>,
    cancel: CancellationToken,
}

impl RefreshCache {
    pub fn new(
        kind: SourceKind,
        reader: Box<dyn SnapshotReader>,
        refresh_interval: Duration,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind,
            reader,
            refresh_interval,
            state: RwLock::new(RefreshState::default()),
            cancel,
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Copy out the most recently committed state. Never blocks on
    /// network I/O; the snapshot travels as an `Arc`, so this is cheap.
    pub fn read(&self) -> RefreshState {
        self.state.read().expect("state lock poisoned").clone()
    }

    /// Trigger a background refresh if the last attempt is at least one
    /// refresh interval old (or none was ever made). Returns whether a
    /// refresh was started.
    ///
    /// The due-check and the `last_attempt` mark happen inside one write
    /// lock, so concurrent callers collapse into at most one upstream
    /// fetch per interval. The caller never waits on the fetch itself;
    /// results land in the cache for a later read.
    pub fn maybe_refresh(self: &Arc<Self>, now: DateTime<Utc>) -> bool {
        let interval = TimeDelta::from_std(self.refresh_interval).unwrap_or(TimeDelta::MAX);
        {
            let mut state = self.state.write().expect("state lock poisoned");
            let due = state
                .last_attempt
                .is_none_or(|last| now.signed_duration_since(last) >= interval);
            if !due {
                return false;
            }
            state.last_attempt = Some(now);
        }

        let cache = Arc::clone(self);
        tokio::spawn(async move {
            cache.run_refresh(now).await;
        });
        true
    }

    /// Run one refresh attempt to completion and commit the result.
    ///
    /// Commit order wins: if two refreshes were ever in flight (the
    /// single-flight mark should prevent that), the last to commit is the
    /// state served afterwards. A shutdown cancels the fetch and commits
    /// nothing -- safe, because state only changes here at the end.
    async fn run_refresh(self: Arc<Self>, now: DateTime<Utc>) {
        debug!(source = %self.kind, "refreshing data");

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!(source = %self.kind, "refresh cancelled by shutdown");
                return;
            }
            result = self.reader.fetch() => result,
        };
        let duration = started.elapsed();

        let mut state = self.state.write().expect("state lock poisoned");
        state.last_duration = duration;
        match result {
            Ok(snapshot) => {
                state.snapshot = Some(Arc::new(snapshot));
                state.last_success = Some(now);
                state.last_error = None;
                debug!(source = %self.kind, ?duration, "refresh complete");
            }
            Err(err) => {
                error!(source = %self.kind, error = %err, "refresh failed");
                state.last_error = Some(err.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::model::{SensorReading, SensorValues};

    /// Reader that pops scripted results and counts fetches.
    struct ScriptedReader {
        results: Mutex<Vec<Result<Snapshot, CoreError>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedReader {
        fn boxed(
            results: Vec<Result<Snapshot, CoreError>>,
        ) -> (Box<dyn SnapshotReader>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let reader = Self {
                results: Mutex::new(results),
                calls: Arc::clone(&calls),
            };
            (Box::new(reader), calls)
        }
    }

    impl SnapshotReader for ScriptedReader {
        fn fetch(&self) -> FetchFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self
                .results
                .lock()
                .expect("results lock poisoned")
                .pop()
                .unwrap_or_else(|| {
                    Err(CoreError::FetchFailed {
                        message: "script exhausted".into(),
                    })
                });
            Box::pin(async move { result })
        }
    }

    fn snapshot_with(id: &str, temp: f64, measured_at: DateTime<Utc>) -> Snapshot {
        Snapshot {
            readings: vec![SensorReading {
                id: id.into(),
                measured_at: Some(measured_at),
                values: SensorValues {
                    temperature: Some(temp),
                    ..SensorValues::default()
                },
                ..SensorReading::default()
            }],
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).expect("valid timestamp")
    }

    const INTERVAL: Duration = Duration::from_secs(480);

    /// Poll the cache until the predicate holds, bounded by a timeout.
    async fn wait_for(cache: &Arc<RefreshCache>, pred: impl Fn(&RefreshState) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if pred(&cache.read()) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("cache did not reach expected state");
    }

    #[tokio::test]
    async fn first_trigger_starts_refresh_and_commits() {
        let (reader, calls) = ScriptedReader::boxed(vec![Ok(snapshot_with("A", 21.0, at(100)))]);
        let cache = RefreshCache::new(
            SourceKind::Weather,
            reader,
            INTERVAL,
            CancellationToken::new(),
        );

        assert!(cache.maybe_refresh(at(1000)));
        wait_for(&cache, |s| s.snapshot.is_some()).await;

        let state = cache.read();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.last_attempt, Some(at(1000)));
        assert_eq!(state.last_success, Some(at(1000)));
        assert!(state.last_error.is_none());
        assert!(state.is_up());
    }

    #[tokio::test]
    async fn second_trigger_within_interval_is_single_flight() {
        let (reader, calls) = ScriptedReader::boxed(vec![Ok(snapshot_with("A", 21.0, at(100)))]);
        let cache = RefreshCache::new(
            SourceKind::Weather,
            reader,
            INTERVAL,
            CancellationToken::new(),
        );

        assert!(cache.maybe_refresh(at(1000)));
        // Within the interval -- must not start a second fetch.
        assert!(!cache.maybe_refresh(at(1000)));
        assert!(!cache.maybe_refresh(at(1000 + 479)));

        wait_for(&cache, |s| s.snapshot.is_some()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn trigger_after_interval_refreshes_again() {
        let (reader, calls) = ScriptedReader::boxed(vec![
            Ok(snapshot_with("B", 19.0, at(600))),
            Ok(snapshot_with("A", 21.0, at(100))),
        ]);
        let cache = RefreshCache::new(
            SourceKind::Weather,
            reader,
            INTERVAL,
            CancellationToken::new(),
        );

        assert!(cache.maybe_refresh(at(1000)));
        wait_for(&cache, |s| s.snapshot.is_some()).await;

        assert!(cache.maybe_refresh(at(1000 + 480)));
        wait_for(&cache, |s| s.last_success == Some(at(1480))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let state = cache.read();
        let snapshot = state.snapshot.expect("snapshot present");
        assert_eq!(snapshot.readings[0].id, "B");
    }

    #[tokio::test]
    async fn failed_refresh_preserves_snapshot_and_records_error() {
        let (reader, _) = ScriptedReader::boxed(vec![
            Err(CoreError::FetchFailed {
                message: "boom".into(),
            }),
            Ok(snapshot_with("A", 21.0, at(100))),
        ]);
        let cache = RefreshCache::new(
            SourceKind::Weather,
            reader,
            INTERVAL,
            CancellationToken::new(),
        );

        cache.maybe_refresh(at(1000));
        wait_for(&cache, |s| s.snapshot.is_some()).await;

        cache.maybe_refresh(at(1000 + 480));
        wait_for(&cache, |s| s.last_error.is_some()).await;

        let state = cache.read();
        // Serve-stale-on-error: the committed snapshot is untouched.
        let snapshot = state.snapshot.expect("snapshot preserved");
        assert_eq!(snapshot.readings[0].id, "A");
        assert_eq!(snapshot.readings[0].values.temperature, Some(21.0));
        assert_eq!(state.last_success, Some(at(1000)));
        assert!(state.last_error.expect("error recorded").contains("boom"));
        assert!(!cache.read().is_up());
    }

    #[tokio::test]
    async fn failed_refresh_still_records_duration() {
        let (reader, _) = ScriptedReader::boxed(vec![Err(CoreError::AuthenticationFailed {
            message: "no token".into(),
        })]);
        let cache = RefreshCache::new(
            SourceKind::HomeCoach,
            reader,
            INTERVAL,
            CancellationToken::new(),
        );

        cache.maybe_refresh(at(1000));
        wait_for(&cache, |s| s.last_error.is_some()).await;

        let state = cache.read();
        assert!(state.snapshot.is_none());
        assert!(state.last_success.is_none());
        // Duration is measured whether the attempt succeeded or failed.
        // (A near-instant fake fetch may round to zero; the field is
        // committed either way, together with the error.)
        assert!(state.last_error.is_some());
    }

    #[tokio::test]
    async fn concurrent_triggers_collapse_to_one_fetch() {
        let (reader, calls) = ScriptedReader::boxed(vec![Ok(snapshot_with("A", 21.0, at(100)))]);
        let cache = RefreshCache::new(
            SourceKind::Weather,
            reader,
            INTERVAL,
            CancellationToken::new(),
        );

        let started: usize = (0..16)
            .map(|_| usize::from(cache.maybe_refresh(at(1000))))
            .sum();
        assert_eq!(started, 1);

        wait_for(&cache, |s| s.snapshot.is_some()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_refresh_commits_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        // A reader whose future never resolves -- cancellation must win.
        let reader = Box::new(|| -> FetchFuture {
            Box::pin(async {
                std::future::pending::<()>().await;
                unreachable!()
            })
        });
        let cache = RefreshCache::new(SourceKind::Weather, reader, INTERVAL, cancel);

        cache.maybe_refresh(at(1000));
        // Give the spawned task a chance to observe the cancellation.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let state = cache.read();
        assert!(state.snapshot.is_none());
        assert!(state.last_error.is_none());
        assert!(state.last_success.is_none());
        // The attempt mark remains -- the trigger did happen.
        assert_eq!(state.last_attempt, Some(at(1000)));
    }
}
