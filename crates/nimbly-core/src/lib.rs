//! Refresh/cache engine between `nimbly-api` and the metrics endpoints.
//!
//! This crate owns the logic that decouples scrape cadence from upstream
//! polling cadence:
//!
//! - **[`RefreshCache`]** — per-source cache of the last successful
//!   snapshot plus refresh bookkeeping. `read()` never blocks on network
//!   I/O; `maybe_refresh()` spawns at most one background fetch per
//!   refresh interval (single-flight) and returns immediately. A failed
//!   refresh records the error and keeps serving the previous snapshot.
//! - **[`staleness`]** — pure per-item freshness classification. A source
//!   can be up while individual readings are old enough to be suppressed.
//! - **[`project`]** — turns a snapshot into flat [`Observation`]s for the
//!   metrics publisher, parameterized by label schema (legacy per-source
//!   or unified cross-source labels).
//! - **[`Aggregator`]** — owns one cache per enabled data source, fans out
//!   refresh triggers, and merges projected observations plus per-source
//!   health samples into one collection per scrape.
//!
//! Domain model ([`model`]) and wire-to-domain conversion ([`convert`])
//! round out the crate.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod project;
pub mod staleness;

// ── Primary re-exports ──────────────────────────────────────────────
pub use aggregator::{Aggregator, Collection, SourceHealth};
pub use cache::{FetchFuture, RefreshCache, RefreshState, SnapshotReader};
pub use config::CollectorConfig;
pub use error::CoreError;
pub use model::{SensorMetric, SensorReading, SensorValues, Snapshot, SourceKind};
pub use project::{LabelSchema, Observation, project};
pub use staleness::Freshness;
