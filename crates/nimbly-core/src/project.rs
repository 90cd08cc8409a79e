// ── Snapshot projection ──
//
// Turns a raw snapshot into the flat observation list handed to the
// metrics publisher. One canonical implementation, parameterized by label
// schema -- the legacy per-source view and the unified view are both pure
// projections over the same snapshot, never separate caches.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::{SensorMetric, SensorReading, Snapshot, SourceKind};
use crate::staleness::{Freshness, classify};

/// Which label schema to project into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSchema {
    /// Legacy schema: weather readings labeled `[module, station, home]`,
    /// Home Coach readings labeled `[device_id, device_name]`.
    PerSource,
    /// Unified cross-source schema:
    /// `[device_class, device_id, home, module, station]`.
    Unified,
}

/// One (labels, metric, value) unit of output. Label values are ordered
/// to match the schema's label-name declaration in the publisher; the
/// source kind routes the observation to the right metric family in the
/// per-source schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub source: SourceKind,
    pub metric: SensorMetric,
    pub labels: Vec<String>,
    pub value: f64,
}

/// Project a snapshot into observations.
///
/// Per reading: items without a measurement timestamp are skipped; items
/// whose own measurement is older than the stale threshold are skipped
/// entirely (no sentinel values); surviving items emit an `Updated`
/// observation plus one observation per present metric value. Absent
/// metrics are never zero-filled.
///
/// Deterministic and side-effect free: the same snapshot and `now` always
/// yield the same observations.
pub fn project(
    snapshot: &Snapshot,
    source: SourceKind,
    now: DateTime<Utc>,
    stale_threshold: Duration,
    schema: LabelSchema,
) -> Vec<Observation> {
    let mut out = Vec::new();

    for reading in &snapshot.readings {
        let Some(measured_at) = reading.measured_at else {
            debug!(source = %source, id = %reading.id, "no measurement data, skipping");
            continue;
        };

        if classify(measured_at, now, stale_threshold) == Freshness::Expired {
            debug!(
                source = %source,
                module = %reading.display_name(),
                "measurement stale, skipping"
            );
            continue;
        }

        let labels = item_labels(reading, source, schema);

        #[allow(clippy::cast_precision_loss)]
        out.push(Observation {
            source,
            metric: SensorMetric::Updated,
            labels: labels.clone(),
            value: measured_at.timestamp() as f64,
        });

        for (metric, value) in reading.values.present() {
            out.push(Observation {
                source,
                metric,
                labels: labels.clone(),
                value,
            });
        }
    }

    out
}

/// Schema-ordered label values for one reading.
fn item_labels(reading: &SensorReading, source: SourceKind, schema: LabelSchema) -> Vec<String> {
    match schema {
        LabelSchema::Unified => vec![
            source.as_str().to_owned(),
            reading.id.clone(),
            reading.home_name.clone(),
            reading.display_name(),
            reading.station_name.clone(),
        ],
        LabelSchema::PerSource => match source {
            SourceKind::Weather => vec![
                reading.display_name(),
                reading.station_name.clone(),
                reading.home_name.clone(),
            ],
            SourceKind::HomeCoach => {
                vec![reading.id.clone(), reading.station_name.clone()]
            }
        },
    }
}
