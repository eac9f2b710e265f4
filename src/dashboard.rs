//! Composition of the query pipeline: build KQL, fetch, normalize,
//! downsample, derive statistics.

use futures::{stream, StreamExt};
use strum::IntoEnumIterator;
use tracing::{debug, warn};

use crate::api::types::AdxRow;
use crate::api::{DeviceInfo, TelemetryBackend};
use crate::catalog::{InverterMode, Metric, SourceTable};
use crate::error::Result;
use crate::kql;
use crate::series::{self, Sample, Stats, TimeRange};

/// History of one metric over a time range. Raw rows are kept for export;
/// `chart` is the downsampled series used for rendering.
#[derive(Debug, Clone)]
pub struct MetricHistory {
    pub metric: Metric,
    pub range: TimeRange,
    pub rows: Vec<AdxRow>,
    pub samples: Vec<Sample>,
    pub chart: Vec<Sample>,
    pub stats: Option<Stats>,
}

/// Latest reading of one metric, as shown on a gauge. Fetch failures are
/// carried per-metric so one failing gauge does not sink the snapshot.
#[derive(Debug, Clone)]
pub struct GaugeReading {
    pub metric: Metric,
    pub sample: Option<Sample>,
    pub error: Option<String>,
}

impl GaugeReading {
    /// Inverter mode decoding for the one metric that is an enum, not a
    /// measurement.
    pub fn inverter_mode(&self) -> Option<InverterMode> {
        if self.metric != Metric::InverterMode {
            return None;
        }
        self.sample.map(|s| InverterMode::from_value(s.value))
    }

    pub fn is_offline(&self) -> bool {
        match (self.metric.spec().offline_value, self.sample) {
            (Some(sentinel), Some(sample)) => sample.value == sentinel,
            _ => false,
        }
    }
}

/// Full snapshot of the device, one reading per catalog metric.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub serial: String,
    pub readings: Vec<GaugeReading>,
}

pub struct Dashboard<B> {
    backend: B,
    max_chart_points: usize,
    snapshot_concurrency: usize,
}

impl<B: TelemetryBackend> Dashboard<B> {
    pub fn new(backend: B, max_chart_points: usize, snapshot_concurrency: usize) -> Self {
        Self {
            backend,
            max_chart_points,
            snapshot_concurrency: snapshot_concurrency.max(1),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Serial existence check via the device registry.
    pub async fn device_info(&self, serial: &str) -> Result<DeviceInfo> {
        self.backend.search_serial(serial).await
    }

    /// Date-bounded history for one metric: query, normalize timestamps,
    /// downsample for charting and compute the stats panel values.
    pub async fn history(
        &self,
        serial: &str,
        metric: Metric,
        range: TimeRange,
    ) -> Result<MetricHistory> {
        let spec = metric.spec();
        let query = match spec.table {
            SourceTable::Telemetry => kql::history(serial, spec.channel, &range),
            // Only the relay metric takes this path.
            SourceTable::Alarms => kql::alarm_history(serial, spec.channel, &range),
        };
        debug!(%metric, serial, "fetching history");
        let rows = self.backend.query(&query).await?;

        let samples = normalize_rows(&rows, spec.table);
        let chart = series::downsample(&samples, self.max_chart_points);
        let values: Vec<f64> = chart.iter().map(|s| s.value).collect();
        let stats = Stats::compute(&values);

        Ok(MetricHistory {
            metric,
            range,
            rows,
            samples,
            chart,
            stats,
        })
    }

    /// Latest reading for one metric.
    pub async fn latest(&self, serial: &str, metric: Metric) -> Result<Option<Sample>> {
        let spec = metric.spec();
        let query = match spec.table {
            SourceTable::Telemetry => kql::latest(serial, spec.channel),
            SourceTable::Alarms => kql::latest_alarm(serial, spec.channel),
        };
        let rows = self.backend.query(&query).await?;
        Ok(normalize_rows(&rows, spec.table).into_iter().next())
    }

    /// Latest value for every catalog metric, fetched with bounded
    /// concurrency. Per-metric failures become `GaugeReading::error`.
    pub async fn snapshot(&self, serial: &str) -> Result<Snapshot> {
        let results = stream::iter(Metric::iter())
            .map(|metric| async move {
                match self.latest(serial, metric).await {
                    Ok(sample) => Ok(GaugeReading {
                        metric,
                        sample,
                        error: None,
                    }),
                    // Session loss affects every gauge identically;
                    // surface it once instead of as 32 gauge errors.
                    Err(err) if err.requires_login() => Err(err),
                    Err(err) => {
                        warn!(%metric, %err, "gauge fetch failed");
                        Ok(GaugeReading {
                            metric,
                            sample: None,
                            error: Some(err.to_string()),
                        })
                    }
                }
            })
            .buffered(self.snapshot_concurrency)
            .collect::<Vec<_>>()
            .await;

        let readings = results.into_iter().collect::<Result<Vec<_>>>()?;

        Ok(Snapshot {
            serial: serial.to_string(),
            readings,
        })
    }
}

/// Convert raw rows to samples, dropping rows with missing timestamps,
/// unparseable timestamps or non-finite values.
fn normalize_rows(rows: &[AdxRow], table: SourceTable) -> Vec<Sample> {
    rows.iter()
        .filter_map(|row| {
            let raw_time = row.localtime.as_deref()?;
            let value = match table {
                SourceTable::Telemetry => row.value_double?,
                SourceTable::Alarms => row.value.or(row.value_double)?,
            };
            if !value.is_finite() {
                return None;
            }
            match series::parse_localtime(raw_time) {
                Ok(timestamp) => Some(Sample { timestamp, value }),
                Err(err) => {
                    debug!(%err, "dropping row with bad timestamp");
                    None
                }
            }
        })
        .collect()
}
