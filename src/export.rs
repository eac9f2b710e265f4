//! CSV export and plain-text report generation.
//!
//! CSV rows are written from the raw (non-downsampled) query result, one
//! line per backend row, timestamps passed through untouched. Metrics with
//! an offline sentinel get an extra `status` column.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::info;

use crate::api::types::{AdxRow, DeviceInfo};
use crate::catalog::{InverterMode, Metric, MetricSpec};
use crate::dashboard::{MetricHistory, Snapshot};
use crate::error::Result;
use crate::series::TimeRange;

/// `<prefix>_<serial>_<YYYY-MM-DD>.csv`
pub fn csv_filename(spec: &MetricSpec, serial: &str) -> String {
    format!(
        "{}_{}_{}.csv",
        spec.csv_prefix,
        serial,
        Local::now().format("%Y-%m-%d")
    )
}

/// Render rows as CSV text. Separated from the file write so it can be
/// tested without touching disk.
pub fn render_csv(rows: &[AdxRow], spec: &MetricSpec) -> String {
    let has_status = spec.offline_value.is_some();
    let mut out = String::new();

    if spec.unit.is_empty() {
        out.push_str("localtime,value");
    } else {
        out.push_str(&format!("localtime,value ({})", spec.unit));
    }
    if has_status {
        out.push_str(",status");
    }
    out.push('\n');

    for row in rows {
        let localtime = row.localtime.as_deref().unwrap_or("");
        let value = row
            .value_double
            .or(row.value)
            .map(|v| v.to_string())
            .unwrap_or_default();
        out.push_str(localtime);
        out.push(',');
        out.push_str(&value);
        if let Some(sentinel) = spec.offline_value {
            let status = if row.value_double.or(row.value) == Some(sentinel) {
                "offline"
            } else {
                "online"
            };
            out.push(',');
            out.push_str(status);
        }
        out.push('\n');
    }
    out
}

/// Write a metric history to `<output_dir>/<prefix>_<serial>_<date>.csv`.
pub async fn write_csv(
    output_dir: &Path,
    serial: &str,
    history: &MetricHistory,
) -> Result<PathBuf> {
    let spec = history.metric.spec();
    let path = output_dir.join(csv_filename(&spec, serial));
    let content = render_csv(&history.rows, &spec);
    tokio::fs::write(&path, content).await?;
    info!(file = %path.display(), rows = history.rows.len(), "CSV written");
    Ok(path)
}

fn fmt_value(value: f64, spec: &MetricSpec) -> String {
    if spec.unit.is_empty() {
        format!("{value:.prec$}", prec = spec.decimals)
    } else {
        format!("{value:.prec$} {}", spec.unit, prec = spec.decimals)
    }
}

fn fmt_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Plain-text analytics report: device information header, current
/// readings, then per-metric statistics over the report range.
pub fn render_report(
    device: &DeviceInfo,
    snapshot: &Snapshot,
    histories: &[MetricHistory],
    range: &TimeRange,
) -> String {
    let mut out = String::new();
    let line = "=".repeat(72);

    out.push_str(&line);
    out.push_str("\nProsumer Analytics Report\n");
    out.push_str(&format!(
        "Generated: {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&line);
    out.push('\n');

    out.push_str("\nDevice Information\n------------------\n");
    let field = |label: &str, value: &Option<String>| {
        format!("{label:<14}{}\n", value.as_deref().unwrap_or("N/A"))
    };
    out.push_str(&field("Serial:", &device.device_serial));
    out.push_str(&field("Comms serial:", &device.comms_serial));
    out.push_str(&field("MAC:", &device.mac_address));
    out.push_str(&field("Firmware:", &device.firmware_version));
    out.push_str(&field("Last seen:", &device.localtime));

    out.push_str("\nCurrent Readings\n----------------\n");
    for reading in &snapshot.readings {
        let spec = reading.metric.spec();
        let rendered = match (&reading.sample, &reading.error) {
            (Some(sample), _) => {
                if reading.metric == Metric::InverterMode {
                    let mode = InverterMode::from_value(sample.value);
                    format!("{mode} ({})", mode.description())
                } else if reading.is_offline() {
                    format!("{} [device offline]", fmt_value(sample.value, &spec))
                } else {
                    fmt_value(sample.value, &spec)
                }
            }
            (None, Some(err)) => format!("error: {err}"),
            (None, None) => "N/A".to_string(),
        };
        out.push_str(&format!("{:<28}{rendered}\n", spec.label));
    }

    out.push_str(&format!(
        "\nHistory Statistics ({} to {})\n------------------\n",
        fmt_timestamp(range.from),
        fmt_timestamp(range.to),
    ));
    for history in histories {
        let spec = history.metric.spec();
        match &history.stats {
            Some(stats) => {
                out.push_str(&format!(
                    "{:<28}min {}  max {}  avg {}  stddev {}  ({} pts)\n",
                    spec.label,
                    fmt_value(stats.min, &spec),
                    fmt_value(stats.max, &spec),
                    fmt_value(stats.mean, &spec),
                    fmt_value(stats.std_dev, &spec),
                    stats.count,
                ));
            }
            None => {
                out.push_str(&format!("{:<28}no data in range\n", spec.label));
            }
        }
    }

    out
}

/// Write the report next to the CSV exports.
pub async fn write_report(
    output_dir: &Path,
    serial: &str,
    content: &str,
) -> Result<PathBuf> {
    let path = output_dir.join(format!(
        "prosumer_report_{}_{}.txt",
        serial,
        Local::now().format("%Y-%m-%d")
    ));
    tokio::fs::write(&path, content).await?;
    info!(file = %path.display(), "report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::GaugeReading;
    use crate::series::{Sample, Stats};
    use chrono::NaiveDate;

    fn row(localtime: &str, value: f64) -> AdxRow {
        AdxRow {
            localtime: Some(localtime.to_string()),
            value_double: Some(value),
            value: None,
        }
    }

    #[test]
    fn test_csv_filename() {
        let name = csv_filename(&Metric::WifiSignal.spec(), "SN42");
        assert!(name.starts_with("wifi_signal_SN42_"));
        assert!(name.ends_with(".csv"));
    }

    #[test]
    fn test_render_csv_plain_metric() {
        let rows = vec![
            row("2025-03-06T15:44:33.000Z", 231.5),
            row("2025-03-06T15:59:33.000Z", 230.0),
        ];
        let csv = render_csv(&rows, &Metric::GridVoltageL1.spec());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "localtime,value (V)");
        assert_eq!(lines[1], "2025-03-06T15:44:33.000Z,231.5");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_render_csv_offline_status_column() {
        let rows = vec![
            row("2025-03-06T15:44:33.000Z", -60.0),
            row("2025-03-06T15:59:33.000Z", -127.0),
        ];
        let csv = render_csv(&rows, &Metric::WifiSignal.spec());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "localtime,value (dBm),status");
        assert!(lines[1].ends_with(",online"));
        assert!(lines[2].ends_with(",offline"));
    }

    #[test]
    fn test_render_csv_missing_fields() {
        let rows = vec![AdxRow::default()];
        let csv = render_csv(&rows, &Metric::GridPower.spec());
        assert_eq!(csv.lines().nth(1), Some(","));
    }

    #[test]
    fn test_render_report_sections() {
        let device = DeviceInfo {
            device_serial: Some("DEV-1".into()),
            comms_serial: Some("SN1".into()),
            mac_address: None,
            firmware_version: Some("1.2.3".into()),
            localtime: Some("2025-03-06T15:44:33.000Z".into()),
        };
        let ts = NaiveDate::from_ymd_opt(2025, 3, 6)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let snapshot = Snapshot {
            serial: "SN1".into(),
            readings: vec![
                GaugeReading {
                    metric: Metric::InverterMode,
                    sample: Some(Sample {
                        timestamp: ts,
                        value: 4.0,
                    }),
                    error: None,
                },
                GaugeReading {
                    metric: Metric::WifiSignal,
                    sample: Some(Sample {
                        timestamp: ts,
                        value: -127.0,
                    }),
                    error: None,
                },
                GaugeReading {
                    metric: Metric::GridPower,
                    sample: None,
                    error: Some("backend error".into()),
                },
            ],
        };
        let range = TimeRange::new(ts - chrono::Duration::hours(24), ts).unwrap();
        let histories = vec![MetricHistory {
            metric: Metric::GridVoltageL1,
            range,
            rows: vec![],
            samples: vec![],
            chart: vec![],
            stats: Stats::compute(&[229.0, 230.0, 231.0]),
        }];

        let report = render_report(&device, &snapshot, &histories, &range);
        assert!(report.contains("Prosumer Analytics Report"));
        assert!(report.contains("Serial:       DEV-1"));
        assert!(report.contains("MAC:          N/A"));
        assert!(report.contains("NORMAL (Operating normally)"));
        assert!(report.contains("[device offline]"));
        assert!(report.contains("error: backend error"));
        assert!(report.contains("min 229.0 V"));
        assert!(report.contains("max 231.0 V"));
    }
}
