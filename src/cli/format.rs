//! Terminal rendering: gauge tables, sparklines and stats panels.

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, Table};
use strum::IntoEnumIterator;

use crate::api::types::DeviceInfo;
use crate::catalog::{InverterMode, Metric, MetricSpec};
use crate::dashboard::{GaugeReading, MetricHistory, Snapshot};
use crate::series::Stats;

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const GAUGE_WIDTH: usize = 12;

fn header(label: &str) -> Cell {
    Cell::new(label).add_attribute(Attribute::Bold)
}

pub fn device_table(info: &DeviceInfo) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![header("Field"), header("Value")]);
    let na = |value: &Option<String>| value.clone().unwrap_or_else(|| "N/A".to_string());
    table.add_row(vec!["Device serial".to_string(), na(&info.device_serial)]);
    table.add_row(vec!["Comms serial".to_string(), na(&info.comms_serial)]);
    table.add_row(vec!["MAC address".to_string(), na(&info.mac_address)]);
    table.add_row(vec!["Firmware".to_string(), na(&info.firmware_version)]);
    table.add_row(vec!["Last seen".to_string(), na(&info.localtime)]);
    table.to_string()
}

/// Gauge table for the full snapshot, one section per catalog category.
pub fn snapshot_table(snapshot: &Snapshot) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        header("Category"),
        header("Metric"),
        header("Value"),
        header("Gauge"),
        header("Updated"),
    ]);

    for reading in &snapshot.readings {
        let spec = reading.metric.spec();
        table.add_row(vec![
            Cell::new(spec.category.to_string()),
            Cell::new(spec.label),
            value_cell(reading, &spec),
            Cell::new(gauge_cell(reading, &spec)),
            Cell::new(
                reading
                    .sample
                    .map(|s| s.timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default(),
            ),
        ]);
    }
    table.to_string()
}

fn value_cell(reading: &GaugeReading, spec: &MetricSpec) -> Cell {
    if let Some(err) = &reading.error {
        return Cell::new(format!("error: {err}")).fg(Color::Red);
    }
    let Some(sample) = reading.sample else {
        return Cell::new("no data").fg(Color::DarkGrey);
    };
    if let Some(mode) = reading.inverter_mode() {
        let cell = Cell::new(format!("{mode} ({})", mode.description()));
        return if mode.is_fault() {
            cell.fg(Color::Red).add_attribute(Attribute::Bold)
        } else if mode == InverterMode::Normal {
            cell.fg(Color::Green)
        } else {
            cell
        };
    }
    if reading.is_offline() {
        return Cell::new("offline").fg(Color::Red).add_attribute(Attribute::Bold);
    }
    Cell::new(format_value(sample.value, spec))
}

fn gauge_cell(reading: &GaugeReading, spec: &MetricSpec) -> String {
    match reading.sample {
        Some(sample) if !reading.is_offline() && reading.metric != Metric::InverterMode => {
            gauge_bar(sample.value, spec.bounds, GAUGE_WIDTH)
        }
        _ => String::new(),
    }
}

pub fn format_value(value: f64, spec: &MetricSpec) -> String {
    if spec.unit.is_empty() {
        format!("{value:.prec$}", prec = spec.decimals)
    } else {
        format!("{value:.prec$} {}", spec.unit, prec = spec.decimals)
    }
}

/// Horizontal bar scaled to the metric's gauge bounds, clamped at the ends.
pub fn gauge_bar(value: f64, bounds: (f64, f64), width: usize) -> String {
    let (lo, hi) = bounds;
    let frac = ((value - lo) / (hi - lo)).clamp(0.0, 1.0);
    let filled = (frac * width as f64).round() as usize;
    let mut bar = String::with_capacity(width * 3);
    for i in 0..width {
        bar.push(if i < filled { '█' } else { '░' });
    }
    bar
}

/// Unicode sparkline over the chart values. Flat series render as a
/// mid-level line.
pub fn sparkline(values: &[f64]) -> String {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return String::new();
    }
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    finite
        .iter()
        .map(|v| {
            let level = if span == 0.0 {
                SPARK_LEVELS.len() / 2
            } else {
                (((v - min) / span) * (SPARK_LEVELS.len() - 1) as f64).round() as usize
            };
            SPARK_LEVELS[level.min(SPARK_LEVELS.len() - 1)]
        })
        .collect()
}

/// Sparkline plus stats panel for one metric's history.
pub fn history_panel(history: &MetricHistory) -> String {
    let spec = history.metric.spec();
    let mut out = String::new();

    out.push_str(&format!(
        "{} ({} to {})\n",
        spec.label,
        history.range.from.format("%Y-%m-%d %H:%M"),
        history.range.to.format("%Y-%m-%d %H:%M"),
    ));

    let values: Vec<f64> = history.chart.iter().map(|s| s.value).collect();
    if values.is_empty() {
        out.push_str("no data in range\n");
        return out;
    }

    // Wide histories are squeezed to terminal width before sparking.
    let compact = crate::series::downsample(&values, 80);
    out.push_str(&sparkline(&compact));
    out.push('\n');

    if let Some(stats) = &history.stats {
        out.push_str(&stats_table(stats, &spec));
        out.push('\n');
    }
    out
}

pub fn stats_table(stats: &Stats, spec: &MetricSpec) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        header("Points"),
        header("Min"),
        header("Max"),
        header("Mean"),
        header("Std Dev"),
    ]);
    table.add_row(vec![
        stats.count.to_string(),
        format_value(stats.min, spec),
        format_value(stats.max, spec),
        format_value(stats.mean, spec),
        format_value(stats.std_dev, spec),
    ]);
    table.to_string()
}

/// Catalog listing for `prosumer metrics`.
pub fn metrics_table() -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        header("Name"),
        header("Label"),
        header("Unit"),
        header("Category"),
        header("Channel"),
    ]);
    for metric in Metric::iter() {
        let spec = metric.spec();
        table.add_row(vec![
            metric.to_string(),
            spec.label.to_string(),
            spec.unit.to_string(),
            spec.category.to_string(),
            spec.channel.to_string(),
        ]);
    }
    table.to_string()
}
