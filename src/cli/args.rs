//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};

use crate::catalog::Metric;

#[derive(Parser)]
#[command(name = "prosumer")]
#[command(author, version, about = "Prosumer device telemetry console")]
#[command(
    long_about = "Terminal dashboard for Prosumer energy devices.\n\
    \nQueries the telemetry backend for live gauge readings, metric history,\n\
    CSV exports and plain-text analytics reports.\n\
    \nExamples:\n  \
    prosumer login --username alice --password secret\n  \
    prosumer snapshot 2303-0237-1945 --watch\n  \
    prosumer history 2303-0237-1945 grid_power --last 6\n  \
    prosumer export 2303-0237-1945 --metric battery1_soc --last 168"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session tokens
    Login(LoginArgs),

    /// Create a new account
    Register(LoginArgs),

    /// Log out and discard the stored session
    Logout,

    /// List every metric the console knows about
    Metrics,

    /// Show registration details for a device serial
    Device(DeviceArgs),

    /// Show the latest reading of every metric
    #[command(
        long_about = "Fetch the latest value of every catalog metric and render\n\
        the gauge table. With --watch the table refreshes until interrupted."
    )]
    Snapshot(SnapshotArgs),

    /// Plot one metric's history over a time range
    History(HistoryArgs),

    /// Export metric history to CSV files
    Export(ExportArgs),

    /// Write a plain-text analytics report
    Report(ReportArgs),
}

#[derive(Args)]
pub struct LoginArgs {
    #[arg(long, short)]
    pub username: String,

    #[arg(long, short)]
    pub password: String,
}

#[derive(Args)]
pub struct DeviceArgs {
    /// Device serial number
    pub serial: String,
}

#[derive(Args)]
pub struct SnapshotArgs {
    /// Device serial number
    pub serial: String,

    /// Keep refreshing until Ctrl-C
    #[arg(long, default_value_t = false)]
    pub watch: bool,

    /// Refresh interval in seconds for --watch
    #[arg(long, default_value_t = 10, value_name = "SECONDS")]
    pub interval: u64,
}

/// Time window selection shared by history, export and report.
/// Either an explicit --from/--to pair or a trailing --last window.
#[derive(Args)]
pub struct RangeArgs {
    /// Window size in hours, ending now (6, 24 and 168 match the
    /// dashboard presets)
    #[arg(long, value_name = "HOURS", conflicts_with_all = ["from", "to"])]
    pub last: Option<i64>,

    /// Range start, local time (YYYY-MM-DD or "YYYY-MM-DD HH:MM:SS")
    #[arg(long, value_name = "DATETIME", requires = "to")]
    pub from: Option<String>,

    /// Range end, local time (YYYY-MM-DD or "YYYY-MM-DD HH:MM:SS")
    #[arg(long, value_name = "DATETIME", requires = "from")]
    pub to: Option<String>,
}

#[derive(Args)]
pub struct HistoryArgs {
    /// Device serial number
    pub serial: String,

    /// Metric name, e.g. grid_power (see `prosumer metrics`)
    #[arg(value_parser = parse_metric)]
    pub metric: Metric,

    #[command(flatten)]
    pub range: RangeArgs,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Device serial number
    pub serial: String,

    /// Metric to export; repeat for several, omit for all
    #[arg(long, short, value_parser = parse_metric)]
    pub metric: Vec<Metric>,

    #[command(flatten)]
    pub range: RangeArgs,

    /// Directory for the CSV files (defaults to the configured export dir)
    #[arg(long, value_name = "PATH")]
    pub output_dir: Option<String>,
}

#[derive(Args)]
pub struct ReportArgs {
    /// Device serial number
    pub serial: String,

    #[command(flatten)]
    pub range: RangeArgs,

    /// Directory for the report file (defaults to the configured export dir)
    #[arg(long, value_name = "PATH")]
    pub output_dir: Option<String>,
}

fn parse_metric(name: &str) -> Result<Metric, String> {
    Metric::parse(name)
        .ok_or_else(|| format!("unknown metric '{name}', run `prosumer metrics` for the list"))
}
