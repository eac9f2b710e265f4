//! Command dispatch: wires the client, session and dashboard together and
//! renders results to stdout.

pub mod args;
pub mod format;

use std::path::Path;

use strum::IntoEnumIterator;
use tracing::{info, warn};

use crate::api::{ProsumerClient, Session};
use crate::catalog::Metric;
use crate::cli::args::{
    Cli, Commands, DeviceArgs, ExportArgs, HistoryArgs, LoginArgs, RangeArgs, ReportArgs,
    SnapshotArgs,
};
use crate::config::Config;
use crate::dashboard::{Dashboard, MetricHistory};
use crate::error::Result;
use crate::export;
use crate::logging::shutdown_signal;
use crate::series::{self, TimeRange};

pub async fn run(cli: Cli, cfg: Config) -> Result<()> {
    let session = Session::with_file(&cfg.session.file).await;
    let client = ProsumerClient::new(&cfg.backend, session)?;

    match cli.command {
        Commands::Login(args) => login(&client, &args).await,
        Commands::Register(args) => register(&client, &args).await,
        Commands::Logout => client.logout().await,
        Commands::Metrics => {
            println!("{}", format::metrics_table());
            Ok(())
        }
        Commands::Device(args) => device(&client, &cfg, &args).await,
        Commands::Snapshot(args) => snapshot(&client, &cfg, &args).await,
        Commands::History(args) => history(&client, &cfg, &args).await,
        Commands::Export(args) => export_csv(&client, &cfg, &args).await,
        Commands::Report(args) => report(&client, &cfg, &args).await,
    }
}

async fn login(client: &ProsumerClient, args: &LoginArgs) -> Result<()> {
    client.login(&args.username, &args.password).await?;
    println!("Logged in as {}.", args.username);
    Ok(())
}

async fn register(client: &ProsumerClient, args: &LoginArgs) -> Result<()> {
    client.register(&args.username, &args.password).await?;
    client.login(&args.username, &args.password).await?;
    println!("Account {} created and logged in.", args.username);
    Ok(())
}

fn dashboard(client: &ProsumerClient, cfg: &Config) -> Dashboard<ProsumerClient> {
    Dashboard::new(
        client.clone(),
        cfg.query.max_chart_points,
        cfg.query.snapshot_concurrency,
    )
}

async fn device(client: &ProsumerClient, cfg: &Config, args: &DeviceArgs) -> Result<()> {
    let info = dashboard(client, cfg).device_info(&args.serial).await?;
    println!("{}", format::device_table(&info));
    Ok(())
}

async fn snapshot(client: &ProsumerClient, cfg: &Config, args: &SnapshotArgs) -> Result<()> {
    let dash = dashboard(client, cfg);
    // Serial validation up front so a typo fails before 32 queries do.
    dash.device_info(&args.serial).await?;

    let snap = dash.snapshot(&args.serial).await?;
    println!("{}", format::snapshot_table(&snap));
    if !args.watch {
        return Ok(());
    }

    let period = std::time::Duration::from_secs(args.interval.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await;
    info!(interval = args.interval, "watching, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = shutdown_signal() => return Ok(()),
            _ = ticker.tick() => {
                match dash.snapshot(&args.serial).await {
                    Ok(snap) => println!("{}", format::snapshot_table(&snap)),
                    Err(err) if err.requires_login() => return Err(err),
                    Err(err) => warn!(%err, "refresh failed, retrying next tick"),
                }
            }
        }
    }
}

async fn history(client: &ProsumerClient, cfg: &Config, args: &HistoryArgs) -> Result<()> {
    let range = resolve_range(&args.range, cfg)?;
    let history = dashboard(client, cfg)
        .history(&args.serial, args.metric, range)
        .await?;
    println!("{}", format::history_panel(&history));
    Ok(())
}

async fn export_csv(client: &ProsumerClient, cfg: &Config, args: &ExportArgs) -> Result<()> {
    let range = resolve_range(&args.range, cfg)?;
    let dash = dashboard(client, cfg);
    let out_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| cfg.export.output_dir.clone());
    let out_dir = Path::new(&out_dir);
    tokio::fs::create_dir_all(out_dir).await?;

    let metrics: Vec<Metric> = if args.metric.is_empty() {
        Metric::iter().collect()
    } else {
        args.metric.clone()
    };

    for metric in metrics {
        let history = dash.history(&args.serial, metric, range).await?;
        let path = export::write_csv(out_dir, &args.serial, &history).await?;
        println!("{} ({} rows)", path.display(), history.rows.len());
    }
    Ok(())
}

async fn report(client: &ProsumerClient, cfg: &Config, args: &ReportArgs) -> Result<()> {
    let range = resolve_range(&args.range, cfg)?;
    let dash = dashboard(client, cfg);

    let info = dash.device_info(&args.serial).await?;
    let snap = dash.snapshot(&args.serial).await?;
    let mut histories: Vec<MetricHistory> = Vec::new();
    for metric in Metric::iter() {
        histories.push(dash.history(&args.serial, metric, range).await?);
    }

    let content = export::render_report(&info, &snap, &histories, &range);
    let out_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| cfg.export.output_dir.clone());
    tokio::fs::create_dir_all(&out_dir).await?;
    let path = export::write_report(Path::new(&out_dir), &args.serial, &content).await?;
    println!("{}", path.display());
    Ok(())
}

/// Turn the range flags into a concrete window. Explicit --from/--to wins;
/// otherwise --last or the configured default window is used.
fn resolve_range(args: &RangeArgs, cfg: &Config) -> Result<TimeRange> {
    if let (Some(from), Some(to)) = (&args.from, &args.to) {
        return TimeRange::new(
            series::parse_user_datetime(from)?,
            series::parse_user_datetime(to)?,
        );
    }
    let hours = args.last.unwrap_or(cfg.query.default_window_hours as i64);
    TimeRange::last_hours(hours)
}
