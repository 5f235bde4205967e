//! CLI entry point for the last-mile KPI rater.
//!
//! Provides subcommands for running the last-mile route pipeline and the
//! supplier procurement pipeline over local CSV tables.

use anyhow::Result;
use clap::{Parser, Subcommand};
use lastmile_rater::config::{PipelineConfig, ProcurementConfig};
use lastmile_rater::io::{load_defects, load_gps_logs, load_orders, load_routes, write_table};
use lastmile_rater::pipeline;
use lastmile_rater::pipeline::aggregate::DailyKpiRow;
use lastmile_rater::pipeline::alerts::Alert;
use lastmile_rater::procurement::{
    ProcurementOrder, SupplierAlert, SupplierMonthKpiRow, evaluate_supplier_kpis,
    supplier_month_kpis,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "lastmile_rater")]
#[command(about = "Computes daily last-mile route KPIs and operational alerts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the last-mile pipeline: GPS logs + orders + routes (+ defects)
    /// into daily KPIs and friendly alerts
    Run {
        /// Directory containing orders.csv, routes.csv, gps_logs.csv and
        /// optionally defects.csv
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Output path for the daily KPI table
        #[arg(long, default_value = "data/daily_kpis.csv")]
        kpi_out: PathBuf,

        /// Output path for the friendly alert table
        #[arg(long, default_value = "data/alerts_friendly.csv")]
        alerts_out: PathBuf,

        /// Optional JSON config overriding ping interval, SLA table, and
        /// thresholds
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run the supplier procurement pipeline: purchase orders into monthly
    /// supplier KPIs and alerts
    Procurement {
        /// Purchase-order CSV (original vendor column headers)
        #[arg(short, long, default_value = "data/procurement_orders.csv")]
        input: PathBuf,

        /// Output path for the monthly supplier KPI table
        #[arg(long, default_value = "data/supplier_monthly_kpis_pretty.csv")]
        kpi_out: PathBuf,

        /// Output path for the supplier alert table
        #[arg(long, default_value = "data/alerts.csv")]
        alerts_out: PathBuf,

        /// Optional JSON config overriding the category SLA table and
        /// thresholds
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/lastmile_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("lastmile_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data_dir,
            kpi_out,
            alerts_out,
            config,
        } => run_lastmile(&data_dir, &kpi_out, &alerts_out, config.as_deref())?,
        Commands::Procurement {
            input,
            kpi_out,
            alerts_out,
            config,
        } => run_procurement(&input, &kpi_out, &alerts_out, config.as_deref())?,
    }

    Ok(())
}

#[tracing::instrument(skip_all, fields(data_dir = %data_dir.display()))]
fn run_lastmile(
    data_dir: &Path,
    kpi_out: &Path,
    alerts_out: &Path,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    // All inputs load fully before any transformation begins; a missing
    // required file aborts here, before any output is written.
    let orders = load_orders(&data_dir.join("orders.csv"))?;
    let routes = load_routes(&data_dir.join("routes.csv"))?;
    let pings = load_gps_logs(&data_dir.join("gps_logs.csv"))?;
    let defects = load_defects(&data_dir.join("defects.csv"))?;
    info!(
        orders = orders.len(),
        routes = routes.len(),
        pings = pings.len(),
        defects = defects.len(),
        "inputs loaded"
    );

    let (kpi_rows, alerts) = pipeline::run(&orders, &routes, &pings, &defects, &config);

    write_table(kpi_out, DailyKpiRow::HEADERS, &kpi_rows)?;
    write_table(alerts_out, Alert::HEADERS, &alerts)?;

    Ok(())
}

#[tracing::instrument(skip_all, fields(input = %input.display()))]
fn run_procurement(
    input: &Path,
    kpi_out: &Path,
    alerts_out: &Path,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => ProcurementConfig::from_json_file(path)?,
        None => ProcurementConfig::default(),
    };

    let orders: Vec<ProcurementOrder> = lastmile_rater::io::load_procurement_orders(input)?;
    info!(orders = orders.len(), "purchase orders loaded");

    let kpis = supplier_month_kpis(&orders, &config.sla);
    let alerts = evaluate_supplier_kpis(&kpis, &config.thresholds);
    info!(
        supplier_months = kpis.len(),
        alerts = alerts.len(),
        "procurement KPIs computed"
    );

    let rows: Vec<_> = kpis.iter().map(|k| k.to_row()).collect();
    write_table(kpi_out, SupplierMonthKpiRow::HEADERS, &rows)?;
    write_table(alerts_out, SupplierAlert::HEADERS, &alerts)?;

    Ok(())
}
