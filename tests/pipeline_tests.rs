//! End-to-end pipeline tests: CSV in, KPI and alert tables out.

use lastmile_rater::config::PipelineConfig;
use lastmile_rater::io::{load_defects, load_gps_logs, load_orders, load_routes, write_table};
use lastmile_rater::pipeline;
use lastmile_rater::pipeline::aggregate::DailyKpiRow;
use lastmile_rater::pipeline::alerts::Alert;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// One Prime route on 2024-05-01: 10 orders delivered on time, one ping per
/// minute for 8.2 hours with roughly 10% idle, one defective order.
fn write_prime_day_fixtures(dir: &Path) {
    let mut orders = String::from(
        "order_id,route_id,station_id,region,carrier_id,promised_at,delivered_at,first_attempt\n",
    );
    for i in 1..=10 {
        writeln!(
            orders,
            "O{i},R1,S1,North,C1,2024-05-01 18:00:00,2024-05-01 16:0{}:00,1",
            i % 10
        )
        .unwrap();
    }
    fs::write(dir.join("orders.csv"), orders).unwrap();

    fs::write(
        dir.join("routes.csv"),
        "route_id,route_date,station_id,region,carrier_id,route_type,planned_start,planned_end,planned_km\n\
         R1,2024-05-01,S1,North,C1,Prime,2024-05-01 08:00:00,2024-05-01 16:00:00,5.0\n",
    )
    .unwrap();

    // 493 pings at 60 s spacing span exactly 8.2 hours; 49 of them idle.
    // Constant coordinates keep the reconstructed distance at zero.
    let mut gps = String::from("route_id,ts,lat,lon,idle_flag,engine_on\n");
    for i in 0..493 {
        let minute = 8 * 60 + i;
        let idle = if i % 10 == 3 && i < 490 { 1 } else { 0 };
        writeln!(
            gps,
            "R1,2024-05-01 {:02}:{:02}:00,52.5,13.4,{idle},1",
            minute / 60,
            minute % 60
        )
        .unwrap();
    }
    fs::write(dir.join("gps_logs.csv"), gps).unwrap();

    fs::write(
        dir.join("defects.csv"),
        "order_id,defect_type,created_at,resolved_at\nO7,damaged,2024-05-01 12:00:00,\n",
    )
    .unwrap();
}

fn run_to_files(dir: &Path) -> (String, String) {
    let orders = load_orders(&dir.join("orders.csv")).unwrap();
    let routes = load_routes(&dir.join("routes.csv")).unwrap();
    let pings = load_gps_logs(&dir.join("gps_logs.csv")).unwrap();
    let defects = load_defects(&dir.join("defects.csv")).unwrap();

    let (kpi_rows, alerts) =
        pipeline::run(&orders, &routes, &pings, &defects, &PipelineConfig::default());

    let kpi_path = dir.join("daily_kpis.csv");
    let alerts_path = dir.join("alerts_friendly.csv");
    write_table(&kpi_path, DailyKpiRow::HEADERS, &kpi_rows).unwrap();
    write_table(&alerts_path, Alert::HEADERS, &alerts).unwrap();

    (
        fs::read_to_string(kpi_path).unwrap(),
        fs::read_to_string(alerts_path).unwrap(),
    )
}

#[test]
fn test_prime_route_day_end_to_end() {
    let dir = tempdir().unwrap();
    write_prime_day_fixtures(dir.path());
    let (kpis, alerts) = run_to_files(dir.path());

    let kpi_lines: Vec<&str> = kpis.lines().collect();
    assert_eq!(
        kpi_lines[0],
        "route_date,station_id,region,carrier_id,route_id,route_type,orders,delivered,\
         otd_pct,defect_rate_pct,first_attempt_pct,stops_per_hour,duration_vs_sla_hr,\
         dist_variance_km,idle_ratio_pct"
    );
    assert_eq!(kpi_lines.len(), 2);
    let fields: Vec<&str> = kpi_lines[1].split(',').collect();
    assert_eq!(&fields[..8], &["2024-05-01", "S1", "North", "C1", "R1", "Prime", "10", "10"]);
    assert_eq!(fields[8], "100.0"); // otd_pct
    assert_eq!(fields[9], "10.0"); // defect_rate_pct: 1 of 10 orders
    assert_eq!(fields[10], "100.0"); // first_attempt_pct
    assert_eq!(fields[12], "0.2"); // duration_vs_sla_hr: 8.2 h actual vs 8.0 h target
    assert_eq!(fields[13], "-5.0"); // zero traveled km vs 5.0 planned

    // Exactly one alert: the CRITICAL defect-rate breach, with measured and
    // target values embedded.
    let alert_lines: Vec<&str> = alerts.lines().collect();
    assert_eq!(alert_lines[0], "Date,Station,Route,KPI Alert,Details,Severity");
    assert_eq!(alert_lines.len(), 2);
    assert!(alert_lines[1].contains("Defect Rate too high"));
    assert!(alert_lines[1].contains("10.0%"));
    assert!(alert_lines[1].contains("2.0%"));
    assert!(alert_lines[1].ends_with("CRITICAL"));
}

#[test]
fn test_rerun_is_byte_identical() {
    let dir = tempdir().unwrap();
    write_prime_day_fixtures(dir.path());
    let first = run_to_files(dir.path());
    let second = run_to_files(dir.path());
    assert_eq!(first, second);
}

#[test]
fn test_output_independent_of_input_row_order() {
    let dir_a = tempdir().unwrap();
    write_prime_day_fixtures(dir_a.path());

    let dir_b = tempdir().unwrap();
    write_prime_day_fixtures(dir_b.path());
    for name in ["orders.csv", "gps_logs.csv"] {
        let path = dir_b.path().join(name);
        let content = fs::read_to_string(&path).unwrap();
        let mut lines: Vec<&str> = content.lines().collect();
        lines[1..].reverse();
        fs::write(&path, lines.join("\n") + "\n").unwrap();
    }

    assert_eq!(run_to_files(dir_a.path()), run_to_files(dir_b.path()));
}

#[test]
fn test_route_without_pings_propagates_nulls() {
    let dir = tempdir().unwrap();
    write_prime_day_fixtures(dir.path());

    // A second route with an order but no GPS coverage at all.
    let orders_path = dir.path().join("orders.csv");
    let mut orders = fs::read_to_string(&orders_path).unwrap();
    orders.push_str("O11,R2,S1,North,C1,2024-05-01 18:00:00,2024-05-01 15:00:00,1\n");
    fs::write(&orders_path, orders).unwrap();

    let routes_path = dir.path().join("routes.csv");
    let mut routes = fs::read_to_string(&routes_path).unwrap();
    routes.push_str(
        "R2,2024-05-01,S1,North,C1,Standard,2024-05-01 08:00:00,2024-05-01 17:00:00,80.0\n",
    );
    fs::write(&routes_path, routes).unwrap();

    let (kpis, _) = run_to_files(dir.path());
    let r2_line = kpis
        .lines()
        .find(|l| l.contains(",R2,"))
        .expect("R2 group present");
    let fields: Vec<&str> = r2_line.split(',').collect();
    assert_eq!(fields[12], ""); // duration_vs_sla_hr null, not zero
    assert_eq!(fields[13], ""); // dist_variance_km null
    assert_eq!(fields[14], ""); // idle_ratio_pct null
}

#[test]
fn test_missing_required_input_fails_before_output() {
    let dir = tempdir().unwrap();
    write_prime_day_fixtures(dir.path());
    fs::remove_file(dir.path().join("gps_logs.csv")).unwrap();

    let err = load_gps_logs(&dir.path().join("gps_logs.csv")).unwrap_err();
    assert!(err.to_string().contains("gps_logs.csv"));
    assert!(!dir.path().join("daily_kpis.csv").exists());
}

#[test]
fn test_absent_defects_file_means_no_defect_alerts() {
    let dir = tempdir().unwrap();
    write_prime_day_fixtures(dir.path());
    fs::remove_file(dir.path().join("defects.csv")).unwrap();

    let (kpis, alerts) = run_to_files(dir.path());
    let fields: Vec<&str> = kpis.lines().nth(1).unwrap().split(',').collect();
    assert_eq!(fields[9], "0.0"); // defect_rate_pct
    assert_eq!(alerts.lines().count(), 1); // header only
}
