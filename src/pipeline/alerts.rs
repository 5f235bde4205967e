//! Alert evaluation: turns KPI deviations into typed, severity-ranked,
//! human-readable alerts.
//!
//! Evaluation is a pure function of (KPI row, thresholds). Rules run in a
//! fixed order so identical input always yields an identically ordered alert
//! sequence, and a missing KPI value never fires its rule; absence of data
//! is not a violation.

use crate::pipeline::aggregate::RouteDayKpi;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alert severity, ordered least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Alert thresholds for the last-mile KPI rules. Injected into the
/// evaluator; defaults match production values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// On-time-delivery rate below this warns.
    pub otd_min: f64,
    /// Defect rate above this is critical.
    pub defect_max: f64,
    /// First-attempt rate below this warns.
    pub first_attempt_min: f64,
    /// Idle ratio above this is informational.
    pub idle_ratio_max: f64,
    /// Absolute distance variance (km) above this is informational.
    pub dist_var_max_km: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            otd_min: 0.95,
            defect_max: 0.02,
            first_attempt_min: 0.95,
            idle_ratio_max: 0.25,
            dist_var_max_km: 10.0,
        }
    }
}

/// A single operational alert, serialized to the friendly alert table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    #[serde(rename = "Date")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "Station")]
    pub station: String,
    #[serde(rename = "Route")]
    pub route: String,
    #[serde(rename = "KPI Alert")]
    pub name: String,
    #[serde(rename = "Details")]
    pub details: String,
    #[serde(rename = "Severity")]
    pub severity: Severity,
}

impl Alert {
    /// Output column order for the friendly alert table.
    pub const HEADERS: &'static [&'static str] =
        &["Date", "Station", "Route", "KPI Alert", "Details", "Severity"];
}

/// Evaluates one KPI row against all five rules, in fixed order:
/// OTD, defect rate, first attempt, idle ratio, distance variance.
pub fn evaluate_row(kpi: &RouteDayKpi, thresholds: &Thresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let emit = |alerts: &mut Vec<Alert>, name: String, details: String, severity: Severity| {
        alerts.push(Alert {
            date: kpi.key.route_date,
            station: kpi.key.station_id.clone(),
            route: kpi.key.route_id.clone(),
            name,
            details,
            severity,
        });
    };

    if kpi.otd < thresholds.otd_min {
        emit(
            &mut alerts,
            "On-Time Delivery below target".to_string(),
            format!(
                "OTD was {:.1}% vs target {:.1}%",
                kpi.otd * 100.0,
                thresholds.otd_min * 100.0
            ),
            Severity::Warn,
        );
    }

    if kpi.defect_rate > thresholds.defect_max {
        emit(
            &mut alerts,
            "Defect Rate too high".to_string(),
            format!(
                "Defect Rate was {:.1}% vs target {:.1}%",
                kpi.defect_rate * 100.0,
                thresholds.defect_max * 100.0
            ),
            Severity::Critical,
        );
    }

    if kpi.first_attempt < thresholds.first_attempt_min {
        emit(
            &mut alerts,
            "First-Attempt Delivery below target".to_string(),
            format!(
                "First attempt success was {:.1}% vs target {:.1}%",
                kpi.first_attempt * 100.0,
                thresholds.first_attempt_min * 100.0
            ),
            Severity::Warn,
        );
    }

    if let Some(idle_ratio) = kpi.idle_ratio {
        if idle_ratio > thresholds.idle_ratio_max {
            emit(
                &mut alerts,
                "Idle Time High".to_string(),
                format!(
                    "Idle time ratio was {:.1}% vs target {:.1}%",
                    idle_ratio * 100.0,
                    thresholds.idle_ratio_max * 100.0
                ),
                Severity::Info,
            );
        }
    }

    if let Some(dist_var) = kpi.dist_variance_km {
        if dist_var.abs() > thresholds.dist_var_max_km {
            let direction = if dist_var > 0.0 { "over" } else { "under" };
            emit(
                &mut alerts,
                format!("Distance {direction} plan"),
                format!(
                    "Actual distance was {:.1} km {} plan (threshold {:.1} km)",
                    dist_var.abs(),
                    direction,
                    thresholds.dist_var_max_km
                ),
                Severity::Info,
            );
        }
    }

    alerts
}

/// Evaluates every KPI row, concatenating alerts in row order.
pub fn evaluate_all(kpis: &[RouteDayKpi], thresholds: &Thresholds) -> Vec<Alert> {
    kpis.iter()
        .flat_map(|kpi| evaluate_row(kpi, thresholds))
        .collect()
}
