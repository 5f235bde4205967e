//! Route-day aggregation: collapses enriched orders into one KPI row per
//! (route_date, station, region, carrier, route, route_type) group.

use crate::pipeline::join::EnrichedOrder;
use crate::pipeline::utility::{group_by_key, mean_present, round_to};
use chrono::NaiveDate;
use serde::Serialize;

/// The six-part grouping key. `route_date` and `route_type` come from the
/// route plan and stay `None` for orders whose plan never matched; such
/// orders still aggregate (into a null-keyed group) rather than vanishing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RouteDayKey {
    pub route_date: Option<NaiveDate>,
    pub station_id: String,
    pub region: String,
    pub carrier_id: String,
    pub route_id: String,
    pub route_type: Option<String>,
}

/// One aggregated KPI row. Rates are unrounded fractions; the percent
/// presentation columns live on [`DailyKpiRow`].
#[derive(Debug, Clone)]
pub struct RouteDayKpi {
    pub key: RouteDayKey,
    pub orders: u32,
    pub delivered: u32,
    pub otd: f64,
    pub defect_rate: f64,
    pub first_attempt: f64,
    pub stops_per_hour: f64,
    pub duration_vs_sla_hr: Option<f64>,
    pub dist_variance_km: Option<f64>,
    pub idle_ratio: Option<f64>,
}

/// Presentation row for the daily KPI table: percents rounded to 1 decimal
/// (2 for defect rate), hour/distance figures to 2.
#[derive(Debug, Clone, Serialize)]
pub struct DailyKpiRow {
    pub route_date: Option<NaiveDate>,
    pub station_id: String,
    pub region: String,
    pub carrier_id: String,
    pub route_id: String,
    pub route_type: Option<String>,
    pub orders: u32,
    pub delivered: u32,
    pub otd_pct: f64,
    pub defect_rate_pct: f64,
    pub first_attempt_pct: f64,
    pub stops_per_hour: f64,
    pub duration_vs_sla_hr: Option<f64>,
    pub dist_variance_km: Option<f64>,
    pub idle_ratio_pct: Option<f64>,
}

impl DailyKpiRow {
    /// Output column order for `daily_kpis.csv`; must track the struct's
    /// serde field order.
    pub const HEADERS: &'static [&'static str] = &[
        "route_date",
        "station_id",
        "region",
        "carrier_id",
        "route_id",
        "route_type",
        "orders",
        "delivered",
        "otd_pct",
        "defect_rate_pct",
        "first_attempt_pct",
        "stops_per_hour",
        "duration_vs_sla_hr",
        "dist_variance_km",
        "idle_ratio_pct",
    ];
}

impl RouteDayKpi {
    pub fn to_row(&self) -> DailyKpiRow {
        DailyKpiRow {
            route_date: self.key.route_date,
            station_id: self.key.station_id.clone(),
            region: self.key.region.clone(),
            carrier_id: self.key.carrier_id.clone(),
            route_id: self.key.route_id.clone(),
            route_type: self.key.route_type.clone(),
            orders: self.orders,
            delivered: self.delivered,
            otd_pct: round_to(self.otd * 100.0, 1),
            defect_rate_pct: round_to(self.defect_rate * 100.0, 2),
            first_attempt_pct: round_to(self.first_attempt * 100.0, 1),
            stops_per_hour: round_to(self.stops_per_hour, 2),
            duration_vs_sla_hr: self.duration_vs_sla_hr.map(|v| round_to(v, 2)),
            dist_variance_km: self.dist_variance_km.map(|v| round_to(v, 2)),
            idle_ratio_pct: self.idle_ratio.map(|v| round_to(v * 100.0, 1)),
        }
    }
}

/// Floor for the stops-per-hour denominator; avoids blow-up on near-zero
/// active time.
const MIN_ACTIVE_HOURS: f64 = 0.1;

/// Aggregates enriched orders into one [`RouteDayKpi`] per group, ordered
/// canonically by key so output is independent of input row order.
///
/// Every ratio is guarded: count denominators floor at 1, the active-hours
/// denominator floors at [`MIN_ACTIVE_HOURS`], and the mean-based KPIs skip
/// `None` inputs (staying `None` when every input is absent).
pub fn aggregate_route_days(enriched: &[EnrichedOrder]) -> Vec<RouteDayKpi> {
    let groups = group_by_key(enriched.iter(), |e| RouteDayKey {
        route_date: e.route_date,
        station_id: e.station_id.clone(),
        region: e.region.clone(),
        carrier_id: e.carrier_id.clone(),
        route_id: e.route_id.clone(),
        route_type: e.route_type.clone(),
    });

    groups
        .into_iter()
        .map(|(key, rows)| {
            let orders = rows.len() as u32;
            let delivered: u32 = rows.iter().map(|e| u32::from(e.delivered_flag)).sum();
            let on_time: u32 = rows.iter().map(|e| u32::from(e.on_time_flag)).sum();
            let defects: u32 = rows.iter().map(|e| u32::from(e.defect_flag)).sum();
            let first_attempts: u32 = rows.iter().map(|e| u32::from(e.first_attempt_flag)).sum();

            // One route has one active-hours value shared by all its orders;
            // max selects that single value robustly.
            let max_active_hours = rows.iter().map(|e| e.active_hours).fold(0.0, f64::max);

            RouteDayKpi {
                key,
                orders,
                delivered,
                otd: on_time as f64 / delivered.max(1) as f64,
                defect_rate: defects as f64 / orders.max(1) as f64,
                first_attempt: first_attempts as f64 / delivered.max(1) as f64,
                stops_per_hour: delivered as f64 / max_active_hours.max(MIN_ACTIVE_HOURS),
                duration_vs_sla_hr: mean_present(rows.iter().map(|e| e.duration_vs_sla)),
                dist_variance_km: mean_present(rows.iter().map(|e| e.dist_var_km)),
                idle_ratio: mean_present(rows.iter().map(|e| e.idle_ratio)),
            }
        })
        .collect()
}
