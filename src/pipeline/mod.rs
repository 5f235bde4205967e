//! The last-mile KPI pipeline.
//!
//! Four stages, strictly forward-flowing: track reconstruction, record
//! joining, route-day aggregation, and alert evaluation. Every stage is a
//! pure transformation of already-loaded records; output order is canonical
//! (sorted by group key), never input-arrival order.

pub mod aggregate;
pub mod alerts;
pub mod join;
pub mod track;
pub mod utility;

use crate::config::PipelineConfig;
use crate::pipeline::aggregate::{DailyKpiRow, aggregate_route_days};
use crate::pipeline::alerts::{Alert, evaluate_all};
use crate::pipeline::join::enrich_orders;
use crate::pipeline::track::reconstruct_actuals;
use crate::records::{Defect, GpsPing, Order, Route};
use tracing::info;

/// Runs the full pipeline over pre-loaded inputs, producing the daily KPI
/// table and the friendly alert table.
pub fn run(
    orders: &[Order],
    routes: &[Route],
    pings: &[GpsPing],
    defects: &[Defect],
    config: &PipelineConfig,
) -> (Vec<DailyKpiRow>, Vec<Alert>) {
    let actuals = reconstruct_actuals(pings, config.ping_interval_secs);
    info!(routes_with_pings = actuals.len(), "track reconstruction done");

    let enriched = enrich_orders(orders, routes, &actuals, defects, &config.sla);
    let kpis = aggregate_route_days(&enriched);
    info!(
        enriched_orders = enriched.len(),
        route_day_groups = kpis.len(),
        "aggregation done"
    );

    let alerts = evaluate_all(&kpis, &config.thresholds);
    info!(alerts = alerts.len(), "alert evaluation done");

    let rows = kpis.iter().map(|k| k.to_row()).collect();
    (rows, alerts)
}
