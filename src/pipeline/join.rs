//! Record joining: orders left-joined with routes, route actuals, and
//! defects.
//!
//! Left-outer semantics throughout: every order yields exactly one
//! [`EnrichedOrder`] even when its route plan or GPS actuals are missing;
//! the route-level fields just stay `None`.

use crate::config::SlaTable;
use crate::pipeline::track::RouteActuals;
use crate::records::{Defect, Order, Route};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One order augmented with delivery flags and route-level derived metrics.
#[derive(Debug, Clone)]
pub struct EnrichedOrder {
    pub order_id: String,
    pub route_id: String,
    pub station_id: String,
    pub region: String,
    pub carrier_id: String,

    // From the joined Route; None when the plan is missing.
    pub route_date: Option<NaiveDate>,
    pub route_type: Option<String>,

    pub delivered_flag: u8,
    pub on_time_flag: u8,
    pub first_attempt_flag: u8,
    pub defect_flag: u8,

    /// 0.0 (not None) when actuals are absent; feeds the stops-per-hour
    /// floor downstream.
    pub active_hours: f64,
    pub idle_ratio: Option<f64>,
    pub target_hours: f64,
    pub actual_hours: Option<f64>,
    pub duration_vs_sla: Option<f64>,
    pub dist_var_km: Option<f64>,
}

/// Joins every order against its route plan, reconstructed actuals, and the
/// defect set, producing one [`EnrichedOrder`] per input order.
///
/// The order-to-route join requires all four of (route_id, station_id, region,
/// carrier_id) to match; a route_id collision across stations is a
/// non-match. Actuals join on route_id alone.
pub fn enrich_orders(
    orders: &[Order],
    routes: &[Route],
    actuals: &BTreeMap<String, RouteActuals>,
    defects: &[Defect],
    sla: &SlaTable,
) -> Vec<EnrichedOrder> {
    let route_index: HashMap<(&str, &str, &str, &str), &Route> = routes
        .iter()
        .map(|r| {
            (
                (
                    r.route_id.as_str(),
                    r.station_id.as_str(),
                    r.region.as_str(),
                    r.carrier_id.as_str(),
                ),
                r,
            )
        })
        .collect();

    let defective_orders: HashSet<&str> = defects.iter().map(|d| d.order_id.as_str()).collect();

    orders
        .iter()
        .map(|order| {
            let route = route_index
                .get(&(
                    order.route_id.as_str(),
                    order.station_id.as_str(),
                    order.region.as_str(),
                    order.carrier_id.as_str(),
                ))
                .copied();
            let route_actuals = actuals.get(&order.route_id);
            enrich_one(order, route, route_actuals, &defective_orders, sla)
        })
        .collect()
}

fn enrich_one(
    order: &Order,
    route: Option<&Route>,
    actuals: Option<&RouteActuals>,
    defective_orders: &HashSet<&str>,
    sla: &SlaTable,
) -> EnrichedOrder {
    let delivered_flag = u8::from(order.delivered_at.is_some());
    let on_time_flag = match (order.delivered_at, order.promised_at) {
        (Some(delivered), Some(promised)) => u8::from(delivered <= promised),
        _ => 0,
    };
    let first_attempt_flag = u8::from(order.first_attempt.unwrap_or(false));
    let defect_flag = u8::from(defective_orders.contains(order.order_id.as_str()));

    let route_type = route.map(|r| r.route_type.clone());
    let target_hours = sla.target_hours(route_type.as_deref());

    let active_hours = actuals.map_or(0.0, |a| a.active_seconds as f64 / 3600.0);
    let idle_ratio = actuals.and_then(|a| {
        if a.active_seconds == 0 {
            None
        } else {
            Some(a.idle_seconds as f64 / a.active_seconds as f64)
        }
    });
    let actual_hours = actuals.map(RouteActuals::actual_hours);
    let duration_vs_sla = actual_hours.map(|h| h - target_hours);
    let dist_var_km = match (actuals, route.and_then(|r| r.planned_km)) {
        (Some(a), Some(planned)) => Some(a.actual_km - planned),
        _ => None,
    };

    EnrichedOrder {
        order_id: order.order_id.clone(),
        route_id: order.route_id.clone(),
        station_id: order.station_id.clone(),
        region: order.region.clone(),
        carrier_id: order.carrier_id.clone(),
        route_date: route.and_then(|r| r.route_date),
        route_type,
        delivered_flag,
        on_time_flag,
        first_attempt_flag,
        defect_flag,
        active_hours,
        idle_ratio,
        target_hours,
        actual_hours,
        duration_vs_sla,
        dist_var_km,
    }
}
