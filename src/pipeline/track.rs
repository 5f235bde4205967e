//! Track reconstruction: derives actual route timing and traveled distance
//! from raw, unordered GPS pings.

use crate::pipeline::utility::group_by_key;
use crate::records::GpsPing;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::debug;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Per-route actuals reconstructed from the ping stream. A route with zero
/// usable pings gets no entry at all rather than a zero-filled record.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteActuals {
    pub actual_start: NaiveDateTime,
    pub actual_end: NaiveDateTime,
    pub idle_seconds: i64,
    pub active_seconds: i64,
    pub actual_km: f64,
}

impl RouteActuals {
    pub fn actual_hours(&self) -> f64 {
        (self.actual_end - self.actual_start).num_seconds() as f64 / 3600.0
    }
}

/// Great-circle distance between two points via the haversine formula.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Reconstructs [`RouteActuals`] for every route with at least one
/// timestamped ping.
///
/// Pings are sorted per route by timestamp; the sort is stable, so equal
/// timestamps keep their input order, which makes distance accumulation
/// deterministic. Idle and active seconds assume one ping every
/// `ping_interval_secs` (a configured constant, never inferred from the
/// data). Pings with a missing coordinate are skipped without breaking the
/// distance chain; pings with no timestamp are ignored entirely.
pub fn reconstruct_actuals(
    pings: &[GpsPing],
    ping_interval_secs: i64,
) -> BTreeMap<String, RouteActuals> {
    let by_route = group_by_key(
        pings.iter().filter(|p| p.ts.is_some()),
        |p| p.route_id.clone(),
    );

    let mut actuals = BTreeMap::new();
    for (route_id, mut route_pings) in by_route {
        route_pings.sort_by_key(|p| p.ts);

        let actual_start = route_pings.first().and_then(|p| p.ts);
        let actual_end = route_pings.last().and_then(|p| p.ts);
        let (Some(actual_start), Some(actual_end)) = (actual_start, actual_end) else {
            continue;
        };

        let idle_count = route_pings.iter().filter(|p| p.idle_flag).count() as i64;
        let active_count = route_pings.iter().filter(|p| p.engine_on).count() as i64;

        let mut actual_km = 0.0;
        let mut prev: Option<(f64, f64)> = None;
        for ping in &route_pings {
            let (Some(lat), Some(lon)) = (ping.lat, ping.lon) else {
                continue;
            };
            if let Some((prev_lat, prev_lon)) = prev {
                actual_km += haversine_km(prev_lat, prev_lon, lat, lon);
            }
            prev = Some((lat, lon));
        }

        debug!(
            route_id = %route_id,
            pings = route_pings.len(),
            actual_km,
            "route actuals reconstructed"
        );

        actuals.insert(
            route_id,
            RouteActuals {
                actual_start,
                actual_end,
                idle_seconds: idle_count * ping_interval_secs,
                active_seconds: active_count * ping_interval_secs,
                actual_km,
            },
        );
    }

    actuals
}
