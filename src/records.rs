//! Input record types for the last-mile pipeline.
//!
//! One struct per input table, deserialized row-by-row from CSV. Fields that
//! may legitimately be empty, and fields whose values sometimes fail to parse
//! upstream, are modeled as `Option`: a malformed value is recovered to
//! `None` rather than failing the run, and `None` propagates through the
//! null-skipping aggregation downstream.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use tracing::debug;

/// A single vehicle position sample. One physical vehicle per route,
/// sampled at a fixed interval (see [`crate::config::PipelineConfig`]).
#[derive(Debug, Clone, Deserialize)]
pub struct GpsPing {
    pub route_id: String,
    #[serde(deserialize_with = "de_opt_datetime")]
    pub ts: Option<NaiveDateTime>,
    #[serde(deserialize_with = "de_opt_f64")]
    pub lat: Option<f64>,
    #[serde(deserialize_with = "de_opt_f64")]
    pub lon: Option<f64>,
    #[serde(deserialize_with = "de_bool")]
    pub idle_flag: bool,
    #[serde(deserialize_with = "de_bool")]
    pub engine_on: bool,
}

/// Planned route metadata, created upstream. `route_id` is unique per day.
#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    pub route_id: String,
    #[serde(deserialize_with = "de_opt_date")]
    pub route_date: Option<NaiveDate>,
    pub station_id: String,
    pub region: String,
    pub carrier_id: String,
    pub route_type: String,
    #[serde(deserialize_with = "de_opt_datetime")]
    pub planned_start: Option<NaiveDateTime>,
    #[serde(deserialize_with = "de_opt_datetime")]
    pub planned_end: Option<NaiveDateTime>,
    #[serde(deserialize_with = "de_opt_f64")]
    pub planned_km: Option<f64>,
}

/// A customer order, possibly undelivered.
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub route_id: String,
    pub station_id: String,
    pub region: String,
    pub carrier_id: String,
    #[serde(deserialize_with = "de_opt_datetime")]
    pub promised_at: Option<NaiveDateTime>,
    #[serde(deserialize_with = "de_opt_datetime")]
    pub delivered_at: Option<NaiveDateTime>,
    #[serde(deserialize_with = "de_opt_bool")]
    pub first_attempt: Option<bool>,
}

/// A defect report against an order. Only presence matters to the pipeline;
/// an order with any number of defects is flagged once.
#[derive(Debug, Clone, Deserialize)]
pub struct Defect {
    pub order_id: String,
    pub defect_type: String,
    #[serde(deserialize_with = "de_opt_datetime")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub resolved_at: Option<NaiveDateTime>,
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parses an optional float column; unparseable values become `None`.
pub(crate) fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(non_empty(raw).and_then(|s| match s.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            debug!(value = %s, "unparseable float treated as missing");
            None
        }
    }))
}

/// Parses an optional timestamp column, accepting the formats upstream
/// systems actually emit; unparseable values become `None`.
pub(crate) fn de_opt_datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(non_empty(raw).and_then(|s| match parse_datetime(&s) {
        Some(ts) => Some(ts),
        None => {
            debug!(value = %s, "unparseable timestamp treated as missing");
            None
        }
    }))
}

/// Parses an optional date column; unparseable values become `None`.
pub(crate) fn de_opt_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(non_empty(raw).and_then(|s| {
        // Some upstream exports put full timestamps in date columns.
        match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => match parse_datetime(&s) {
                Some(ts) => Some(ts.date()),
                None => {
                    debug!(value = %s, "unparseable date treated as missing");
                    None
                }
            },
        }
    }))
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    // Bare dates occur in timestamp columns; take midnight.
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Parses a required boolean-like column; anything unrecognized is `false`.
pub(crate) fn de_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(non_empty(raw)
        .and_then(|s| match parse_bool(&s) {
            Some(b) => Some(b),
            None => {
                debug!(value = %s, "unrecognized boolean treated as false");
                None
            }
        })
        .unwrap_or(false))
}

/// Parses a nullable boolean-like column; empty or unrecognized is `None`.
pub(crate) fn de_opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(non_empty(raw).and_then(|s| match parse_bool(&s) {
        Some(b) => Some(b),
        None => {
            debug!(value = %s, "unrecognized boolean treated as missing");
            None
        }
    }))
}
