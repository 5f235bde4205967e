//! Pipeline configuration: ping sampling interval, route-type SLA table, and
//! alert thresholds. Everything is explicit and injectable, with no
//! module-level mutable state, so tests can run with alternate tables.

use crate::error::PipelineError;
use crate::pipeline::alerts::Thresholds;
use crate::procurement::{CategorySlaTable, ProcurementThresholds};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Assumed spacing between consecutive GPS samples. Idle/active seconds are
/// derived from ping counts times this interval, not from timestamp deltas;
/// inferring the interval from data would change output values.
pub const DEFAULT_PING_INTERVAL_SECS: i64 = 60;

/// SLA hours applied when a route type has no entry in the table.
pub const DEFAULT_TARGET_HOURS: f64 = 8.0;

/// Route-type to SLA-hours lookup with a fixed default for unmapped types.
#[derive(Debug, Clone, Deserialize)]
pub struct SlaTable {
    #[serde(default = "default_targets")]
    pub targets: BTreeMap<String, f64>,
    #[serde(default = "default_target_hours")]
    pub default_hours: f64,
}

fn default_target_hours() -> f64 {
    DEFAULT_TARGET_HOURS
}

fn default_targets() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("Same-Day".to_string(), 6.5),
        ("Prime".to_string(), 8.0),
        ("Standard".to_string(), 9.0),
    ])
}

impl Default for SlaTable {
    fn default() -> Self {
        SlaTable {
            targets: default_targets(),
            default_hours: DEFAULT_TARGET_HOURS,
        }
    }
}

impl SlaTable {
    /// Target hours for a route type; unknown or missing types get the
    /// table default.
    pub fn target_hours(&self, route_type: Option<&str>) -> f64 {
        route_type
            .and_then(|t| self.targets.get(t).copied())
            .unwrap_or(self.default_hours)
    }
}

/// Full configuration for one pipeline run. Defaults match production
/// values; a JSON file can override any subset of fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ping_interval_secs: i64,
    pub sla: SlaTable,
    pub thresholds: Thresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            ping_interval_secs: DEFAULT_PING_INTERVAL_SECS,
            sla: SlaTable::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, PipelineError> {
        read_json_config(path)
    }
}

/// Configuration for the supplier procurement pipeline: category SLA days
/// and the four alert thresholds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcurementConfig {
    pub sla: CategorySlaTable,
    pub thresholds: ProcurementThresholds,
}

impl ProcurementConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, PipelineError> {
        read_json_config(path)
    }
}

fn read_json_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let raw = fs::read_to_string(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| PipelineError::Config {
        path: path.to_path_buf(),
        source,
    })
}
