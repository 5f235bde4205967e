//! CSV loading and atomic table writing.
//!
//! Loaders fail fast with a named [`PipelineError::MissingInput`] when a
//! required file is absent; the defects table is the one optional input (an
//! absent file means an empty set). Writers go through a temp file and a
//! rename, so a failed run never leaves a partial output table behind.

use crate::error::PipelineError;
use crate::procurement::ProcurementOrder;
use crate::records::{Defect, GpsPing, Order, Route};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info};

fn load_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingInput {
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut rows = Vec::new();
    let mut rdr = csv::Reader::from_reader(file);
    for result in rdr.deserialize() {
        let record: T = result.map_err(|source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(record);
    }

    debug!(path = %path.display(), rows = rows.len(), "loaded CSV");
    Ok(rows)
}

pub fn load_orders(path: &Path) -> Result<Vec<Order>, PipelineError> {
    load_csv(path)
}

pub fn load_routes(path: &Path) -> Result<Vec<Route>, PipelineError> {
    load_csv(path)
}

pub fn load_gps_logs(path: &Path) -> Result<Vec<GpsPing>, PipelineError> {
    load_csv(path)
}

pub fn load_procurement_orders(path: &Path) -> Result<Vec<ProcurementOrder>, PipelineError> {
    load_csv(path)
}

/// Defects are optional; a missing file is an empty set, not an error.
pub fn load_defects(path: &Path) -> Result<Vec<Defect>, PipelineError> {
    if !path.exists() {
        info!(path = %path.display(), "defects file absent, using empty set");
        return Ok(Vec::new());
    }
    load_csv(path)
}

/// Writes a full table atomically: serialize to `<path>.tmp`, then rename
/// into place. Headers are written explicitly so an empty table still
/// carries its column names.
pub fn write_table<T: Serialize>(
    path: &Path,
    headers: &[&str],
    rows: &[T],
) -> Result<(), PipelineError> {
    let io_err = |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    };
    let csv_err = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let tmp_path = path.with_extension("tmp");
    {
        let file = File::create(&tmp_path).map_err(io_err)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(headers).map_err(csv_err)?;
        for row in rows {
            writer.serialize(row).map_err(csv_err)?;
        }
        writer.flush().map_err(io_err)?;
    }
    fs::rename(&tmp_path, path).map_err(io_err)?;

    info!(path = %path.display(), rows = rows.len(), "wrote table");
    Ok(())
}
