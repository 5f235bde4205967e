//! Pipeline error taxonomy.
//!
//! Only structural failures abort a run: a missing required input, an
//! unreadable file, or CSV-level trouble. Malformed individual field values
//! are not errors; they are recovered to `None` during deserialization (see
//! [`crate::records`]) and flow through the null-skipping aggregation.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("missing required input: {path}")]
    MissingInput { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
