use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("metric '{metric}' not found in KPI table")]
    MetricNotFound { metric: String },

    #[error("metric '{metric}' is ambiguous: {matches} rows match")]
    MetricAmbiguous { metric: String, matches: usize },

    #[error("dataset '{dataset}' has no column '{column}'")]
    MissingColumn { dataset: String, column: String },

    #[error("failed to parse {}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {field} - {details}")]
    InvalidConfig { field: String, details: String },
}
