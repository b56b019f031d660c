//! Error types for the clustering passes.

use thiserror::Error;

/// Errors reported by cluster configuration and the two clustering passes.
///
/// A pass that returns an error never publishes its output: the previously
/// published grid or light assignment stays in place.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("invalid cluster configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid camera projection: {0}")]
    InvalidProjection(String),

    #[error("failed to parse cluster configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("failed to spawn worker for depth slice {slice}: {source}")]
    WorkerSpawn {
        slice: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("worker for depth slice {slice} panicked")]
    WorkerPanicked { slice: usize },

    #[error("only {completed} of {expected} depth slices completed")]
    IncompletePass { completed: usize, expected: usize },

    #[error("light assignment requested before a cluster grid was built")]
    GridNotBuilt,
}

pub type Result<T> = std::result::Result<T, ClusterError>;
