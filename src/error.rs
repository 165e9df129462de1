use std::path::PathBuf;

use thiserror::Error;

use crate::config::GridDims;
use crate::io::TimeStepKey;

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot open budget file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("format error: {0}")]
    Format(String),
    #[error("budget component '{name}' not found in archive (available: {available})")]
    ComponentNotFound { name: String, available: String },
    #[error("cell id {cell_id} outside grid of {cell_count} cells")]
    OutOfRange { cell_id: i64, cell_count: usize },
    #[error("time step {key}, record {record}: cell id {cell_id} outside grid of {cell_count} cells")]
    RecordOutOfRange {
        key: TimeStepKey,
        record: usize,
        cell_id: i64,
        cell_count: usize,
    },
    #[error("time step {key}, record {record}: malformed record: {reason}")]
    MalformedRecord {
        key: TimeStepKey,
        record: usize,
        reason: String,
    },
    #[error("grid mismatch: configured {expected}, archive has {found}")]
    GridMismatch { expected: GridDims, found: GridDims },
    #[error("invalid step range {start}..{end} for {steps} time steps")]
    InvalidRange {
        start: usize,
        end: usize,
        steps: usize,
    },
    #[error("layer {layer} outside grid with {layers} layers")]
    InvalidLayer { layer: usize, layers: usize },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type BudgetResult<T> = Result<T, BudgetError>;
