//! Extracts one budget component from a MODFLOW cell-by-cell budget file
//! into a dense (time step, layer, row, col) flux array and aggregates it.

pub mod accumulate;
pub mod config;
pub mod error;
pub mod grid;
pub mod io;
pub mod pipeline;
pub mod tensor;
pub mod units;

pub use accumulate::{
    FluxAccumulator, FluxRecord, accumulate_into, accumulate_step, decode_record,
};
pub use config::{GridDims, Precision, RunConfig, StepWindow};
pub use error::{BudgetError, BudgetResult};
pub use grid::{Cell, CoordinateIndex};
pub use io::{BudgetSource, CellBudgetFile, MemoryBudget, RawRecord, TimeStepKey};
pub use tensor::{FluxTensor, SpatialAxis};
