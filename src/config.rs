use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BudgetError, BudgetResult};
use crate::units::IDENTITY_FACTOR;

// Structured grid dimensions, in the order the budget file nests them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    pub layers: usize,
    pub rows: usize,
    pub cols: usize,
}

impl GridDims {
    pub fn new(layers: usize, rows: usize, cols: usize) -> Self {
        GridDims { layers, rows, cols }
    }

    pub fn cell_count(&self) -> usize {
        self.layers * self.rows * self.cols
    }

    pub fn cells_per_layer(&self) -> usize {
        self.rows * self.cols
    }

    /// `None` when the cell count does not fit in a `usize`.
    pub fn checked_cell_count(&self) -> Option<usize> {
        self.layers
            .checked_mul(self.rows)
            .and_then(|n| n.checked_mul(self.cols))
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.layers, self.rows, self.cols)
    }

    pub fn validate(&self) -> BudgetResult<()> {
        if self.layers == 0 || self.rows == 0 || self.cols == 0 {
            return Err(BudgetError::Invalid(format!(
                "grid dimensions must be positive, got {}",
                self
            )));
        }
        if self.checked_cell_count().is_none() {
            return Err(BudgetError::Invalid(format!("grid {} is too large", self)));
        }
        Ok(())
    }
}

impl fmt::Display for GridDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.layers, self.rows, self.cols)
    }
}

// Floating point width of the reals stored in the budget file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Auto,
    Single,
    Double,
}

// Half-open window of time steps, [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepWindow {
    pub start: usize,
    pub end: usize,
}

impl StepWindow {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

// Everything a run needs; nothing is read from globals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub budget_file: PathBuf,
    pub grid: GridDims,
    pub component: String,
    #[serde(default = "default_unit_factor")]
    pub unit_factor: f64,
    #[serde(default)]
    pub precision: Precision,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default)]
    pub window: Option<StepWindow>,
    #[serde(default)]
    pub layer: Option<usize>,
}

fn default_unit_factor() -> f64 {
    IDENTITY_FACTOR
}

fn default_threads() -> usize {
    num_cpus::get()
}

impl RunConfig {
    pub fn new(budget_file: impl Into<PathBuf>, grid: GridDims, component: &str) -> Self {
        RunConfig {
            budget_file: budget_file.into(),
            grid,
            component: component.to_string(),
            unit_factor: default_unit_factor(),
            precision: Precision::Auto,
            threads: default_threads(),
            window: None,
            layer: None,
        }
    }

    pub fn from_json_file(path: &Path) -> BudgetResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| BudgetError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content)
            .map_err(|e| BudgetError::Invalid(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> BudgetResult<()> {
        self.grid.validate()?;
        if self.component.trim().is_empty() {
            return Err(BudgetError::Invalid(
                "budget component name must not be empty".to_string(),
            ));
        }
        if !self.unit_factor.is_finite() {
            return Err(BudgetError::Invalid(format!(
                "unit conversion factor must be finite, got {}",
                self.unit_factor
            )));
        }
        if self.threads == 0 {
            return Err(BudgetError::Invalid("threads must be at least 1".to_string()));
        }
        if let Some(window) = self.window {
            if window.start > window.end {
                return Err(BudgetError::Invalid(format!(
                    "step window start {} is after end {}",
                    window.start, window.end
                )));
            }
        }
        if let Some(layer) = self.layer {
            if layer >= self.grid.layers {
                return Err(BudgetError::InvalidLayer {
                    layer,
                    layers: self.grid.layers,
                });
            }
        }
        Ok(())
    }
}
