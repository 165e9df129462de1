use std::fmt;

use crate::config::GridDims;
use crate::error::{BudgetError, BudgetResult};

/// 0-based position of a cell in the structured grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub layer: usize,
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub fn new(layer: usize, row: usize, col: usize) -> Self {
        Cell { layer, row, col }
    }

    pub fn as_index(&self) -> [usize; 3] {
        [self.layer, self.row, self.col]
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(layer {}, row {}, col {})", self.layer, self.row, self.col)
    }
}

/// Maps flat cell ids to grid coordinates and back.
///
/// Cell ids follow row-major (layer, row, column) order, the same order the
/// budget file uses once its 1-based node numbers are shifted down by one.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateIndex {
    dims: GridDims,
    layer_stride: usize,
    cell_count: usize,
}

impl CoordinateIndex {
    pub fn new(dims: GridDims) -> Self {
        CoordinateIndex {
            dims,
            layer_stride: dims.cells_per_layer(),
            cell_count: dims.cell_count(),
        }
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    pub fn resolve(&self, cell_id: i64) -> BudgetResult<Cell> {
        if cell_id < 0 || cell_id as u64 >= self.cell_count as u64 {
            return Err(BudgetError::OutOfRange {
                cell_id,
                cell_count: self.cell_count,
            });
        }
        let id = cell_id as usize;
        let layer = id / self.layer_stride;
        let rem = id % self.layer_stride;
        Ok(Cell {
            layer,
            row: rem / self.dims.cols,
            col: rem % self.dims.cols,
        })
    }

    /// Inverse of [`resolve`](Self::resolve). The cell must lie inside the grid.
    pub fn flatten(&self, cell: Cell) -> usize {
        debug_assert!(
            cell.layer < self.dims.layers && cell.row < self.dims.rows && cell.col < self.dims.cols
        );
        cell.layer * self.layer_stride + cell.row * self.dims.cols + cell.col
    }
}
