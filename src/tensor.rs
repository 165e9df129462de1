//! The accumulated flux array and the read-only queries built on it.
//!
//! Every time window taken by these queries is half-open: `start..end`
//! covers steps `start, start + 1, ..., end - 1` in archive order, so
//! `10..20` is ten steps and excludes step 20.

use std::ops::Range;

use ndarray::{Array2, Array3, Array4, ArrayView3, Axis, s};

use crate::config::GridDims;
use crate::error::{BudgetError, BudgetResult};
use crate::io::TimeStepKey;

/// Spatial axis of a flux volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialAxis {
    Layer,
    Row,
    Column,
}

impl SpatialAxis {
    // Position within the (time, layer, row, col) tensor
    fn tensor_axis(self) -> Axis {
        match self {
            SpatialAxis::Layer => Axis(1),
            SpatialAxis::Row => Axis(2),
            SpatialAxis::Column => Axis(3),
        }
    }
}

/// Flux per (time step, layer, row, col), in the units of the budget file.
#[derive(Debug, Clone)]
pub struct FluxTensor {
    keys: Vec<TimeStepKey>,
    data: Array4<f64>,
}

impl FluxTensor {
    pub(crate) fn new(keys: Vec<TimeStepKey>, data: Array4<f64>) -> Self {
        debug_assert_eq!(keys.len(), data.len_of(Axis(0)));
        FluxTensor { keys, data }
    }

    /// Time step labels of axis 0.
    pub fn keys(&self) -> &[TimeStepKey] {
        &self.keys
    }

    pub fn data(&self) -> &Array4<f64> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn dims(&self) -> GridDims {
        let (_, layers, rows, cols) = self.data.dim();
        GridDims::new(layers, rows, cols)
    }

    pub fn volume(&self, step: usize) -> Option<ArrayView3<'_, f64>> {
        (step < self.len()).then(|| self.data.index_axis(Axis(0), step))
    }

    /// Sums out one spatial axis, keeping time and the other two.
    pub fn spatial_sum(&self, axis: SpatialAxis) -> Array3<f64> {
        self.data.sum_axis(axis.tensor_axis())
    }

    /// Sums steps `range.start..range.end` (half-open) into one volume.
    /// An empty range gives zeros.
    pub fn temporal_sum(&self, range: Range<usize>) -> BudgetResult<Array3<f64>> {
        self.check_range(&range)?;
        Ok(self
            .data
            .slice(s![range.start..range.end, .., .., ..])
            .sum_axis(Axis(0)))
    }

    /// Mean volume over all steps, `None` when there are none.
    pub fn temporal_mean(&self) -> Option<Array3<f64>> {
        self.data.mean_axis(Axis(0))
    }

    /// Net flux over every step and cell. Inflow and outflow cancel.
    pub fn total_sum(&self) -> f64 {
        self.data.sum()
    }

    /// One layer summed over a half-open step window, as a (row, col) map.
    pub fn layer_window_sum(&self, layer: usize, range: Range<usize>) -> BudgetResult<Array2<f64>> {
        self.check_range(&range)?;
        let layers = self.dims().layers;
        if layer >= layers {
            return Err(BudgetError::InvalidLayer { layer, layers });
        }
        Ok(self
            .data
            .slice(s![range.start..range.end, layer, .., ..])
            .sum_axis(Axis(0)))
    }

    /// Layers collapsed, then averaged over time: the mean plan-view map.
    pub fn mean_plan_view(&self) -> Option<Array2<f64>> {
        self.spatial_sum(SpatialAxis::Layer).mean_axis(Axis(0))
    }

    fn check_range(&self, range: &Range<usize>) -> BudgetResult<()> {
        if range.start > range.end || range.end > self.len() {
            return Err(BudgetError::InvalidRange {
                start: range.start,
                end: range.end,
                steps: self.len(),
            });
        }
        Ok(())
    }
}
