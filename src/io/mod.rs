use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BudgetResult;

pub mod cbc;
pub mod memory;

pub use cbc::CellBudgetFile;
pub use memory::MemoryBudget;

/// A recorded simulation instant, 0-based (time step within stress period).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeStepKey {
    pub step: usize,
    pub period: usize,
}

impl TimeStepKey {
    pub fn new(step: usize, period: usize) -> Self {
        TimeStepKey { step, period }
    }
}

impl fmt::Display for TimeStepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.step, self.period)
    }
}

/// One entry of a budget component as the source delivers it.
///
/// `values[0]` is the flux; anything after it is auxiliary data.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub cell_id: i64,
    pub values: Vec<f64>,
}

impl RawRecord {
    pub fn new(cell_id: i64, flux: f64) -> Self {
        RawRecord {
            cell_id,
            values: vec![flux],
        }
    }
}

/// Read access to a cell-by-cell budget archive.
pub trait BudgetSource {
    /// Every recorded time step, in archive order.
    fn time_steps(&self) -> Vec<TimeStepKey>;

    /// Normalized names of every component present anywhere in the archive.
    fn component_names(&self) -> BTreeSet<String>;

    /// Records for `component` at `key`, or `None` when the component was not
    /// written for that step.
    fn records(&mut self, key: TimeStepKey, component: &str)
    -> BudgetResult<Option<Vec<RawRecord>>>;
}

/// Budget labels are fixed-width and space padded; compare them trimmed and
/// upper-cased.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_labels_normalize_to_the_same_name() {
        assert_eq!(normalize_name("   RIVER LEAKAGE"), "RIVER LEAKAGE");
        assert_eq!(normalize_name("river leakage "), "RIVER LEAKAGE");
    }

    #[test]
    fn keys_display_as_step_period_pairs() {
        assert_eq!(TimeStepKey::new(3, 1).to_string(), "(3, 1)");
    }
}
