use indicatif::ProgressBar;
use tracing::info;

use crate::accumulate::FluxAccumulator;
use crate::config::{GridDims, RunConfig, StepWindow};
use crate::error::{BudgetError, BudgetResult};
use crate::io::{BudgetSource, CellBudgetFile, normalize_name};
use crate::tensor::FluxTensor;

/// Fails unless `component` shows up somewhere in the archive. A component
/// missing from individual steps is fine; one missing everywhere is a
/// configuration error.
pub fn ensure_component(source: &dyn BudgetSource, component: &str) -> BudgetResult<()> {
    let names = source.component_names();
    if names.contains(&normalize_name(component)) {
        return Ok(());
    }
    Err(BudgetError::ComponentNotFound {
        name: component.trim().to_string(),
        available: names.into_iter().collect::<Vec<_>>().join(", "),
    })
}

pub fn ensure_grid(expected: GridDims, found: Option<GridDims>) -> BudgetResult<()> {
    match found {
        Some(found) if found != expected => Err(BudgetError::GridMismatch { expected, found }),
        _ => Ok(()),
    }
}

/// Fails when a step window reaches past the `steps` the archive holds.
pub fn ensure_window(window: Option<StepWindow>, steps: usize) -> BudgetResult<()> {
    match window {
        Some(StepWindow { start, end }) if start > end || end > steps => {
            Err(BudgetError::InvalidRange { start, end, steps })
        }
        _ => Ok(()),
    }
}

/// Validates the component and accumulates it from any source.
pub fn extract(
    source: &mut dyn BudgetSource,
    grid: GridDims,
    component: &str,
    threads: usize,
    progress: Option<ProgressBar>,
) -> BudgetResult<FluxTensor> {
    grid.validate()?;
    ensure_component(source, component)?;
    let mut accumulator = FluxAccumulator::new(grid, component).with_threads(threads);
    if let Some(pb) = progress {
        accumulator = accumulator.with_progress(pb);
    }
    accumulator.run(source)
}

/// Opens the budget file named by `config`, checks it against the configured
/// grid and component, and builds the flux tensor. The file is closed before
/// this returns, whether it succeeds or not.
pub fn run(config: &RunConfig, progress: Option<ProgressBar>) -> BudgetResult<FluxTensor> {
    config.validate()?;
    let mut budget = CellBudgetFile::open(&config.budget_file, config.precision)?;
    ensure_grid(config.grid, budget.grid())?;
    ensure_window(config.window, budget.time_steps().len())?;
    info!(
        component = %config.component,
        grid = %config.grid,
        threads = config.threads,
        "extracting budget component"
    );
    extract(
        &mut budget,
        config.grid,
        &config.component,
        config.threads,
        progress,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MemoryBudget, RawRecord, TimeStepKey};

    #[test]
    fn component_absent_everywhere_is_fatal() {
        let mut budget = MemoryBudget::new();
        budget.add_records(TimeStepKey::new(0, 0), "WELLS", vec![RawRecord::new(0, 1.0)]);
        let err = extract(&mut budget, GridDims::new(1, 1, 1), "RIVER LEAKAGE", 1, None).unwrap_err();
        match err {
            BudgetError::ComponentNotFound { name, available } => {
                assert_eq!(name, "RIVER LEAKAGE");
                assert_eq!(available, "WELLS");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn component_absent_in_some_steps_gives_zero_volumes() {
        let mut budget = MemoryBudget::new();
        budget.add_records(TimeStepKey::new(0, 0), "WELLS", vec![RawRecord::new(0, -2.0)]);
        budget.add_records(TimeStepKey::new(0, 1), "STORAGE", vec![RawRecord::new(0, 1.0)]);
        let tensor = extract(&mut budget, GridDims::new(1, 1, 2), "  wells", 1, None).unwrap();
        assert_eq!(tensor.len(), 2);
        assert_eq!(tensor.volume(1).unwrap().sum(), 0.0);
        assert_eq!(tensor.total_sum(), -2.0);
    }

    #[test]
    fn window_must_fit_the_archive() {
        assert!(ensure_window(None, 0).is_ok());
        assert!(ensure_window(Some(StepWindow { start: 1, end: 3 }), 3).is_ok());
        assert!(ensure_window(Some(StepWindow { start: 3, end: 3 }), 3).is_ok());
        assert!(matches!(
            ensure_window(Some(StepWindow { start: 0, end: 5 }), 3),
            Err(BudgetError::InvalidRange {
                start: 0,
                end: 5,
                steps: 3
            })
        ));
    }

    #[test]
    fn grid_mismatch_is_reported() {
        let expected = GridDims::new(2, 102, 217);
        assert!(ensure_grid(expected, Some(expected)).is_ok());
        assert!(ensure_grid(expected, None).is_ok());
        assert!(matches!(
            ensure_grid(expected, Some(GridDims::new(1, 102, 217))),
            Err(BudgetError::GridMismatch { .. })
        ));
    }
}
