use budget_rs::config::{GridDims, Precision, RunConfig, StepWindow};
use budget_rs::error::BudgetError;
use budget_rs::io::{BudgetSource, CellBudgetFile, RawRecord, TimeStepKey};
use budget_rs::pipeline;
use budget_rs::tensor::SpatialAxis;
use budget_rs::units::{ACRE_FEET_PER_CUBIC_METER, convert_units};

mod common;
use common::{CbcWriter, budget_path};

const RIVER: &str = "   RIVER LEAKAGE";

fn river_scenario(grid: GridDims) -> CbcWriter {
    CbcWriter::single(grid)
        .list(1, 1, "WELLS", &[(5, -3.0)])
        .list(2, 1, RIVER, &[(1, 10.0)])
        .list(2, 1, "WELLS", &[(5, -3.0)])
        .list(3, 1, RIVER, &[(218, 5.0), (218, -2.0)])
}

#[test]
fn river_leakage_scenario_from_file() {
    let grid = GridDims::new(2, 102, 217);
    let dir = tempfile::tempdir().unwrap();
    let path = budget_path(&dir, "model.ccf");
    river_scenario(grid).write(&path);

    let mut config = RunConfig::new(&path, grid, RIVER);
    config.threads = 1;
    let tensor = pipeline::run(&config, None).expect("run");

    assert_eq!(
        tensor.keys(),
        &[
            TimeStepKey::new(0, 0),
            TimeStepKey::new(1, 0),
            TimeStepKey::new(2, 0)
        ]
    );
    assert_eq!(tensor.data().dim(), (3, 2, 102, 217));
    assert_eq!(tensor.volume(0).unwrap().sum(), 0.0);
    assert_eq!(tensor.data()[[1, 0, 0, 0]], 10.0);
    assert_eq!(tensor.data()[[2, 0, 1, 0]], 3.0);
    assert_eq!(tensor.total_sum(), 13.0);
    assert_eq!(
        tensor.temporal_sum(0..tensor.len()).unwrap().sum(),
        tensor.total_sum()
    );
    assert_eq!(
        convert_units(tensor.total_sum(), ACRE_FEET_PER_CUBIC_METER),
        13.0 * ACRE_FEET_PER_CUBIC_METER
    );

    let collapsed = tensor.spatial_sum(SpatialAxis::Layer);
    assert_eq!(collapsed[[2, 1, 0]], 3.0);
}

#[test]
fn parallel_file_run_matches_sequential() {
    let grid = GridDims::new(2, 102, 217);
    let dir = tempfile::tempdir().unwrap();
    let path = budget_path(&dir, "model.ccf");
    river_scenario(grid).write(&path);

    let mut config = RunConfig::new(&path, grid, "river leakage");
    config.threads = 1;
    let sequential = pipeline::run(&config, None).unwrap();
    config.threads = 3;
    let parallel = pipeline::run(&config, None).unwrap();
    assert_eq!(sequential.keys(), parallel.keys());
    assert_eq!(sequential.data(), parallel.data());
}

#[test]
fn missing_component_fails_before_accumulating() {
    let grid = GridDims::new(2, 102, 217);
    let dir = tempfile::tempdir().unwrap();
    let path = budget_path(&dir, "model.ccf");
    river_scenario(grid).write(&path);

    let config = RunConfig::new(&path, grid, "STORAGE");
    let err = pipeline::run(&config, None).unwrap_err();
    match err {
        BudgetError::ComponentNotFound { name, available } => {
            assert_eq!(name, "STORAGE");
            assert!(available.contains("RIVER LEAKAGE"));
            assert!(available.contains("WELLS"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn grid_must_match_headers() {
    let grid = GridDims::new(2, 102, 217);
    let dir = tempfile::tempdir().unwrap();
    let path = budget_path(&dir, "model.ccf");
    river_scenario(grid).write(&path);

    let config = RunConfig::new(&path, GridDims::new(1, 102, 434), RIVER);
    assert!(matches!(
        pipeline::run(&config, None),
        Err(BudgetError::GridMismatch { .. })
    ));
}

#[test]
fn window_past_last_step_fails_before_accumulating() {
    let grid = GridDims::new(2, 102, 217);
    let dir = tempfile::tempdir().unwrap();
    let path = budget_path(&dir, "model.ccf");
    river_scenario(grid).write(&path);

    let mut config = RunConfig::new(&path, grid, RIVER);
    config.window = Some(StepWindow { start: 0, end: 5 });
    let pb = indicatif::ProgressBar::hidden();
    let err = pipeline::run(&config, Some(pb.clone())).unwrap_err();
    assert!(matches!(
        err,
        BudgetError::InvalidRange {
            start: 0,
            end: 5,
            steps: 3
        }
    ));
    assert_eq!(pb.position(), 0);

    config.window = Some(StepWindow { start: 1, end: 3 });
    let tensor = pipeline::run(&config, None).unwrap();
    assert_eq!(tensor.temporal_sum(1..3).unwrap().sum(), 13.0);
}

#[test]
fn node_zero_is_out_of_range_with_context() {
    let grid = GridDims::new(1, 2, 2);
    let dir = tempfile::tempdir().unwrap();
    let path = budget_path(&dir, "bad.cbc");
    CbcWriter::single(grid)
        .list(1, 1, "WELLS", &[(4, 1.0)])
        .list(1, 2, "WELLS", &[(2, 1.0), (0, 1.0)])
        .write(&path);

    let err = pipeline::run(&RunConfig::new(&path, grid, "WELLS"), None).unwrap_err();
    match err {
        BudgetError::RecordOutOfRange {
            key,
            record,
            cell_id,
            ..
        } => {
            assert_eq!(key, TimeStepKey::new(0, 1));
            assert_eq!(record, 1);
            assert_eq!(cell_id, -1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn double_precision_full_arrays_are_detected() {
    let grid = GridDims::new(1, 2, 2);
    let dir = tempfile::tempdir().unwrap();
    let path = budget_path(&dir, "double.cbc");
    CbcWriter::double(grid)
        .full_array(1, 1, "STORAGE", &[1.5, -2.0, 0.0, 4.25])
        .full_array(1, 2, "STORAGE", &[0.0, 0.5, 0.0, 0.0])
        .write(&path);

    let mut budget = CellBudgetFile::open(&path, Precision::Auto).unwrap();
    assert_eq!(budget.precision(), Precision::Double);
    assert_eq!(budget.times(), vec![None, None]);

    let records = budget
        .records(TimeStepKey::new(0, 0), "STORAGE")
        .unwrap()
        .unwrap();
    assert_eq!(
        records,
        vec![
            RawRecord::new(0, 1.5),
            RawRecord::new(1, -2.0),
            RawRecord::new(3, 4.25)
        ]
    );

    let tensor = pipeline::run(&RunConfig::new(&path, grid, "storage"), None).unwrap();
    assert_eq!(tensor.total_sum(), 4.25);
}

#[test]
fn double_precision_compact_lists_are_detected() {
    let grid = GridDims::new(1, 2, 2);
    let dir = tempfile::tempdir().unwrap();
    let path = budget_path(&dir, "double_list.cbc");
    CbcWriter::double(grid)
        .list(1, 1, "WELLS", &[(2, -0.125)])
        .list(2, 1, "WELLS", &[(3, 8.0)])
        .write(&path);

    let budget = CellBudgetFile::open(&path, Precision::Auto).unwrap();
    assert_eq!(budget.precision(), Precision::Double);
    assert_eq!(budget.times(), vec![Some(1.0), Some(2.0)]);
}

#[test]
fn layer_indicator_and_top_layer_records() {
    let grid = GridDims::new(2, 1, 3);
    let dir = tempfile::tempdir().unwrap();
    let path = budget_path(&dir, "recharge.cbc");
    CbcWriter::single(grid)
        .layer_indicator(1, 1, "RECHARGE", &[1, 2, 2], &[0.5, 0.0, 2.0])
        .top_layer(1, 1, "ET", &[-1.0, 0.0, -0.25])
        .write(&path);

    let mut budget = CellBudgetFile::open(&path, Precision::Single).unwrap();
    let key = TimeStepKey::new(0, 0);
    let recharge = budget.records(key, "RECHARGE").unwrap().unwrap();
    assert_eq!(recharge, vec![RawRecord::new(0, 0.5), RawRecord::new(5, 2.0)]);
    let et = budget.records(key, "ET").unwrap().unwrap();
    assert_eq!(et, vec![RawRecord::new(0, -1.0), RawRecord::new(2, -0.25)]);

    let tensor = pipeline::run(&RunConfig::new(&path, grid, "RECHARGE"), None).unwrap();
    assert_eq!(tensor.data()[[0, 1, 0, 2]], 2.0);
    assert_eq!(tensor.data()[[0, 0, 0, 0]], 0.5);
}

#[test]
fn aux_list_keeps_auxiliary_values() {
    let grid = GridDims::new(1, 1, 4);
    let dir = tempfile::tempdir().unwrap();
    let path = budget_path(&dir, "aux.cbc");
    CbcWriter::single(grid)
        .aux_list(
            1,
            1,
            "RIVER LEAKAGE",
            &["IFACE", "REACH"],
            &[(4, vec![1.5, 6.0, 1.0]), (4, vec![2.5, 6.0, 2.0])],
        )
        .write(&path);

    let mut budget = CellBudgetFile::open(&path, Precision::Auto).unwrap();
    assert_eq!(budget.headers()[0].aux_names, vec!["IFACE", "REACH"]);
    let records = budget
        .records(TimeStepKey::new(0, 0), RIVER)
        .unwrap()
        .unwrap();
    assert_eq!(records[1].cell_id, 3);
    assert_eq!(records[1].values, vec![2.5, 6.0, 2.0]);

    let tensor = pipeline::run(&RunConfig::new(&path, grid, RIVER), None).unwrap();
    assert_eq!(tensor.data()[[0, 0, 0, 3]], 4.0);
}

#[test]
fn truncated_archive_is_a_format_error() {
    let grid = GridDims::new(1, 2, 2);
    let dir = tempfile::tempdir().unwrap();
    let path = budget_path(&dir, "cut.cbc");
    let mut bytes = CbcWriter::single(grid)
        .list(1, 1, "WELLS", &[(1, 1.0), (2, 2.0)])
        .into_bytes();
    bytes.truncate(20);
    std::fs::write(&path, bytes).unwrap();

    assert!(matches!(
        CellBudgetFile::open(&path, Precision::Auto),
        Err(BudgetError::Format(_))
    ));
}

#[test]
fn empty_archive_has_no_components() {
    let grid = GridDims::new(1, 2, 2);
    let dir = tempfile::tempdir().unwrap();
    let path = budget_path(&dir, "empty.cbc");
    std::fs::write(&path, Vec::<u8>::new()).unwrap();

    let budget = CellBudgetFile::open(&path, Precision::Auto).unwrap();
    assert!(budget.time_steps().is_empty());
    assert_eq!(budget.grid(), None);
    drop(budget);

    assert!(matches!(
        pipeline::run(&RunConfig::new(&path, grid, "WELLS"), None),
        Err(BudgetError::ComponentNotFound { .. })
    ));
}
