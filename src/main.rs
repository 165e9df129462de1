use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;

mod cli;

use budget_rs::config::{Precision, RunConfig};
use budget_rs::io::{BudgetSource, CellBudgetFile};
use budget_rs::pipeline;
use budget_rs::tensor::FluxTensor;
use budget_rs::units::convert_units;
use cli::{Invocation, get_args};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match get_args()? {
        Invocation::List {
            budget_file,
            precision,
        } => list_budget(&budget_file, precision),
        Invocation::Run { config, unit_label } => run(&config, &unit_label),
    }
}

fn run(config: &RunConfig, unit_label: &str) -> Result<()> {
    println!("\nRun Configuration:");
    println!("  Budget file: {}", config.budget_file.display());
    println!("  Component: {}", config.component.trim());
    println!("  Grid (layers x rows x cols): {}", config.grid);
    println!("  Threads: {}", config.threads);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} steps ({eta})")?
            .progress_chars("#>-"),
    );

    println!("\nAccumulating cell fluxes...");
    let tensor = pipeline::run(config, Some(pb))
        .with_context(|| format!("Failed to process {:?}", config.budget_file))?;

    report(&tensor, config, unit_label)?;
    Ok(())
}

fn report(tensor: &FluxTensor, config: &RunConfig, unit_label: &str) -> Result<()> {
    let (steps, layers, rows, cols) = tensor.data().dim();
    println!("\nFlux array shape (steps, layers, rows, cols): ({}, {}, {}, {})", steps, layers, rows, cols);
    if tensor.is_empty() {
        println!("Budget file holds no time steps.");
        return Ok(());
    }
    if let (Some(first), Some(last)) = (tensor.keys().first(), tensor.keys().last()) {
        println!("  Time steps: {} .. {}", first, last);
    }

    let total = tensor.total_sum();
    println!("\nNet flux, all steps and cells: {}", total);
    println!(
        "  Converted ({}): {}",
        unit_label,
        convert_units(total, config.unit_factor)
    );

    if let Some(plan) = tensor.mean_plan_view() {
        let active = plan.iter().filter(|v| **v != 0.0).count();
        let min = plan.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = plan.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        println!("\nMean plan view (layers summed, averaged over steps):");
        println!("  Active cells: {} of {}", active, plan.len());
        println!("  Range: {} to {}", min, max);
    }

    if let Some(window) = config.window {
        let layer_sum = match config.layer {
            Some(layer) => tensor
                .layer_window_sum(layer, window.range())
                .context("Failed to sum layer window")?
                .sum(),
            None => tensor
                .temporal_sum(window.range())
                .context("Failed to sum step window")?
                .sum(),
        };
        let scope = match config.layer {
            Some(layer) => format!("layer {}", layer),
            None => "all layers".to_string(),
        };
        println!(
            "\nSteps [{}, {}) over {}: {}",
            window.start, window.end, scope, layer_sum
        );
        println!(
            "  Converted ({}): {}",
            unit_label,
            convert_units(layer_sum, config.unit_factor)
        );
    }
    Ok(())
}

fn list_budget(path: &Path, precision: Precision) -> Result<()> {
    let budget = CellBudgetFile::open(path, precision)
        .with_context(|| format!("Failed to open budget file: {:?}", path))?;

    println!("\nBudget file: {}", budget.path().display());
    println!("  Precision: {:?}", budget.precision());
    if let Some(grid) = budget.grid() {
        println!("  Grid (layers x rows x cols): {}", grid);
    }

    let mut counts: BTreeMap<String, (usize, i32)> = BTreeMap::new();
    for header in budget.headers() {
        let entry = counts.entry(header.name()).or_insert((0, header.method.code()));
        entry.0 += 1;
    }
    println!("\nComponents (records, storage method):");
    for (name, (count, method)) in &counts {
        println!("  {:<16} {:>6}  {}", name, count, method);
    }

    let steps = budget.time_steps();
    let times = budget.times();
    println!("\nTime steps: {}", steps.len());
    for (key, time) in steps.iter().zip(times) {
        match time {
            Some(t) => println!("  {}  t = {}", key, t),
            None => println!("  {}", key),
        }
    }
    Ok(())
}
