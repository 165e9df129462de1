use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use std::path::PathBuf;

use budget_rs::config::{GridDims, Precision, RunConfig, StepWindow};
use budget_rs::units::UnitConversion;

/// Extract one budget component from a MODFLOW cell-by-cell budget file
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Cell-by-cell budget file (.cbc / .ccf)
    budget_file: Option<PathBuf>,

    /// JSON run configuration; flags given on the command line override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Grid dimensions as layers,rows,cols (e.g. 2,102,217)
    #[arg(short, long, value_parser = parse_grid)]
    grid: Option<GridDims>,

    /// Budget component label, e.g. "RIVER LEAKAGE"
    #[arg(short = 'n', long)]
    component: Option<String>,

    /// Named conversion applied to reported totals
    #[arg(long, value_enum, default_value_t = UnitConversion::None)]
    convert: UnitConversion,

    /// Custom conversion factor, overrides --convert
    #[arg(long)]
    factor: Option<f64>,

    /// Real width used in the budget file
    #[arg(long, value_enum)]
    precision: Option<Precision>,

    /// Worker threads for accumulation
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// First step of the reported window (0-based, inclusive)
    #[arg(long, requires = "end")]
    start: Option<usize>,

    /// End of the reported window (0-based, exclusive)
    #[arg(long, requires = "start")]
    end: Option<usize>,

    /// Layer to map over the window (0-based)
    #[arg(long)]
    layer: Option<usize>,

    /// List components and time steps in the file, then exit
    #[arg(long)]
    list: bool,
}

pub enum Invocation {
    List {
        budget_file: PathBuf,
        precision: Precision,
    },
    Run {
        config: RunConfig,
        unit_label: String,
    },
}

pub fn get_args() -> Result<Invocation> {
    let args = Args::parse();

    let file_config = match &args.config {
        Some(path) => Some(
            RunConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config: {:?}", path))?,
        ),
        None => None,
    };

    let budget_file = args
        .budget_file
        .clone()
        .or_else(|| file_config.as_ref().map(|c| c.budget_file.clone()))
        .ok_or_else(|| anyhow!("no budget file given (positional argument or config file)"))?;

    if args.list {
        let precision = args
            .precision
            .or(file_config.as_ref().map(|c| c.precision))
            .unwrap_or_default();
        return Ok(Invocation::List {
            budget_file,
            precision,
        });
    }

    let mut config = match file_config {
        Some(mut config) => {
            config.budget_file = budget_file;
            if let Some(grid) = args.grid {
                config.grid = grid;
            }
            if let Some(component) = &args.component {
                config.component = component.clone();
            }
            config
        }
        None => {
            let grid = args.grid.ok_or_else(|| anyhow!("--grid is required"))?;
            let component = args
                .component
                .as_deref()
                .ok_or_else(|| anyhow!("--component is required"))?;
            RunConfig::new(budget_file, grid, component)
        }
    };

    let unit_label = if let Some(factor) = args.factor {
        config.unit_factor = factor;
        format!("model units x {}", factor)
    } else if args.convert != UnitConversion::None {
        config.unit_factor = args.convert.factor();
        args.convert.label().to_string()
    } else if config.unit_factor != UnitConversion::None.factor() {
        format!("model units x {}", config.unit_factor)
    } else {
        UnitConversion::None.label().to_string()
    };

    if let Some(precision) = args.precision {
        config.precision = precision;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let (Some(start), Some(end)) = (args.start, args.end) {
        config.window = Some(StepWindow { start, end });
    }
    if args.layer.is_some() {
        config.layer = args.layer;
    }

    config.validate().context("Invalid run configuration")?;
    Ok(Invocation::Run { config, unit_label })
}

fn parse_grid(value: &str) -> Result<GridDims> {
    let parts = value
        .split([',', 'x'])
        .map(|p| p.trim().parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("grid '{}' must be three integers", value))?;
    match parts.as_slice() {
        [layers, rows, cols] => {
            let grid = GridDims::new(*layers, *rows, *cols);
            grid.validate()?;
            Ok(grid)
        }
        _ => bail!("grid '{}' must be layers,rows,cols", value),
    }
}
