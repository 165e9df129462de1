use indicatif::ProgressBar;
use ndarray::{Array3, Array4, ArrayViewMut3, Axis};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::GridDims;
use crate::error::{BudgetError, BudgetResult};
use crate::grid::CoordinateIndex;
use crate::io::{BudgetSource, RawRecord, TimeStepKey};
use crate::tensor::FluxTensor;

// Steps whose records are held in memory at once, per worker
const PARALLEL_BATCH_PER_THREAD: usize = 4;

// A record reduced to what accumulation needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluxRecord {
    pub cell_id: i64,
    pub flux: f64,
}

/// Checks the shape of one raw record and pulls out its cell id and flux.
pub fn decode_record(
    key: TimeStepKey,
    record: usize,
    raw: &RawRecord,
) -> BudgetResult<FluxRecord> {
    let Some(&flux) = raw.values.first() else {
        return Err(BudgetError::MalformedRecord {
            key,
            record,
            reason: "record carries no flux value".to_string(),
        });
    };
    if !flux.is_finite() {
        return Err(BudgetError::MalformedRecord {
            key,
            record,
            reason: format!("flux {} is not a finite number", flux),
        });
    }
    Ok(FluxRecord {
        cell_id: raw.cell_id,
        flux,
    })
}

/// Builds the flux volume of one time step. Records sharing a cell add up.
pub fn accumulate_step(
    index: &CoordinateIndex,
    key: TimeStepKey,
    records: &[RawRecord],
) -> BudgetResult<Array3<f64>> {
    let mut volume = Array3::<f64>::zeros(index.dims().shape());
    accumulate_into(index, key, records, volume.view_mut())?;
    Ok(volume)
}

/// Adds the records of one time step onto `volume` in place.
pub fn accumulate_into(
    index: &CoordinateIndex,
    key: TimeStepKey,
    records: &[RawRecord],
    mut volume: ArrayViewMut3<f64>,
) -> BudgetResult<()> {
    for (i, raw) in records.iter().enumerate() {
        let rec = decode_record(key, i, raw)?;
        let cell = index.resolve(rec.cell_id).map_err(|err| match err {
            BudgetError::OutOfRange {
                cell_id,
                cell_count,
            } => BudgetError::RecordOutOfRange {
                key,
                record: i,
                cell_id,
                cell_count,
            },
            other => other,
        })?;
        volume[cell.as_index()] += rec.flux;
    }
    Ok(())
}

/// Pulls one budget component out of a source, step by step, into a
/// [`FluxTensor`].
pub struct FluxAccumulator {
    index: CoordinateIndex,
    component: String,
    threads: usize,
    progress: Option<ProgressBar>,
}

impl FluxAccumulator {
    pub fn new(dims: GridDims, component: &str) -> Self {
        FluxAccumulator {
            index: CoordinateIndex::new(dims),
            component: component.to_string(),
            threads: 1,
            progress: None,
        }
    }

    /// Accumulate steps on `threads` workers once records are read. `1` keeps
    /// everything on the calling thread.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn run(&self, source: &mut dyn BudgetSource) -> BudgetResult<FluxTensor> {
        let keys = source.time_steps();
        let dims = self.index.dims();
        if keys.is_empty() {
            info!("budget has no time steps, returning empty tensor");
            let data = Array4::zeros((0, dims.layers, dims.rows, dims.cols));
            return Ok(FluxTensor::new(Vec::new(), data));
        }

        if let Some(pb) = &self.progress {
            pb.set_length(keys.len() as u64);
        }

        let mut data = Array4::<f64>::zeros((keys.len(), dims.layers, dims.rows, dims.cols));
        if self.threads > 1 {
            self.run_parallel(source, &keys, &mut data)?;
        } else {
            self.run_sequential(source, &keys, &mut data)?;
        }

        if let Some(pb) = &self.progress {
            pb.finish_with_message("done");
        }
        info!(
            component = %self.component,
            steps = keys.len(),
            "accumulation complete"
        );
        Ok(FluxTensor::new(keys, data))
    }

    fn run_sequential(
        &self,
        source: &mut dyn BudgetSource,
        keys: &[TimeStepKey],
        data: &mut Array4<f64>,
    ) -> BudgetResult<()> {
        for (&key, volume) in keys.iter().zip(data.outer_iter_mut()) {
            let records = self.fetch(source, key)?;
            accumulate_into(&self.index, key, &records, volume)?;
            self.tick();
        }
        Ok(())
    }

    // Reading stays on this thread since the source owns a single file
    // handle; only the per-step sums fan out. Records are read one batch of
    // steps at a time and each worker writes its own step's slab of `data`.
    fn run_parallel(
        &self,
        source: &mut dyn BudgetSource,
        keys: &[TimeStepKey],
        data: &mut Array4<f64>,
    ) -> BudgetResult<()> {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(self.threads).build()?;
        let batch = self.threads * PARALLEL_BATCH_PER_THREAD;

        for (batch_keys, mut slab) in keys
            .chunks(batch)
            .zip(data.axis_chunks_iter_mut(Axis(0), batch))
        {
            let mut raw = Vec::with_capacity(batch_keys.len());
            for &key in batch_keys {
                raw.push(self.fetch(source, key)?);
            }
            let volumes: Vec<ArrayViewMut3<f64>> = slab.outer_iter_mut().collect();

            pool.install(|| {
                volumes
                    .into_par_iter()
                    .zip(batch_keys.par_iter())
                    .zip(raw.par_iter())
                    .try_for_each(|((volume, &key), records)| {
                        accumulate_into(&self.index, key, records, volume)?;
                        self.tick();
                        Ok::<_, BudgetError>(())
                    })
            })?;
        }
        Ok(())
    }

    fn fetch(
        &self,
        source: &mut dyn BudgetSource,
        key: TimeStepKey,
    ) -> BudgetResult<Vec<RawRecord>> {
        match source.records(key, &self.component)? {
            Some(records) => {
                debug!(step = %key, records = records.len(), "read step");
                Ok(records)
            }
            None => {
                debug!(step = %key, component = %self.component, "component absent for step");
                Ok(Vec::new())
            }
        }
    }

    fn tick(&self) {
        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
    }
}
