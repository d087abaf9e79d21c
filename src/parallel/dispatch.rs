//! Worker-pool dispatch of per-cell averaging.
//!
//! Coordinates are split into contiguous chunks and mapped over a dedicated
//! rayon pool. Every unit of work carries the flat index of the cell it
//! belongs to, and results are scattered back by that index, so completion
//! order never matters.

use crate::averaging::{CellFn, PerCellAverager};
use crate::driver::ProgressObserver;
use crate::error::check_radius;
use crate::grid::{Grid, Pos};
use crate::parallel::run_cell;
use crate::{Float, SmoothError, SmoothResult};
use rayon::prelude::*;
use tracing::debug;

pub struct ParallelDispatcher {
    workers: usize,
    pool: rayon::ThreadPool,
}

impl ParallelDispatcher {
    pub fn new(workers: usize) -> SmoothResult<ParallelDispatcher> {
        if workers == 0 {
            return Err(SmoothError::invalid("worker count must be at least 1"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("smooth-worker-{}", i))
            .build()
            .map_err(|e| SmoothError::WorkerFailure(format!("could not start pool: {}", e)))?;
        Ok(ParallelDispatcher { workers, pool })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// `max(1, total / (4 * workers))`. Never 0.
    pub fn chunk_size(&self, total_cells: usize) -> usize {
        (total_cells / (4 * self.workers)).max(1)
    }

    /// Runs `per_cell(grid, pos, radius)` for every cell on the pool and
    /// returns the reassembled grid.
    pub fn map_average<F>(&self, grid: &Grid, radius: i64, per_cell: F) -> SmoothResult<Grid>
    where
        F: Fn(&Grid, &Pos, usize) -> Float + Sync,
    {
        let radius = check_radius(radius)?;
        let mut out = Grid::zeros(grid.dim());
        self.map_cells(
            grid,
            &mut out,
            &|g: &Grid, pos: &Pos| -> SmoothResult<Float> { Ok(per_cell(g, pos, radius)) },
            None,
        )?;
        Ok(out)
    }
}

impl PerCellAverager for ParallelDispatcher {
    fn name(&self) -> &'static str {
        "pool"
    }

    fn map_cells(
        &self,
        input: &Grid,
        output: &mut Grid,
        cell_fn: &CellFn<'_>,
        observer: Option<&dyn ProgressObserver>,
    ) -> SmoothResult<()> {
        if !input.same_shape(output) {
            return Err(SmoothError::invalid("output grid shape differs from input"));
        }
        let total = input.len();
        let chunk_size = self.chunk_size(total);
        let dim = input.dim();
        debug!(
            "dispatching {} cells to {} workers in chunks of {}",
            total, self.workers, chunk_size
        );

        let batches: Vec<Vec<(usize, Float)>> = self.pool.install(|| {
            (0..total)
                .into_par_iter()
                .chunks(chunk_size)
                .map(|chunk| {
                    let tagged = chunk
                        .into_iter()
                        .map(|ij| {
                            let pos = dim.pos_of(ij);
                            run_cell(cell_fn, input, &pos).map(|v| (ij, v))
                        })
                        .collect::<SmoothResult<Vec<_>>>()?;
                    if let Some(obs) = observer {
                        obs.cells_done(tagged.len());
                    }
                    Ok(tagged)
                })
                .collect::<SmoothResult<Vec<_>>>()
        })?;

        let out = output.as_mut_slice();
        for (ij, value) in batches.into_iter().flatten() {
            out[ij] = value;
        }
        Ok(())
    }
}
