//! Grid-of-tasks averaging, shaped like a GPU kernel launch.
//!
//! Every output cell is its own task reading only the input buffer. Tasks
//! are grouped into spatial blocks of `threads_per_block` cells per axis,
//! and each block is one rayon task. Threads of edge blocks that fall
//! outside the grid do nothing. Input and output are always two different
//! owned buffers; after each full pass they swap roles.

use crate::averaging::box_avg::average_point;
use crate::averaging::gauss::gauss_tap;
use crate::averaging::window::Window;
use crate::averaging::{CellFn, PerCellAverager};
use crate::driver::ProgressObserver;
use crate::grid::{Grid, GridDim, Pos, MAX_RANK};
use crate::parallel::run_cell;
use crate::{Float, SmoothError, SmoothResult};
use itertools::iproduct;
use rayon::prelude::*;
use tracing::debug;

pub const DEFAULT_THREADS_PER_BLOCK: usize = 8;

/// Upper bound on the threads of one block, over all axes.
pub const MAX_THREADS_PER_BLOCK: usize = 1024;

/// Threads per block and blocks per grid for each axis of a grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchGeometry {
    pub threads_per_block: Vec<usize>,
    pub blocks_per_grid: Vec<usize>,
}

impl LaunchGeometry {
    /// Fails if `threads_per_block^rank` is 0 or above `MAX_THREADS_PER_BLOCK`.
    pub fn for_dim(dim: &GridDim, threads_per_block: usize) -> SmoothResult<LaunchGeometry> {
        let block_len = u32::try_from(dim.rank())
            .ok()
            .and_then(|rank| threads_per_block.checked_pow(rank));
        match block_len {
            Some(n) if n > 0 && n <= MAX_THREADS_PER_BLOCK => {}
            _ => {
                return Err(SmoothError::InvalidParameter(format!(
                    "{} threads per block over {} axes exceeds {} threads",
                    threads_per_block,
                    dim.rank(),
                    MAX_THREADS_PER_BLOCK
                )));
            }
        }
        let tpb = threads_per_block;
        Ok(LaunchGeometry {
            threads_per_block: vec![tpb; dim.rank()],
            blocks_per_grid: dim
                .extents()
                .iter()
                .map(|&n| (n + tpb - 1) / tpb)
                .collect(),
        })
    }

    /// Threads in one block.
    pub fn block_len(&self) -> usize {
        self.threads_per_block.iter().product()
    }

    pub fn block_count(&self) -> usize {
        self.blocks_per_grid.iter().product()
    }

    /// Total launched threads; at least the number of cells.
    pub fn thread_count(&self) -> usize {
        self.block_len() * self.block_count()
    }

    /// In-grid cells covered by block `block`, blocks numbered x fastest.
    pub fn block_cells(&self, dim: &GridDim, block: usize) -> impl Iterator<Item = Pos> {
        let mut lo = [0; MAX_RANK];
        let mut hi = [1; MAX_RANK];
        let mut rest = block;
        for axis in 0..self.blocks_per_grid.len() {
            let tpb = self.threads_per_block[axis];
            let b = rest % self.blocks_per_grid[axis];
            rest /= self.blocks_per_grid[axis];
            lo[axis] = b * tpb;
            hi[axis] = ((b + 1) * tpb).min(dim.extent(axis));
        }
        iproduct!(lo[2]..hi[2], lo[1]..hi[1], lo[0]..hi[0]).map(|(z, y, x)| Pos::new(x, y, z))
    }
}

pub struct GridKernelAverager {
    threads_per_block: usize,
    scratch: Option<Grid>,
}

impl GridKernelAverager {
    pub fn new(threads_per_block: usize) -> SmoothResult<GridKernelAverager> {
        if threads_per_block == 0 || threads_per_block > MAX_THREADS_PER_BLOCK {
            return Err(SmoothError::invalid(format!(
                "threads per block must be in 1..={}, got {}",
                MAX_THREADS_PER_BLOCK, threads_per_block
            )));
        }
        Ok(GridKernelAverager {
            threads_per_block,
            scratch: None,
        })
    }

    pub fn launch_geometry(&self, dim: &GridDim) -> SmoothResult<LaunchGeometry> {
        LaunchGeometry::for_dim(dim, self.threads_per_block)
    }

    /// Whether a second buffer is being kept between passes.
    pub fn has_scratch(&self) -> bool {
        self.scratch.is_some()
    }

    fn take_scratch(&mut self, dim: &GridDim) -> Grid {
        match self.scratch.take() {
            Some(buf) if buf.dim() == dim => buf,
            _ => Grid::zeros(dim),
        }
    }

    /// One box pass. The returned grid is the buffer that was written;
    /// `input` is kept as the next pass's output buffer.
    pub fn box_pass(
        &mut self,
        input: Grid,
        radius: usize,
        observer: Option<&dyn ProgressObserver>,
    ) -> SmoothResult<Grid> {
        let mut front = input;
        let mut back = self.take_scratch(front.dim());
        self.map_cells(
            &front,
            &mut back,
            &|g: &Grid, pos: &Pos| -> SmoothResult<Float> { Ok(average_point(g, pos, radius)) },
            observer,
        )?;
        std::mem::swap(&mut front, &mut back);
        self.scratch = Some(back);
        Ok(front)
    }

    /// One Gaussian pass: a full-grid launch per axis (x, y, z), swapping
    /// buffers between launches.
    pub fn gauss_pass(
        &mut self,
        input: Grid,
        window: &Window,
        observer: Option<&dyn ProgressObserver>,
    ) -> SmoothResult<Grid> {
        let mut front = input;
        let mut back = self.take_scratch(front.dim());
        for axis in 0..front.rank() {
            self.map_cells(
                &front,
                &mut back,
                &|g: &Grid, pos: &Pos| -> SmoothResult<Float> {
                    Ok(gauss_tap(g, pos, axis, window))
                },
                observer,
            )?;
            std::mem::swap(&mut front, &mut back);
        }
        self.scratch = Some(back);
        Ok(front)
    }
}

impl PerCellAverager for GridKernelAverager {
    fn name(&self) -> &'static str {
        "grid_kernel"
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
        let dim = input.dim();
        let geometry = self.launch_geometry(dim)?;
        debug!(
            "launching {:?} blocks of {:?} threads",
            geometry.blocks_per_grid, geometry.threads_per_block
        );

        let blocks: Vec<Vec<Float>> = (0..geometry.block_count())
            .into_par_iter()
            .map(|block| {
                let values = geometry
                    .block_cells(dim, block)
                    .map(|pos| run_cell(cell_fn, input, &pos))
                    .collect::<SmoothResult<Vec<Float>>>()?;
                if let Some(obs) = observer {
                    obs.cells_done(values.len());
                }
                Ok(values)
            })
            .collect::<SmoothResult<Vec<_>>>()?;

        // every cell belongs to exactly one block, so each slot is written once
        let out = output.as_mut_slice();
        for (block, values) in blocks.into_iter().enumerate() {
            for (pos, value) in geometry.block_cells(dim, block).zip(values) {
                out[dim.get_index(&pos)] = value;
            }
        }
        Ok(())
    }
}
