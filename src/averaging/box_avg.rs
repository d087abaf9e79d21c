//! Unweighted box average over an axis aligned neighbourhood.

use crate::driver::ProgressObserver;
use crate::error::check_radius;
use crate::grid::{Grid, Pos, MAX_RANK};
use crate::{Float, SmoothResult};
use itertools::iproduct;

/// Inclusive `[start, end]` range of `coord +- radius` clipped to the axis.
#[inline(always)]
fn clip(coord: usize, radius: usize, extent: usize) -> (usize, usize) {
    (
        coord.saturating_sub(radius),
        (coord + radius).min(extent - 1),
    )
}

/// Mean of every cell within `radius` of `pos` on each axis, clipped to the
/// grid bounds. The neighbourhood always holds at least the cell itself.
pub fn average_point(grid: &Grid, pos: &Pos, radius: usize) -> Float {
    let dim = grid.dim();
    let mut bounds = [(0, 0); MAX_RANK];
    for (axis, b) in bounds.iter_mut().enumerate().take(dim.rank()) {
        *b = clip(pos.coord(axis), radius, dim.extent(axis));
    }
    let [(x0, x1), (y0, y1), (z0, z1)] = bounds;

    let values = grid.as_slice();
    let mut window_sum = 0.0;
    for (z, y) in iproduct!(z0..=z1, y0..=y1) {
        let row = dim.get_index(&Pos::new(x0, y, z));
        window_sum += values[row..=row + (x1 - x0)].iter().sum::<Float>();
    }
    let window_size = (x1 - x0 + 1) * (y1 - y0 + 1) * (z1 - z0 + 1);
    window_sum / window_size as Float
}

/// Box average of every cell, returned as a new grid of the same shape.
pub fn average_field(grid: &Grid, radius: i64) -> SmoothResult<Grid> {
    let radius = check_radius(radius)?;
    Ok(box_field(grid, radius, None))
}

pub(crate) fn box_field(
    grid: &Grid,
    radius: usize,
    observer: Option<&dyn ProgressObserver>,
) -> Grid {
    let mut out = Grid::zeros(grid.dim());
    let row_len = grid.dim().extent(0);
    for (ij, pos) in grid.dim().positions().enumerate() {
        out.as_mut_slice()[ij] = average_point(grid, &pos, radius);
        if let Some(obs) = observer {
            if pos.x() + 1 == row_len {
                obs.cells_done(row_len);
            }
        }
    }
    out
}
