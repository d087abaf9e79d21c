//! Separable Gaussian averaging.
//!
//! The 1D window is run along x, then y, then z. Each axis pass reads the
//! complete output of the previous one, never the original input.

use crate::averaging::window::Window;
use crate::driver::ProgressObserver;
use crate::grid::{Grid, Pos};
use crate::{Float, SmoothResult};

/// Gaussian average of `grid` with the window built from `sigma`.
pub fn gauss_average(grid: &Grid, sigma: Float) -> SmoothResult<Grid> {
    let window = Window::new(sigma)?;
    Ok(gauss_average_with(grid, &window, None))
}

/// Same as [`gauss_average`] with a prebuilt window.
pub fn gauss_average_with(
    grid: &Grid,
    window: &Window,
    observer: Option<&dyn ProgressObserver>,
) -> Grid {
    let mut src = grid.clone();
    let mut dst = Grid::zeros(grid.dim());
    for axis in 0..grid.rank() {
        axis_pass(&src, &mut dst, axis, window, observer);
        std::mem::swap(&mut src, &mut dst);
    }
    src
}

/// One axis pass, line by line, from `src` into `dst`.
pub(crate) fn axis_pass(
    src: &Grid,
    dst: &mut Grid,
    axis: usize,
    window: &Window,
    observer: Option<&dyn ProgressObserver>,
) {
    let dim = src.dim().clone();
    if !cfg!(feature = "unchecked") {
        assert_eq!(&dim, dst.dim());
    }
    let extent = dim.extent(axis);
    let stride = dim.stride(axis);
    let values = src.as_slice();
    let mut line: Vec<Float> = Vec::with_capacity(extent);

    for start in dim.line_starts(axis) {
        let base = dim.get_index(&start);
        line.clear();
        line.extend((0..extent).map(|i| values[base + i * stride]));

        let out = dst.as_mut_slice();
        for c in 0..extent {
            out[base + c * stride] = window.apply(extent, c, |i| line[i]);
        }
        if let Some(obs) = observer {
            obs.cells_done(extent);
        }
    }
}

/// Value of a single cell after filtering along `axis`. Used by the
/// parallel backends, which treat every cell as an independent task.
#[inline(always)]
pub fn gauss_tap(grid: &Grid, pos: &Pos, axis: usize, window: &Window) -> Float {
    let dim = grid.dim();
    let stride = dim.stride(axis);
    let base = dim.get_index(&pos.with_coord(axis, 0));
    let values = grid.as_slice();
    window.apply(dim.extent(axis), pos.coord(axis), |i| values[base + i * stride])
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::SmoothError;
    use approx::assert_relative_eq;

    #[test]
    fn border_renormalization() {
        let grid = Grid::from_rows(&[vec![0.0, 0.0, 0.0, 0.0, 10.0]]).unwrap();
        let wnd = Window::new(0.3).unwrap();
        assert_eq!(wnd.radius(), 1);
        let w = wnd.weights();
        let out = gauss_average(&grid, 0.3).unwrap();
        assert_relative_eq!(
            out.get(&Pos::from((4, 0))),
            (0.0 * w[0] + 10.0 * w[1]) / (w[0] + w[1])
        );
        assert_relative_eq!(out.get(&Pos::from((0, 0))), 0.0);
    }

    #[test]
    fn flat_field_unchanged() {
        for extents in &[vec![7], vec![5, 4], vec![4, 3, 5]] {
            let grid = Grid::filled(extents, 2.5).unwrap();
            let out = gauss_average(&grid, 1.1).unwrap();
            assert!(out.same_shape(&grid));
            for v in out.as_slice() {
                assert_relative_eq!(*v, 2.5, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn passes_are_sequential() {
        // A spike smoothed along x then y spreads into a separable product.
        let mut grid = Grid::filled(&[5, 5], 0.0).unwrap();
        grid.set(&Pos::from((2, 2)), 1.0);
        let wnd = Window::new(0.5).unwrap();
        let out = gauss_average_with(&grid, &wnd, None);
        let line: Vec<Float> = (0..5).map(|i| if i == 2 { 1.0 } else { 0.0 }).collect();
        let profile: Vec<Float> = (0..5).map(|c| wnd.apply(5, c, |i| line[i])).collect();
        for y in 0..5 {
            for x in 0..5 {
                assert_relative_eq!(
                    out.get(&Pos::from((x, y))),
                    profile[x] * profile[y],
                    epsilon = 1e-14
                );
            }
        }
    }

    #[test]
    fn tap_matches_line_pass() {
        let grid = Grid::from_fn(&[6, 5, 4], |p| {
            ((p.x() * 7 + p.y() * 3 + p.z() * 11) % 13) as Float
        })
        .unwrap();
        let wnd = Window::new(0.8).unwrap();
        for axis in 0..3 {
            let mut dst = Grid::zeros(grid.dim());
            axis_pass(&grid, &mut dst, axis, &wnd, None);
            for pos in grid.dim().positions() {
                assert_eq!(dst.get(&pos), gauss_tap(&grid, &pos, axis, &wnd));
            }
        }
    }

    #[test]
    fn bad_sigma() {
        let grid = Grid::filled(&[3], 1.0).unwrap();
        assert!(matches!(
            gauss_average(&grid, 0.0),
            Err(SmoothError::InvalidParameter(_))
        ));
        assert!(matches!(
            gauss_average(&grid, -0.5),
            Err(SmoothError::InvalidParameter(_))
        ));
        // would give NaN weights or an unallocatable window
        for sigma in &[1e-309, 1e19] {
            assert!(matches!(
                gauss_average(&grid, *sigma),
                Err(SmoothError::InvalidParameter(_))
            ));
        }
    }
}
