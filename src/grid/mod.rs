use crate::{Float, SmoothError, SmoothResult};
use itertools::iproduct;

/// Highest rank a grid may have.
pub const MAX_RANK: usize = 3;

/// A cell coordinate. Axes past the grid's rank are always 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pos {
    coords: [usize; MAX_RANK],
}

impl Pos {
    pub fn new(x: usize, y: usize, z: usize) -> Pos {
        Pos { coords: [x, y, z] }
    }
    pub fn x(&self) -> usize {
        self.coords[0]
    }
    pub fn y(&self) -> usize {
        self.coords[1]
    }
    pub fn z(&self) -> usize {
        self.coords[2]
    }
    #[inline(always)]
    pub fn coord(&self, axis: usize) -> usize {
        self.coords[axis]
    }
    /// Same position with one axis moved to `value`.
    #[inline(always)]
    pub fn with_coord(&self, axis: usize, value: usize) -> Pos {
        let mut coords = self.coords;
        coords[axis] = value;
        Pos { coords }
    }
}

impl From<usize> for Pos {
    fn from(x: usize) -> Pos {
        Pos::new(x, 0, 0)
    }
}

impl From<(usize, usize)> for Pos {
    fn from((x, y): (usize, usize)) -> Pos {
        Pos::new(x, y, 0)
    }
}

impl From<(usize, usize, usize)> for Pos {
    fn from((x, y, z): (usize, usize, usize)) -> Pos {
        Pos::new(x, y, z)
    }
}

/// Shape of a grid. Axis 0 is horizontal (x), axis 1 vertical (y),
/// axis 2 depth (z).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridDim {
    rank: usize,
    extents: [usize; MAX_RANK],
}

impl GridDim {
    pub fn new(extents: &[usize]) -> SmoothResult<GridDim> {
        let rank = extents.len();
        if rank == 0 || rank > MAX_RANK {
            return Err(SmoothError::UnsupportedRank(rank));
        }
        let mut padded = [1; MAX_RANK];
        padded[..rank].copy_from_slice(extents);
        Ok(GridDim {
            rank,
            extents: padded,
        })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Extents of the real axes only.
    pub fn extents(&self) -> &[usize] {
        &self.extents[..self.rank]
    }

    #[inline(always)]
    pub fn extent(&self, axis: usize) -> usize {
        self.extents[axis]
    }

    pub fn len(&self) -> usize {
        self.extents.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distance in the flat vec between neighbours along `axis`.
    #[inline(always)]
    pub fn stride(&self, axis: usize) -> usize {
        self.extents[..axis].iter().product()
    }

    #[inline(always)]
    pub fn get_index(&self, pos: &Pos) -> usize {
        // The grid is one flat vec with x varying fastest, so a 2D grid
        // looks like
        // ----------------------------------
        // |   [0]    |   [1]    |   [2]    |
        // |   y: 0   |   y: 0   |   y: 0   |
        // |   x: 0   |   x: 1   |   x: 2   |
        // ----------------------------------
        // |   [3]    |   [4]    |   [5]    |
        // |   y: 1   |   y: 1   |   y: 1   |
        // |   x: 0   |   x: 1   |   x: 2   |
        // ----------------------------------
        // and a 3D grid stacks such planes along z.
        if !cfg!(feature = "unchecked") {
            assert!(pos.x() < self.extents[0]);
            assert!(pos.y() < self.extents[1]);
            assert!(pos.z() < self.extents[2]);
        }
        pos.x() + self.extents[0] * (pos.y() + self.extents[1] * pos.z())
    }

    /// Inverse of `get_index`.
    #[inline(always)]
    pub fn pos_of(&self, index: usize) -> Pos {
        let nx = self.extents[0];
        let ny = self.extents[1];
        Pos::new(index % nx, (index / nx) % ny, index / (nx * ny))
    }

    /// Every position in flat-vec order.
    pub fn positions(&self) -> impl Iterator<Item = Pos> {
        let [nx, ny, nz] = self.extents;
        iproduct!(0..nz, 0..ny, 0..nx).map(|(z, y, x)| Pos::new(x, y, z))
    }

    /// Start of every 1D line running along `axis`.
    pub fn line_starts(&self, axis: usize) -> impl Iterator<Item = Pos> + '_ {
        self.positions().filter(move |pos| pos.coord(axis) == 0)
    }
}

/// Dense scalar field of rank 1, 2 or 3.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    data: Vec<Float>,
    dim: GridDim,
}

impl Grid {
    pub fn new(extents: &[usize], data: Vec<Float>) -> SmoothResult<Grid> {
        let dim = GridDim::new(extents)?;
        if data.len() != dim.len() {
            return Err(SmoothError::invalid(format!(
                "grid of shape {:?} needs {} values, got {}",
                extents,
                dim.len(),
                data.len()
            )));
        }
        Ok(Grid { data, dim })
    }

    pub fn zeros(dim: &GridDim) -> Grid {
        Grid {
            data: vec![0.0; dim.len()],
            dim: dim.clone(),
        }
    }

    pub fn filled(extents: &[usize], value: Float) -> SmoothResult<Grid> {
        let dim = GridDim::new(extents)?;
        Ok(Grid {
            data: vec![value; dim.len()],
            dim,
        })
    }

    pub fn from_fn<F>(extents: &[usize], mut f: F) -> SmoothResult<Grid>
    where
        F: FnMut(&Pos) -> Float,
    {
        let dim = GridDim::new(extents)?;
        let data = dim.positions().map(|pos| f(&pos)).collect();
        Ok(Grid { data, dim })
    }

    /// 2D grid from `rows[y][x]`. All rows must have the same length.
    pub fn from_rows(rows: &[Vec<Float>]) -> SmoothResult<Grid> {
        let size_y = rows.len();
        let size_x = rows.first().map_or(0, |r| r.len());
        if let Some(bad) = rows.iter().position(|r| r.len() != size_x) {
            return Err(SmoothError::invalid(format!(
                "row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                size_x
            )));
        }
        let data = rows.iter().flatten().copied().collect();
        Grid::new(&[size_x, size_y], data)
    }

    pub fn dim(&self) -> &GridDim {
        &self.dim
    }

    pub fn rank(&self) -> usize {
        self.dim.rank()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[Float] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Float] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<Float> {
        self.data
    }

    #[inline(always)]
    pub fn get(&self, pos: &Pos) -> Float {
        self.data[self.dim.get_index(pos)]
    }

    #[inline(always)]
    pub fn set(&mut self, pos: &Pos, value: Float) {
        let ij = self.dim.get_index(pos);
        self.data[ij] = value;
    }

    pub fn same_shape(&self, other: &Grid) -> bool {
        self.dim == other.dim
    }

    pub fn min(&self) -> Option<Float> {
        self.data.iter().copied().reduce(Float::min)
    }

    pub fn max(&self) -> Option<Float> {
        self.data.iter().copied().reduce(Float::max)
    }

    pub fn sum(&self) -> Float {
        self.data.iter().sum()
    }

    pub fn mean(&self) -> Option<Float> {
        if self.is_empty() {
            None
        } else {
            Some(self.sum() / self.len() as Float)
        }
    }
}
