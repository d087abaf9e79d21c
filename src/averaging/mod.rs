//! Averaging methods and the backends that run them.
//!
//! A [`Smoother`] pairs one [`Method`] with one [`Backend`] and performs a
//! single full pass over a grid. Every backend produces the same values as
//! the serial one; they only differ in how the cells are scheduled.

pub mod box_avg;
pub mod gauss;
pub mod window;

pub use box_avg::{average_field, average_point};
pub use gauss::{gauss_average, gauss_average_with, gauss_tap};
pub use window::Window;

use crate::driver::{AveragingPass, ProgressObserver};
use crate::error::check_radius;
use crate::grid::{Grid, Pos};
use crate::parallel::{GridKernelAverager, ParallelDispatcher};
use crate::{BackendKind, Execution, Float, MethodKind, SmoothParams, SmoothResult};
use std::sync::Arc;
use tracing::debug;

/// Per-cell averaging function handed to the parallel backends. It reads
/// the input grid only.
pub type CellFn<'a> = dyn Fn(&Grid, &Pos) -> SmoothResult<Float> + Sync + 'a;

/// A backend that can evaluate a function independently for every cell.
///
/// `output` must have the shape of `input`. If any cell fails the call
/// returns an error and `output` must not be used.
pub trait PerCellAverager: Send + Sync {
    fn name(&self) -> &'static str;

    fn map_cells(
        &self,
        input: &Grid,
        output: &mut Grid,
        cell_fn: &CellFn<'_>,
        observer: Option<&dyn ProgressObserver>,
    ) -> SmoothResult<()>;
}

/// One box pass on a per-cell backend.
pub fn box_pass(
    exec: &dyn PerCellAverager,
    grid: &Grid,
    radius: usize,
    observer: Option<&dyn ProgressObserver>,
) -> SmoothResult<Grid> {
    let mut out = Grid::zeros(grid.dim());
    exec.map_cells(
        grid,
        &mut out,
        &|g: &Grid, pos: &Pos| -> SmoothResult<Float> { Ok(average_point(g, pos, radius)) },
        observer,
    )?;
    Ok(out)
}

/// One Gaussian pass on a per-cell backend: x, then y, then z, each axis
/// reading the complete result of the one before.
pub fn gauss_pass(
    exec: &dyn PerCellAverager,
    grid: Grid,
    window: &Window,
    observer: Option<&dyn ProgressObserver>,
) -> SmoothResult<Grid> {
    let mut src = grid;
    let mut dst = Grid::zeros(src.dim());
    for axis in 0..src.rank() {
        exec.map_cells(
            &src,
            &mut dst,
            &|g: &Grid, pos: &Pos| -> SmoothResult<Float> { Ok(gauss_tap(g, pos, axis, window)) },
            observer,
        )?;
        std::mem::swap(&mut src, &mut dst);
    }
    Ok(src)
}

/// Validated averaging method.
#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    Box { radius: usize },
    Gauss { window: Window },
}

impl Method {
    pub fn new_box(radius: i64) -> SmoothResult<Method> {
        Ok(Method::Box {
            radius: check_radius(radius)?,
        })
    }

    pub fn new_gauss(sigma: Float) -> SmoothResult<Method> {
        Ok(Method::Gauss {
            window: Window::new(sigma)?,
        })
    }

    /// Only the parameter the chosen method needs is checked.
    pub fn from_params(params: &SmoothParams) -> SmoothResult<Method> {
        match params.method {
            MethodKind::Box => Method::new_box(params.radius),
            MethodKind::Gauss => Method::new_gauss(params.sigma),
        }
    }
}

pub enum Backend {
    Serial,
    Pool(ParallelDispatcher),
    GridKernel(GridKernelAverager),
}

impl Backend {
    pub fn from_execution(exec: &Execution) -> SmoothResult<Backend> {
        Ok(match exec.backend {
            BackendKind::Serial => Backend::Serial,
            BackendKind::Pool => Backend::Pool(ParallelDispatcher::new(exec.workers)?),
            BackendKind::GridKernel => {
                Backend::GridKernel(GridKernelAverager::new(exec.threads_per_block)?)
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Serial => "serial",
            Backend::Pool(d) => d.name(),
            Backend::GridKernel(k) => k.name(),
        }
    }
}

/// One full averaging pass of a method on a backend.
pub struct Smoother {
    method: Method,
    backend: Backend,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl Smoother {
    pub fn new(method: Method, backend: Backend) -> Smoother {
        Smoother {
            method,
            backend,
            observer: None,
        }
    }

    pub fn from_config(params: &SmoothParams, exec: &Execution) -> SmoothResult<Smoother> {
        let method = Method::from_params(params)?;
        let backend = Backend::from_execution(exec)?;
        Ok(Smoother::new(method, backend))
    }

    /// Receives per-cell progress from inside each pass.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Smoother {
        self.observer = Some(observer);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }
}

impl AveragingPass for Smoother {
    fn apply(&mut self, input: Grid) -> SmoothResult<Grid> {
        debug!(
            "{:?} pass on {} backend over {:?}",
            self.method,
            self.backend.name(),
            input.dim().extents()
        );
        let obs = self.observer.as_deref();
        match (&self.method, &mut self.backend) {
            (Method::Box { radius }, Backend::Serial) => {
                Ok(box_avg::box_field(&input, *radius, obs))
            }
            (Method::Gauss { window }, Backend::Serial) => {
                Ok(gauss_average_with(&input, window, obs))
            }
            (Method::Box { radius }, Backend::Pool(pool)) => {
                box_pass(&*pool, &input, *radius, obs)
            }
            (Method::Gauss { window }, Backend::Pool(pool)) => {
                gauss_pass(&*pool, input, window, obs)
            }
            (Method::Box { radius }, Backend::GridKernel(kernel)) => {
                kernel.box_pass(input, *radius, obs)
            }
            (Method::Gauss { window }, Backend::GridKernel(kernel)) => {
                kernel.gauss_pass(input, window, obs)
            }
        }
    }
}
