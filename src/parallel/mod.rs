//! The two parallel schedules for per-cell averaging: a worker pool fed with
//! coordinate chunks, and a grid of independent per-cell tasks.

pub mod dispatch;
pub mod kernel;

pub use dispatch::ParallelDispatcher;
pub use kernel::{GridKernelAverager, LaunchGeometry};

use crate::averaging::CellFn;
use crate::grid::{Grid, Pos};
use crate::{Float, SmoothError, SmoothResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Evaluates one cell. Errors and panics both come back as `WorkerFailure`.
#[inline(always)]
pub(crate) fn run_cell(cell_fn: &CellFn<'_>, grid: &Grid, pos: &Pos) -> SmoothResult<Float> {
    match panic::catch_unwind(AssertUnwindSafe(|| cell_fn(grid, pos))) {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(SmoothError::WorkerFailure(format!("cell {:?}: {}", pos, e))),
        Err(payload) => Err(SmoothError::WorkerFailure(format!(
            "cell {:?} panicked: {}",
            pos,
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
