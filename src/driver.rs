//! Repeated application of an averaging pass.
//!
//! The driver moves `Idle -> Running -> Done`, or to `Failed` when a pass
//! errors. Each pass consumes the previous pass's full output. Cancellation
//! is only looked at between passes, never inside one.

use crate::grid::Grid;
use crate::{SmoothError, SmoothResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hooks for surfacing progress. All methods default to no-ops.
///
/// `cells_done` may be called concurrently from worker threads.
pub trait ProgressObserver: Send + Sync {
    fn pass_started(&self, _iteration: usize, _total: usize) {}
    fn cells_done(&self, _count: usize) {}
    fn pass_finished(&self, _iteration: usize, _total: usize) {}
}

/// Logs progress through `tracing`. Cell counts are reported roughly every
/// `report_every` cells.
pub struct LogProgress {
    cells: AtomicUsize,
    report_every: usize,
}

impl LogProgress {
    pub fn new(report_every: usize) -> LogProgress {
        LogProgress {
            cells: AtomicUsize::new(0),
            report_every: report_every.max(1),
        }
    }

    pub fn cells(&self) -> usize {
        self.cells.load(Ordering::Relaxed)
    }
}

impl ProgressObserver for LogProgress {
    fn pass_started(&self, iteration: usize, total: usize) {
        info!("iteration {}/{} started", iteration + 1, total);
    }

    fn cells_done(&self, count: usize) {
        let before = self.cells.fetch_add(count, Ordering::Relaxed);
        let after = before + count;
        if before / self.report_every != after / self.report_every {
            debug!("{} cells averaged", after);
        }
    }

    fn pass_finished(&self, iteration: usize, total: usize) {
        info!("iteration {}/{} done", iteration + 1, total);
    }
}

/// Shared flag used to stop a run at the next pass boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One full pass: complete grid in, complete grid of the same shape out.
pub trait AveragingPass {
    fn apply(&mut self, input: Grid) -> SmoothResult<Grid>;
}

impl<F> AveragingPass for F
where
    F: FnMut(Grid) -> SmoothResult<Grid>,
{
    fn apply(&mut self, input: Grid) -> SmoothResult<Grid> {
        self(input)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverState {
    Idle,
    Running { completed: usize, total: usize },
    Done { iterations: usize },
    Failed(SmoothError),
}

pub struct IterationDriver {
    state: DriverState,
    observer: Option<Arc<dyn ProgressObserver>>,
    cancel: Option<CancelToken>,
}

impl Default for IterationDriver {
    fn default() -> Self {
        IterationDriver::new()
    }
}

impl IterationDriver {
    pub fn new() -> IterationDriver {
        IterationDriver {
            state: DriverState::Idle,
            observer: None,
            cancel: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> IterationDriver {
        self.observer = Some(observer);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> IterationDriver {
        self.cancel = Some(token);
        self
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    /// Back to `Idle` so the driver can be started again.
    pub fn reset(&mut self) {
        self.state = DriverState::Idle;
    }

    /// Applies `pass` `iterations` times, feeding each output back in.
    ///
    /// Fails without touching the grid if `iterations` is 0 or the driver
    /// is not idle. A failed pass moves the driver to `Failed` and is not
    /// retried.
    pub fn run(
        &mut self,
        grid: Grid,
        iterations: usize,
        pass: &mut dyn AveragingPass,
    ) -> SmoothResult<Grid> {
        if self.state != DriverState::Idle {
            return Err(SmoothError::invalid(format!(
                "driver must be idle to start, state is {:?}",
                self.state
            )));
        }
        if iterations == 0 {
            return Err(SmoothError::invalid("iterations must be at least 1"));
        }

        self.state = DriverState::Running {
            completed: 0,
            total: iterations,
        };
        let mut grid = grid;
        for iteration in 0..iterations {
            if self.cancel.as_ref().map_or(false, |c| c.is_cancelled()) {
                warn!("cancelled before iteration {}", iteration + 1);
                return Err(self.fail(SmoothError::Cancelled {
                    completed: iteration,
                }));
            }
            if let Some(obs) = &self.observer {
                obs.pass_started(iteration, iterations);
            }

            let shape = grid.dim().clone();
            grid = match pass.apply(grid) {
                Ok(out) => out,
                Err(e) => {
                    warn!("iteration {} failed: {}", iteration + 1, e);
                    return Err(self.fail(e));
                }
            };
            if grid.dim() != &shape {
                return Err(self.fail(SmoothError::invalid(format!(
                    "pass changed grid shape from {:?} to {:?}",
                    shape.extents(),
                    grid.dim().extents()
                ))));
            }

            if let Some(obs) = &self.observer {
                obs.pass_finished(iteration, iterations);
            }
            debug!("pass {}/{} complete", iteration + 1, iterations);
            self.state = DriverState::Running {
                completed: iteration + 1,
                total: iterations,
            };
        }

        self.state = DriverState::Done { iterations };
        Ok(grid)
    }

    fn fail(&mut self, err: SmoothError) -> SmoothError {
        self.state = DriverState::Failed(err.clone());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::averaging::box_avg::average_field;
    use std::sync::Mutex;

    fn ramp() -> Grid {
        Grid::from_fn(&[6, 4], |p| (p.x() * p.x() + 3 * p.y()) as crate::Float).unwrap()
    }

    #[test]
    fn runs_to_done() {
        let mut driver = IterationDriver::new();
        let mut calls = 0;
        let mut pass = |g: Grid| {
            calls += 1;
            average_field(&g, 1)
        };
        let out = driver.run(ramp(), 3, &mut pass).unwrap();
        assert_eq!(calls, 3);
        assert_eq!(driver.state(), &DriverState::Done { iterations: 3 });

        let mut expected = ramp();
        for _ in 0..3 {
            expected = average_field(&expected, 1).unwrap();
        }
        assert_eq!(out, expected);
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut driver = IterationDriver::new();
        let mut pass = |g: Grid| -> SmoothResult<Grid> { Ok(g) };
        assert!(matches!(
            driver.run(ramp(), 0, &mut pass),
            Err(SmoothError::InvalidParameter(_))
        ));
        assert_eq!(driver.state(), &DriverState::Idle);
    }

    #[test]
    fn failure_is_terminal() {
        let mut driver = IterationDriver::new();
        let mut calls = 0;
        let mut pass = |g: Grid| {
            calls += 1;
            if calls == 2 {
                Err(SmoothError::WorkerFailure("boom".into()))
            } else {
                Ok(g)
            }
        };
        let err = driver.run(ramp(), 5, &mut pass).unwrap_err();
        assert_eq!(err, SmoothError::WorkerFailure("boom".into()));
        assert_eq!(calls, 2);
        assert_eq!(driver.state(), &DriverState::Failed(err));

        // not restartable until reset
        let mut noop = |g: Grid| -> SmoothResult<Grid> { Ok(g) };
        assert!(driver.run(ramp(), 1, &mut noop).is_err());
        driver.reset();
        assert!(driver.run(ramp(), 1, &mut noop).is_ok());
    }

    #[test]
    fn cancel_at_boundary() {
        let token = CancelToken::new();
        let mut driver = IterationDriver::new().with_cancel(token.clone());
        let mut calls = 0;
        let mut pass = |g: Grid| -> SmoothResult<Grid> {
            calls += 1;
            if calls == 2 {
                token.cancel();
            }
            Ok(g)
        };
        let err = driver.run(ramp(), 4, &mut pass).unwrap_err();
        // the pass that requested cancellation still completes
        assert_eq!(err, SmoothError::Cancelled { completed: 2 });
        assert_eq!(calls, 2);
    }

    #[test]
    fn shape_change_rejected() {
        let mut driver = IterationDriver::new();
        let mut pass = |_g: Grid| Grid::filled(&[2, 2], 0.0);
        assert!(matches!(
            driver.run(ramp(), 1, &mut pass),
            Err(SmoothError::InvalidParameter(_))
        ));
        assert!(matches!(driver.state(), DriverState::Failed(_)));
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ProgressObserver for Recorder {
        fn pass_started(&self, iteration: usize, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("start {}/{}", iteration, total));
        }
        fn pass_finished(&self, iteration: usize, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("end {}/{}", iteration, total));
        }
    }

    #[test]
    fn observer_sees_every_pass() {
        let recorder = Arc::new(Recorder::default());
        let mut driver = IterationDriver::new().with_observer(recorder.clone());
        let mut pass = |g: Grid| -> SmoothResult<Grid> { Ok(g) };
        driver.run(ramp(), 2, &mut pass).unwrap();
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["start 0/2", "end 0/2", "start 1/2", "end 1/2"]
        );
    }

    #[test]
    fn log_progress_counts() {
        let progress = LogProgress::new(10);
        progress.cells_done(7);
        progress.cells_done(7);
        assert_eq!(progress.cells(), 14);
    }
}
