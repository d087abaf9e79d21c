use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

pub mod averaging;
pub mod driver;
pub mod error;
pub mod grid;
pub mod load;
pub mod parallel;
pub mod save;

pub use averaging::{Backend, Method, Smoother, Window};
pub use driver::{CancelToken, DriverState, IterationDriver, LogProgress, ProgressObserver};
pub use error::{SmoothError, SmoothResult};
pub use grid::{Grid, GridDim, Pos};
pub use parallel::{GridKernelAverager, LaunchGeometry, ParallelDispatcher};

// Field values are always double precision.
pub type Float = f64;

#[cfg(test)]
pub(crate) const E_TOL: Float = 1E-12;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub input: Input,
    pub params: SmoothParams,
    #[serde(default)]
    pub execution: Execution,
    #[serde(default)]
    pub output: Output,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Input {
    pub path: String,
    /// Column to read from a `.plt` file.
    #[serde(default)]
    pub variable: Option<String>,
    /// Separator for plain text grids; any whitespace when unset.
    #[serde(default)]
    pub delimiter: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Box,
    Gauss,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Serial,
    Pool,
    GridKernel,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SmoothParams {
    pub method: MethodKind,
    #[serde(default)]
    pub radius: i64,
    #[serde(default = "default_sigma")]
    pub sigma: Float,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Execution {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_threads_per_block")]
    pub threads_per_block: usize,
}

impl Default for Execution {
    fn default() -> Self {
        Execution {
            backend: default_backend(),
            workers: default_workers(),
            threads_per_block: default_threads_per_block(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Output {
    #[serde(default)]
    pub write_output: bool,
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default)]
    pub progress: bool,
}

impl Default for Output {
    fn default() -> Self {
        Output {
            write_output: false,
            dir: default_output_dir(),
            progress: false,
        }
    }
}

fn default_sigma() -> Float {
    1.0
}
fn default_iterations() -> usize {
    1
}
fn default_backend() -> BackendKind {
    BackendKind::Serial
}
fn default_workers() -> usize {
    rayon::current_num_threads()
}
fn default_threads_per_block() -> usize {
    parallel::kernel::DEFAULT_THREADS_PER_BLOCK
}
fn default_output_dir() -> String {
    "output".to_string()
}

impl Config {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Could not open the config file {}", path.display()))?;
        Config::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Config> {
        let cfg: Config = toml::from_str(contents).context("Could not parse Config file")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects bad values before any grid is loaded.
    pub fn validate(&self) -> Result<()> {
        Method::from_params(&self.params).context("Invalid [params] section")?;
        if self.params.iterations == 0 {
            return Err(anyhow::Error::msg("iterations must be at least 1"));
        }
        if self.execution.workers == 0 {
            return Err(anyhow::Error::msg("workers must be at least 1"));
        }
        let tpb = self.execution.threads_per_block;
        if tpb == 0 || tpb > parallel::kernel::MAX_THREADS_PER_BLOCK {
            return Err(anyhow::Error::msg(format!(
                "threads_per_block must be in 1..={}, got {}",
                parallel::kernel::MAX_THREADS_PER_BLOCK,
                tpb
            )));
        }
        Ok(())
    }
}

/// Runs `params.iterations` passes of the configured method on `grid`.
pub fn smooth(grid: Grid, params: &SmoothParams, exec: &Execution) -> SmoothResult<Grid> {
    smooth_observed(grid, params, exec, None)
}

/// Like [`smooth`], reporting progress to `observer`.
pub fn smooth_observed(
    grid: Grid,
    params: &SmoothParams,
    exec: &Execution,
    observer: Option<Arc<dyn ProgressObserver>>,
) -> SmoothResult<Grid> {
    let mut smoother = Smoother::from_config(params, exec)?;
    let mut driver = IterationDriver::new();
    if let Some(obs) = observer {
        smoother = smoother.with_observer(obs.clone());
        driver = driver.with_observer(obs);
    }
    driver.run(grid, params.iterations, &mut smoother)
}

pub fn run(cfg: Config) -> Result<()> {
    cfg.validate()?;
    let grid = load::load_grid(&cfg.input)?;
    info!(
        "loaded {:?} grid from {}",
        grid.dim().extents(),
        cfg.input.path
    );

    let observer: Option<Arc<dyn ProgressObserver>> = if cfg.output.progress {
        Some(Arc::new(LogProgress::new(grid.len().max(1))))
    } else {
        None
    };
    let out = smooth_observed(grid, &cfg.params, &cfg.execution, observer)
        .context("Smoothing failed")?;

    if let (Some(min), Some(max), Some(mean)) = (out.min(), out.max(), out.mean()) {
        info!("result min {:.6} max {:.6} mean {:.6}", min, max, mean);
    }
    if cfg.output.write_output {
        save::save_grid(&out, &cfg)?;
        info!("wrote output to {}", cfg.output.dir);
    }
    Ok(())
}
