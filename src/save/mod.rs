use crate::{BackendKind, Config, Float, Grid, MethodKind};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Sidecar written next to the `.npy` data.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GridMeta {
    /// Extents with x first. The `.npy` array is flat with x varying fastest.
    pub shape: Vec<usize>,
    pub method: MethodKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sigma: Option<Float>,
    pub iterations: usize,
    pub backend: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Float>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Float>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<Float>,
}

impl GridMeta {
    pub fn new(grid: &Grid, cfg: &Config) -> GridMeta {
        let params = &cfg.params;
        GridMeta {
            shape: grid.dim().extents().to_vec(),
            method: params.method,
            radius: match params.method {
                MethodKind::Box => Some(params.radius),
                MethodKind::Gauss => None,
            },
            sigma: match params.method {
                MethodKind::Box => None,
                MethodKind::Gauss => Some(params.sigma),
            },
            iterations: params.iterations,
            backend: cfg.execution.backend,
            min: grid.min(),
            max: grid.max(),
            mean: grid.mean(),
        }
    }
}

/// Writes `grid.npy` and `meta.toml` into `cfg.output.dir`.
pub fn save_grid(grid: &Grid, cfg: &Config) -> Result<()> {
    let outdir = Path::new(&cfg.output.dir);
    std::fs::create_dir_all(outdir).context("Unable to create output directory")?;

    npy::to_file(outdir.join("grid.npy"), grid.as_slice().to_vec())
        .context("Could not save grid data to file")?;

    let meta = toml::to_string(&GridMeta::new(grid, cfg)).context("Could not serialize metadata")?;
    std::fs::write(outdir.join("meta.toml"), meta).context("Could not save metadata to file")?;

    Ok(())
}
