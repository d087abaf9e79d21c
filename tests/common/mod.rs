#![allow(dead_code)]
use field_smooth::{BackendKind, Execution, Float, Grid, MethodKind, SmoothParams};
use rand::prelude::*;

// Shapes used by most tests, one per supported rank.
pub const SHAPES: [&[usize]; 3] = [&[17], &[11, 9], &[7, 6, 5]];

pub fn random_grid(extents: &[usize], seed: u64) -> Grid {
    // Deterministic noise so failures can be reproduced.
    let mut rng = StdRng::seed_from_u64(seed);
    Grid::from_fn(extents, |_| rng.gen_range(-5.0..5.0)).unwrap()
}

pub fn box_params(radius: i64, iterations: usize) -> SmoothParams {
    SmoothParams {
        method: MethodKind::Box,
        radius,
        sigma: 1.0,
        iterations,
    }
}

pub fn gauss_params(sigma: Float, iterations: usize) -> SmoothParams {
    SmoothParams {
        method: MethodKind::Gauss,
        radius: 0,
        sigma,
        iterations,
    }
}

pub fn all_executions() -> Vec<Execution> {
    vec![
        Execution {
            backend: BackendKind::Serial,
            workers: 1,
            threads_per_block: 8,
        },
        Execution {
            backend: BackendKind::Pool,
            workers: 3,
            threads_per_block: 8,
        },
        Execution {
            backend: BackendKind::GridKernel,
            workers: 1,
            threads_per_block: 4,
        },
    ]
}
