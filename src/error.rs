//! Error types for the smoothing engine.
//!
//! Application level code (config loading, file IO) uses `anyhow`; the
//! averaging core reports these typed errors so callers can tell a bad
//! parameter from a failed parallel pass.

use thiserror::Error;

/// Errors that can occur while smoothing a grid
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SmoothError {
    /// Bad radius, sigma, iteration count, worker count or grid shape
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Grid rank outside of 1..=3
    #[error("unsupported rank: expected 1, 2 or 3, got {0}")]
    UnsupportedRank(usize),

    /// A parallel task failed; the whole pass was discarded
    #[error("worker failure: {0}")]
    WorkerFailure(String),

    /// Cancellation was requested and honoured at a pass boundary
    #[error("cancelled after {completed} completed passes")]
    Cancelled {
        /// Number of full passes that finished before cancelling
        completed: usize,
    },
}

impl SmoothError {
    pub(crate) fn invalid(msg: impl Into<String>) -> SmoothError {
        SmoothError::InvalidParameter(msg.into())
    }
}

/// Result type for smoothing operations
pub type SmoothResult<T> = Result<T, SmoothError>;

/// Rejects negative radii before anything touches the grid.
pub(crate) fn check_radius(radius: i64) -> SmoothResult<usize> {
    if radius < 0 {
        return Err(SmoothError::invalid(format!(
            "radius must be non-negative, got {}",
            radius
        )));
    }
    Ok(radius as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_radius_rejected() {
        assert!(matches!(
            check_radius(-1),
            Err(SmoothError::InvalidParameter(_))
        ));
        assert_eq!(check_radius(0), Ok(0));
        assert_eq!(check_radius(7), Ok(7));
    }

    #[test]
    fn messages() {
        assert_eq!(
            SmoothError::UnsupportedRank(4).to_string(),
            "unsupported rank: expected 1, 2 or 3, got 4"
        );
        assert_eq!(
            SmoothError::Cancelled { completed: 2 }.to_string(),
            "cancelled after 2 completed passes"
        );
    }
}
