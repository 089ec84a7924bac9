//! Error taxonomy for the grid engine

use thiserror::Error;

/// Errors raised by the grid engine
///
/// A level not being crossed, or the feed returning nothing, are normal flow
/// and never surface as errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("range_max ({max}) must be greater than range_min ({min}) and range_min must be positive")]
    InvalidRange { min: f64, max: f64 },

    #[error("grid_count ({0}) must be at least 2")]
    InvalidGridCount(usize),

    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("price must be positive and finite, got {0}")]
    InvalidPrice(f64),
}

impl GridError {
    /// True for errors that reject a configuration
    pub fn is_configuration(&self) -> bool {
        !matches!(self, GridError::InvalidPrice(_))
    }
}

pub type GridResult<T> = Result<T, GridError>;
