//! Error types for the pixelization layer.

use thiserror::Error;

/// Pixelization errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HealpixError {
    /// Order outside the supported range.
    #[error("Invalid order: {0} (supported: 0..={max})", max = crate::cell::MAX_ORDER)]
    InvalidOrder(i32),

    /// Pixel index outside the range of the given order.
    #[error("Invalid pixel index {pix} at order {order}")]
    InvalidPixel { order: u8, pix: u64 },
}

/// Result type for pixelization operations.
pub type Result<T> = std::result::Result<T, HealpixError>;
