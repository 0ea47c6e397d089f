//! Error types specific to APDU commands

use thiserror::Error;

/// Error for APDU command construction and parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Raw bytes do not form a short APDU
    #[error("Invalid command length: {0}")]
    InvalidLength(usize),

    /// Data field does not fit in a short APDU
    #[error("Data too long: {0} bytes (max {1})")]
    DataTooLong(usize, usize),

    /// A field value is outside its allowed range
    #[error("Invalid command data: {0}")]
    InvalidData(&'static str),
}

impl CommandError {
    /// Create a data too long error
    pub const fn data_too_long(actual: usize, max: usize) -> Self {
        Self::DataTooLong(actual, max)
    }
}
