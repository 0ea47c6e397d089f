//! Error types specific to APDU responses

use thiserror::Error;

/// Error for APDU response decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// Fewer than the two status bytes were received
    #[error("Malformed response: {0} bytes, expected at least 2")]
    Malformed(usize),

    /// Response body did not have the expected structure
    #[error("Unexpected response length: {actual} bytes, expected {expected}")]
    UnexpectedLength {
        /// Bytes received
        actual: usize,
        /// Bytes expected
        expected: usize,
    },
}
