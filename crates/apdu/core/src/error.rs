//! Core error type for APDU exchange
//!
//! Wraps the codec and transport errors so callers working directly with
//! this crate have a single error to propagate.

use crate::command::error::CommandError;
use crate::response::error::ResponseError;
use crate::transport::error::TransportError;

/// Core error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Command could not be built or encoded
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Response could not be decoded
    #[error(transparent)]
    Response(#[from] ResponseError),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;
