//! Error types for the PC/SC transport

use gpcard_apdu_core::TransportError;
use thiserror::Error;

/// PC/SC-specific errors
#[derive(Debug, Error)]
pub enum PcscError {
    /// Error reported by the PC/SC service
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// Reader name is unknown or cannot be passed to PC/SC
    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    /// No card present in reader
    #[error("No card present in reader: {0}")]
    NoCard(String),
}

impl From<PcscError> for TransportError {
    fn from(err: PcscError) -> Self {
        match err {
            PcscError::Pcsc(pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard) => {
                Self::Connection
            }
            PcscError::Pcsc(pcsc::Error::InsufficientBuffer) => Self::BufferTooSmall,
            PcscError::Pcsc(e) => Self::Driver(e as i32),
            PcscError::NoCard(_) => Self::Connection,
            PcscError::ReaderNotFound(reader) => Self::other(format!("Reader not found: {reader}")),
        }
    }
}
