use gpcard_apdu_core::{CommandError, ResponseError, StatusWord, TransportError};
use thiserror::Error;

/// Result type for GlobalPlatform operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for GlobalPlatform operations
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-related errors
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response could not be decoded
    #[error(transparent)]
    MalformedResponse(#[from] ResponseError),

    /// Command could not be encoded
    #[error(transparent)]
    Command(#[from] CommandError),

    /// No candidate key verified the card, or the card refused the host cryptogram
    #[error("Card authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    /// Card answered with a status word outside the allowed set
    #[error("Card rejected command: {0}")]
    CommandRejected(StatusWord),

    /// Block index does not fit the one-byte LOAD sequence number
    #[error("Load block sequence exhausted at block {0}")]
    SequenceExhausted(usize),

    /// Secure channel not established
    #[error("Secure channel not established")]
    NoSecureChannel,

    /// Secure channel failed and must be reset
    #[error("Secure channel failed, reset required")]
    ChannelFailed,

    /// AID is empty or longer than 16 bytes
    #[error("Invalid AID length: {0}")]
    InvalidAid(usize),

    /// Static key material could not be parsed
    #[error("Invalid key: {0}")]
    InvalidKey(&'static str),

    /// Unsupported SCP version
    #[error("Unsupported SCP version: {0:#04x}")]
    UnsupportedScpVersion(u8),

    /// TLV encoding failed
    #[error("TLV encoding error: {0}")]
    Tlv(String),

    /// Load blocks would not fit a LOAD command at the channel's security level
    #[error("Load block of {size} bytes exceeds {max} bytes at this security level")]
    BlockTooLarge {
        /// Block length
        size: usize,
        /// Largest block the channel can wrap
        max: usize,
    },
}

impl From<iso7816_tlv::TlvError> for Error {
    fn from(err: iso7816_tlv::TlvError) -> Self {
        Self::Tlv(err.to_string())
    }
}

impl From<StatusWord> for Error {
    fn from(status: StatusWord) -> Self {
        Self::CommandRejected(status)
    }
}
