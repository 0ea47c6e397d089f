//! APDU response definitions
//!
//! A response is the card's payload followed by the two status bytes.

pub mod error;
pub mod status;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use error::ResponseError;
use status::StatusWord;

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    payload: Bytes,
    status: StatusWord,
}

impl Response {
    /// Create a new response with payload and status
    pub fn new(payload: impl Into<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            payload: payload.into(),
            status: status.into(),
        }
    }

    /// Create a success response
    pub const fn success(payload: Bytes) -> Self {
        Self {
            payload,
            status: StatusWord::SUCCESS,
        }
    }

    /// Create a response that carries only a status word
    pub fn status_only(status: impl Into<StatusWord>) -> Self {
        Self {
            payload: Bytes::new(),
            status: status.into(),
        }
    }

    /// Parse a response from raw bytes (payload followed by SW1 SW2)
    pub fn from_bytes(data: &[u8]) -> Result<Self, ResponseError> {
        let Some(split) = data.len().checked_sub(2) else {
            return Err(ResponseError::Malformed(data.len()));
        };

        let (payload, sw) = data.split_at(split);
        let status = StatusWord::new(sw[0], sw[1]);

        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = payload.len(),
            "Parsed APDU response"
        );

        Ok(Self {
            payload: Bytes::copy_from_slice(payload),
            status,
        })
    }

    /// Serialize back to `DATA SW1 SW2`
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.payload.len() + 2);
        buf.put_slice(&self.payload);
        buf.put_u8(self.status.sw1);
        buf.put_u8(self.status.sw2);
        buf.freeze()
    }

    /// Response payload, empty when the card returned only a status word
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the response and return its payload
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Whether the status word is 90 00
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Accept the response if its status is one of `allowed`
    ///
    /// On rejection the offending status word is returned so callers can
    /// wrap it in their own error type.
    pub fn check(self, allowed: &[StatusWord]) -> Result<Self, StatusWord> {
        if self.status.is_one_of(allowed) {
            Ok(self)
        } else {
            Err(self.status)
        }
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = ResponseError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(data)
    }
}

impl TryFrom<Bytes> for Response {
    type Error = ResponseError;

    fn try_from(data: Bytes) -> Result<Self, Self::Error> {
        Self::from_bytes(&data)
    }
}
