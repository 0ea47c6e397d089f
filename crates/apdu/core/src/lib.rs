//! Core types for talking to smart cards with ISO/IEC 7816-4 APDUs
//!
//! This crate provides the pieces every higher layer builds on:
//!
//! - [`Command`]: an immutable command APDU and its short-form wire encoding
//! - [`Response`]: a decoded response APDU (payload plus [`StatusWord`])
//! - [`CardTransport`]: the synchronous request/response channel to a card
//!
//! Secure messaging, card management and concrete transports live in
//! sibling crates.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod response;
pub mod transport;

mod error;
pub use error::{Error, Result};

pub use command::{Command, MAX_DATA_LEN, error::CommandError};
pub use response::{Response, error::ResponseError, status::StatusWord};
pub use transport::{CardTransport, TransportError};

#[cfg(any(test, feature = "mock"))]
pub use transport::mock::MockTransport;

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, CardTransport, Command, CommandError, Error, Response, ResponseError,
        Result, StatusWord, TransportError, response::status::common as status,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let cmd = Command::new(0x00, 0xA4, 0x04, 0x00);
        assert_eq!(cmd.class(), 0x00);
        assert_eq!(cmd.instruction(), 0xA4);
        assert_eq!(cmd.p1(), 0x04);
        assert_eq!(cmd.p2(), 0x00);

        let resp = Response::success(Bytes::from_static(&[0x01, 0x02, 0x03]));
        assert!(resp.is_success());
        assert_eq!(resp.payload().as_ref(), &[0x01, 0x02, 0x03]);
        assert_eq!(resp.status(), StatusWord::new(0x90, 0x00));
    }
}
