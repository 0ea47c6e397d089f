//! Transport traits for APDU communication with cards
//!
//! A transport moves raw bytes to a card and back. It knows nothing about
//! command structure or secure messaging.

pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

use std::fmt;

use bytes::Bytes;
pub use error::TransportError;
use tracing::{debug, trace};

/// Trait for basic card transports
///
/// Implementations override [`CardTransport::do_transmit_raw`]; callers go
/// through [`CardTransport::transmit_raw`], which adds tracing around the
/// exchange.
pub trait CardTransport: fmt::Debug {
    /// Send raw APDU bytes to the card and return the raw response bytes
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = ?hex::encode(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => {
                trace!(response = ?hex::encode(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transmission");
            }
        }
        result
    }

    /// Exchange bytes with the card
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Check if the transport is connected to a physical card
    fn is_connected(&self) -> bool;

    /// Reset the transport connection
    fn reset(&mut self) -> Result<(), TransportError>;
}

impl<T: CardTransport + ?Sized> CardTransport for &mut T {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command)
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).do_transmit_raw(command)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command)
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).do_transmit_raw(command)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;
    use crate::{Command, Response};
    use hex_literal::hex;

    fn send<T: CardTransport>(mut transport: T, command: &Command) -> Response {
        let raw = transport.transmit_raw(&command.to_bytes()).unwrap();
        Response::from_bytes(&raw).unwrap()
    }

    #[test]
    fn test_transport_through_mutable_reference() {
        let mut mock = MockTransport::new(vec![Bytes::from_static(&hex!("9000"))]);

        let resp = send(&mut mock, &Command::new(0x00, 0xA4, 0x04, 0x00));
        assert!(resp.is_success());

        assert_eq!(mock.commands.len(), 1);
        assert_eq!(mock.commands[0].as_ref(), hex!("00A4040000"));
    }

    #[test]
    fn test_boxed_transport() {
        let mut transport: Box<dyn CardTransport> = Box::new(MockTransport::with_success());
        assert!(transport.is_connected());
        assert!(transport.transmit_raw(&hex!("80E4000000")).is_ok());
    }
}
