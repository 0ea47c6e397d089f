//! PC/SC transport for APDU exchange
//!
//! Implements [`CardTransport`](gpcard_apdu_core::CardTransport) over the
//! system PC/SC service for a reader chosen by name.
//!
//! ```no_run
//! use gpcard_apdu_core::{CardTransport, Command};
//! use gpcard_transport_pcsc::PcscTransport;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut transport = PcscTransport::connect("Identiv uTrust 3700 F [CCID Interface] 00 00")?;
//! let select = Command::new_with_data(0x00, 0xA4, 0x04, 0x00, vec![0xA0, 0x00, 0x00, 0x01, 0x51]);
//! let response = transport.transmit_raw(&select.to_bytes())?;
//! println!("{:02x?}", response.to_vec());
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod config;
mod error;
mod transport;

pub use config::{PcscConfig, ShareMode};
pub use error::PcscError;
pub use transport::PcscTransport;

// Re-export some pcsc types for convenience
pub use pcsc::{Protocol, Protocols};
