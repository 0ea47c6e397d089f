//! GlobalPlatform card management over SCP02
//!
//! This crate authenticates to a card's Issuer Security Domain, keeps an
//! SCP02 secure channel (C-MAC, optionally with command encryption) and
//! issues the card lifecycle commands on top of it: SELECT, DELETE,
//! INSTALL and multi-block LOAD.
//!
//! The main entry point is [`GlobalPlatform`], which owns a
//! [`SecureChannel`] over any [`CardTransport`](gpcard_apdu_core::CardTransport).
//!
//! ```no_run
//! # fn run<T: gpcard_apdu_core::CardTransport>(transport: T) -> gpcard_globalplatform::Result<()> {
//! use gpcard_globalplatform::{ChunkedPackage, GlobalPlatform, LoadPlan, Aid};
//!
//! let mut gp = GlobalPlatform::new(transport);
//! gp.select()?;
//! gp.open_secure_channel()?;
//!
//! let plan = LoadPlan::new(Aid::from_hex("A0000008040001")?);
//! let package = ChunkedPackage::with_default_block_size(vec![0xC4, 0x01, 0x00]);
//! gp.load_package(&plan, package, |sent, total| println!("{sent}/{total}"), None)?;
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod aid;
pub mod application;
pub mod commands;
pub mod constants;
pub mod crypto;
pub mod keycard;
pub mod load;
pub mod secure_channel;
pub mod session;

mod error;
pub use error::{Error, Result};

pub use aid::Aid;
pub use application::{ForceReloadPolicy, GlobalPlatform, LoadPlan};
pub use load::{BlockSource, ChunkedPackage, LoadBlock};
pub use secure_channel::{SecureChannel, SecureChannelState, SecurityLevel};
pub use session::{KeyCandidates, Keys, NamedKeys, Session};

pub use commands::{
    DeleteCommand, ExternalAuthenticateCommand, InitializeUpdateCommand,
    InitializeUpdateResponse, InstallForInstallCommand, InstallForLoadCommand, LoadCommand,
    SelectCommand,
};

/// Convenience functions for common operations
pub mod operations {
    use gpcard_apdu_core::{CardTransport, response::status::common as status};

    use crate::{Error, GlobalPlatform, KeyCandidates, Result, SecurityLevel};

    /// Select the Issuer Security Domain and open a secure channel
    pub fn connect_and_setup<T: CardTransport>(
        transport: T,
        candidates: &KeyCandidates,
        level: SecurityLevel,
    ) -> Result<GlobalPlatform<T>> {
        let mut gp = GlobalPlatform::new(transport);

        gp.select()?
            .check(status::OK_ONLY)
            .map_err(Error::CommandRejected)?;
        gp.open_secure_channel_with(candidates, level)?;

        Ok(gp)
    }
}
