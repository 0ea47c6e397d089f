//! EXTERNAL AUTHENTICATE command
//!
//! Completes the handshake by proving the host holds the same keys. The
//! command is the first one to carry a C-MAC.

use gpcard_apdu_core::Command;

use crate::{
    constants::{cla, ins},
    crypto::Cryptogram,
    secure_channel::SecurityLevel,
    session::Session,
};

/// EXTERNAL AUTHENTICATE with the host cryptogram
#[derive(Debug, Clone, Copy)]
pub struct ExternalAuthenticateCommand {
    host_cryptogram: Cryptogram,
    level: SecurityLevel,
}

impl ExternalAuthenticateCommand {
    /// Authenticate with a precomputed host cryptogram
    pub const fn with_host_cryptogram(host_cryptogram: Cryptogram, level: SecurityLevel) -> Self {
        Self {
            host_cryptogram,
            level,
        }
    }

    /// Compute the host cryptogram from an authenticated session
    pub fn from_session(session: &Session, level: SecurityLevel) -> Self {
        Self::with_host_cryptogram(session.host_cryptogram(), level)
    }

    /// Build the unwrapped APDU: `80 82 <level> 00 08 <cryptogram>`
    pub fn to_command(&self) -> Command {
        Command::new_with_data(
            cla::GP,
            ins::EXTERNAL_AUTHENTICATE,
            self.level.p1(),
            0x00,
            self.host_cryptogram.to_vec(),
        )
    }
}

impl From<ExternalAuthenticateCommand> for Command {
    fn from(cmd: ExternalAuthenticateCommand) -> Self {
        cmd.to_command()
    }
}
