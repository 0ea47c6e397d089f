//! SELECT command
//!
//! Selects an application by AID. Sent in the clear, before any secure
//! channel exists.

use gpcard_apdu_core::Command;

use crate::{
    aid::Aid,
    constants::{SECURITY_DOMAIN_AID, cla, ins, select_p1},
};

/// SELECT by DF name
#[derive(Debug, Clone)]
pub struct SelectCommand {
    aid: Aid,
}

impl SelectCommand {
    /// Select the given application
    pub const fn with_aid(aid: Aid) -> Self {
        Self { aid }
    }

    /// Select the Issuer Security Domain
    pub const fn security_domain() -> Self {
        Self::with_aid(Aid::from_static(SECURITY_DOMAIN_AID))
    }

    /// Build the APDU
    pub fn to_command(&self) -> Command {
        Command::new_with_data(
            cla::ISO7816,
            ins::SELECT,
            select_p1::BY_NAME,
            0x00,
            self.aid.as_bytes().to_vec(),
        )
    }
}

impl From<SelectCommand> for Command {
    fn from(select: SelectCommand) -> Self {
        select.to_command()
    }
}
