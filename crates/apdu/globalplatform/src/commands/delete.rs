//! DELETE command
//!
//! Removes an application instance or a load file identified by AID.

use gpcard_apdu_core::Command;
use iso7816_tlv::simple::{Tag, Tlv};

use crate::{
    Result,
    aid::Aid,
    constants::{cla, ins, tags},
};

/// DELETE of a single object
#[derive(Debug, Clone)]
pub struct DeleteCommand {
    aid: Aid,
}

impl DeleteCommand {
    /// Delete the object with this AID
    pub const fn with_aid(aid: Aid) -> Self {
        Self { aid }
    }

    /// Build the APDU: `80 E4 00 00 Lc 4F <len> <aid>`
    pub fn to_command(&self) -> Result<Command> {
        let tlv = Tlv::new(Tag::try_from(tags::DELETE_AID)?, self.aid.as_bytes().to_vec())?;
        Ok(Command::new_with_data(cla::GP, ins::DELETE, 0x00, 0x00, tlv.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_delete_command() {
        let aid = Aid::new(hex!("0102030405")).unwrap();
        let cmd = DeleteCommand::with_aid(aid).to_command().unwrap();

        assert_eq!(cmd.class(), cla::GP);
        assert_eq!(cmd.instruction(), ins::DELETE);
        assert_eq!(cmd.data().as_ref(), hex!("4F050102030405"));
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80E40000074F050102030405"));
    }

    #[test]
    fn test_delete_package() {
        let aid = Aid::new(hex!("A0000008040001")).unwrap();
        let cmd = DeleteCommand::with_aid(aid).to_command().unwrap();

        assert_eq!(cmd.data().as_ref(), hex!("4F07A0000008040001"));
    }
}
