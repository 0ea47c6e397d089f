//! LOAD command
//!
//! Transfers one block of a load file. P1 flags the final block, P2 is the
//! block sequence number.

use bytes::Bytes;
use gpcard_apdu_core::Command;

use crate::constants::{cla, ins, load_p1};

/// LOAD of a single block
#[derive(Debug, Clone)]
pub struct LoadCommand {
    sequence: u8,
    has_more: bool,
    data: Bytes,
}

impl LoadCommand {
    /// Create a LOAD command for block `sequence`
    pub fn new(sequence: u8, has_more: bool, data: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            has_more,
            data: data.into(),
        }
    }

    /// Create a LOAD command for more blocks
    pub fn more_blocks(sequence: u8, data: impl Into<Bytes>) -> Self {
        Self::new(sequence, true, data)
    }

    /// Create a LOAD command for the last block
    pub fn last_block(sequence: u8, data: impl Into<Bytes>) -> Self {
        Self::new(sequence, false, data)
    }

    /// Build the APDU
    pub fn to_command(&self) -> Command {
        let p1 = if self.has_more {
            load_p1::MORE_BLOCKS
        } else {
            load_p1::LAST_BLOCK
        };
        Command::new_with_data(cla::GP, ins::LOAD, p1, self.sequence, self.data.clone())
    }
}

impl From<LoadCommand> for Command {
    fn from(cmd: LoadCommand) -> Self {
        cmd.to_command()
    }
}
