//! APDU command definition and short-form encoding
//!
//! Commands always serialize as `CLA INS P1 P2 Lc DATA [Le]`. The Lc byte is
//! written even for an empty data field so that every command produced by
//! this crate has one unambiguous encoding.

pub mod error;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use error::CommandError;

/// Largest data field a short APDU can carry
pub const MAX_DATA_LEN: usize = 255;

/// An APDU command
///
/// A command is immutable once built: the builder methods consume `self`
/// and return a new value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Command {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Bytes,
    le: Option<u8>,
}

impl Command {
    /// Create a command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Bytes::new(),
            le: None,
        }
    }

    /// Create a command with a data field
    pub fn new_with_data(cla: u8, ins: u8, p1: u8, p2: u8, data: impl Into<Bytes>) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Replace the data field
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    /// Set the expected response length (Le)
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Replace the class byte
    pub const fn with_class(mut self, cla: u8) -> Self {
        self.cla = cla;
        self
    }

    /// Class byte (CLA)
    pub const fn class(&self) -> u8 {
        self.cla
    }

    /// Instruction byte (INS)
    pub const fn instruction(&self) -> u8 {
        self.ins
    }

    /// First parameter (P1)
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Second parameter (P2)
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Command data, empty when the command carries none
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Expected response length (Le)
    pub const fn expected_length(&self) -> Option<u8> {
        self.le
    }

    /// Length of the serialized command
    pub fn command_length(&self) -> usize {
        5 + self.data.len() + usize::from(self.le.is_some())
    }

    /// Check that the data field fits a short APDU
    pub fn validate(&self) -> Result<(), CommandError> {
        if self.data.len() > MAX_DATA_LEN {
            return Err(CommandError::DataTooLong(self.data.len(), MAX_DATA_LEN));
        }
        Ok(())
    }

    /// Serialize to `CLA INS P1 P2 Lc DATA [Le]`
    ///
    /// Callers are responsible for keeping the data field within
    /// [`MAX_DATA_LEN`]; see [`Command::validate`].
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.command_length());

        buf.put_u8(self.cla);
        buf.put_u8(self.ins);
        buf.put_u8(self.p1);
        buf.put_u8(self.p2);
        buf.put_u8(self.data.len() as u8);
        buf.put_slice(&self.data);

        if let Some(le) = self.le {
            buf.put_u8(le);
        }

        buf.freeze()
    }

    /// Parse a short-form command
    ///
    /// Accepts `CLA INS P1 P2` and `CLA INS P1 P2 Lc DATA [Le]`. A single
    /// byte after the header is Lc, matching [`Command::to_bytes`], so an
    /// Le-only command is written as `CLA INS P1 P2 00 Le`.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, CommandError> {
        let [cla, ins, p1, p2, rest @ ..] = raw else {
            return Err(CommandError::InvalidLength(raw.len()));
        };

        let command = Self::new(*cla, *ins, *p1, *p2);

        match rest {
            [] => Ok(command),
            [lc, body @ ..] => {
                let lc = usize::from(*lc);
                match body.len().checked_sub(lc) {
                    Some(0) => Ok(command.with_data(Bytes::copy_from_slice(body))),
                    Some(1) => Ok(command
                        .with_data(Bytes::copy_from_slice(&body[..lc]))
                        .with_le(body[lc])),
                    _ => Err(CommandError::InvalidLength(raw.len())),
                }
            }
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("cla", &format_args!("{:#04x}", self.cla))
            .field("ins", &format_args!("{:#04x}", self.ins))
            .field("p1", &format_args!("{:#04x}", self.p1))
            .field("p2", &format_args!("{:#04x}", self.p2))
            .field("data", &hex::encode(&self.data))
            .field("le", &self.le)
            .finish()
    }
}

impl From<&Command> for Bytes {
    fn from(command: &Command) -> Self {
        command.to_bytes()
    }
}
