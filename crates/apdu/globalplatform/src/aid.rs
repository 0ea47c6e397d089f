//! Application identifiers

use std::fmt;

use bytes::Bytes;
use derive_more::Deref;

use crate::{Error, Result};

/// Longest AID allowed by ISO/IEC 7816-5
pub const MAX_AID_LEN: usize = 16;

/// A validated application identifier (1 to 16 bytes)
#[derive(Clone, PartialEq, Eq, Hash, Deref)]
pub struct Aid(Bytes);

impl Aid {
    /// Validate and wrap raw AID bytes
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self> {
        let bytes = bytes.as_ref();
        if bytes.is_empty() || bytes.len() > MAX_AID_LEN {
            return Err(Error::InvalidAid(bytes.len()));
        }
        Ok(Self(Bytes::copy_from_slice(bytes)))
    }

    /// Wrap a compile-time constant AID
    ///
    /// Only used for the well-known identifiers in this crate, all of which
    /// are within bounds.
    pub(crate) const fn from_static(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }

    /// Wrap bytes whose length is already known to be in range
    pub(crate) fn from_bytes_unchecked(bytes: Bytes) -> Self {
        debug_assert!(!bytes.is_empty() && bytes.len() <= MAX_AID_LEN);
        Self(bytes)
    }

    /// Parse an AID from a hex string
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str).map_err(|_| Error::InvalidAid(0))?;
        Self::new(bytes)
    }

    /// Append bytes, e.g. an instance index, to form a derived AID
    pub fn with_suffix(&self, suffix: &[u8]) -> Result<Self> {
        let mut bytes = self.0.to_vec();
        bytes.extend_from_slice(suffix);
        Self::new(bytes)
    }

    /// Raw AID bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length prefix as it appears in INSTALL and DELETE payloads
    pub fn len_byte(&self) -> u8 {
        self.0.len() as u8
    }
}

impl AsRef<[u8]> for Aid {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Aid {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Self::new(bytes)
    }
}

impl TryFrom<Vec<u8>> for Aid {
    type Error = Error;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        Self::new(bytes)
    }
}

impl std::str::FromStr for Aid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Aid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(&self.0))
    }
}

impl fmt::Debug for Aid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aid({self})")
    }
}
