//! Constants used in GlobalPlatform operations
//!
//! Command classes, instruction codes, parameter values and tags from the
//! GlobalPlatform Card Specification that the card manager uses.

/// GlobalPlatform command classes
pub mod cla {
    /// ISO7816 command class
    pub const ISO7816: u8 = 0x00;
    /// GlobalPlatform command class
    pub const GP: u8 = 0x80;
    /// Bit set on commands carrying a C-MAC
    pub const SECURE_MESSAGING: u8 = 0x04;
}

/// GlobalPlatform instruction codes
pub mod ins {
    /// SELECT command
    pub const SELECT: u8 = 0xA4;
    /// INITIALIZE UPDATE command
    pub const INITIALIZE_UPDATE: u8 = 0x50;
    /// EXTERNAL AUTHENTICATE command
    pub const EXTERNAL_AUTHENTICATE: u8 = 0x82;
    /// DELETE command
    pub const DELETE: u8 = 0xE4;
    /// LOAD command
    pub const LOAD: u8 = 0xE8;
    /// INSTALL command
    pub const INSTALL: u8 = 0xE6;
}

/// Parameter values for SELECT command (P1)
pub mod select_p1 {
    /// Select by DF name
    pub const BY_NAME: u8 = 0x04;
}

/// Parameter values for EXTERNAL AUTHENTICATE command (P1)
pub mod external_auth_p1 {
    /// C-MAC on every command
    pub const CMAC: u8 = 0x01;
    /// Command data encryption (always combined with C-MAC)
    pub const CDEC: u8 = 0x02;
}

/// Parameter values for INSTALL command (P1)
pub mod install_p1 {
    /// Install for load
    pub const FOR_LOAD: u8 = 0x02;
    /// Install for install
    pub const FOR_INSTALL: u8 = 0x04;
}

/// Parameter values for LOAD command (P1)
pub mod load_p1 {
    /// More blocks to follow
    pub const MORE_BLOCKS: u8 = 0x00;
    /// Last block
    pub const LAST_BLOCK: u8 = 0x80;
}

/// Tags used in GlobalPlatform commands
pub mod tags {
    /// AID tag for DELETE command
    pub const DELETE_AID: u8 = 0x4F;
    /// Load file data block tag
    pub const LOAD_FILE_DATA_BLOCK: u8 = 0xC4;
    /// Application specific install parameters
    pub const INSTALL_PARAMETERS: u8 = 0xC9;
}

/// Secure Channel Protocol (SCP) versions
pub mod scp {
    /// SCP02 protocol version
    pub const SCP02: u8 = 0x02;
}

/// Host challenge length in bytes
pub const HOST_CHALLENGE_LENGTH: usize = 8;

/// Length of a successful INITIALIZE UPDATE response payload
pub const INITIALIZE_UPDATE_RESPONSE_LENGTH: usize = 28;

/// Largest LOAD block that still leaves room for the C-MAC
pub const DEFAULT_BLOCK_SIZE: usize = 247;

/// Largest LOAD block when command data is also encrypted (padded to 240, plus the C-MAC)
pub const MAX_ENCRYPTED_BLOCK_SIZE: usize = 239;

/// Issuer Security Domain AID
pub const SECURITY_DOMAIN_AID: &[u8] = &[0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00, 0x00];
