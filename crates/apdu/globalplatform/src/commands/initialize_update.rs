//! INITIALIZE UPDATE command
//!
//! Starts the SCP02 handshake: the host sends its challenge, the card
//! answers with its own challenge and a cryptogram proving key possession.

use gpcard_apdu_core::{Command, Response, ResponseError, StatusWord};
use tracing::warn;

use crate::{
    Error, Result,
    constants::{INITIALIZE_UPDATE_RESPONSE_LENGTH, cla, ins, scp},
    crypto::{CardChallenge, Cryptogram, HostChallenge, SequenceCounter},
};

/// INITIALIZE UPDATE carrying the host challenge
#[derive(Debug, Clone, Copy)]
pub struct InitializeUpdateCommand {
    host_challenge: HostChallenge,
    key_version: u8,
}

impl InitializeUpdateCommand {
    /// Use the default key version (P1 = 00)
    pub const fn with_challenge(host_challenge: HostChallenge) -> Self {
        Self {
            host_challenge,
            key_version: 0x00,
        }
    }

    /// Request a specific key version
    pub const fn with_key_version(mut self, key_version: u8) -> Self {
        self.key_version = key_version;
        self
    }

    /// Build the APDU: `80 50 kv 00 08 <challenge> 00`
    pub fn to_command(&self) -> Command {
        Command::new_with_data(
            cla::GP,
            ins::INITIALIZE_UPDATE,
            self.key_version,
            0x00,
            self.host_challenge.to_vec(),
        )
        .with_le(0x00)
    }
}

impl From<InitializeUpdateCommand> for Command {
    fn from(cmd: InitializeUpdateCommand) -> Self {
        cmd.to_command()
    }
}

/// Parsed INITIALIZE UPDATE response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeUpdateResponse {
    /// Key diversification data
    pub key_diversification_data: [u8; 10],
    /// Key version number
    pub key_version: u8,
    /// Secure channel protocol identifier
    pub scp_id: u8,
    /// Sequence counter
    pub sequence_counter: SequenceCounter,
    /// Card challenge
    pub card_challenge: CardChallenge,
    /// Card cryptogram
    pub card_cryptogram: Cryptogram,
}

impl InitializeUpdateResponse {
    /// Parse the card's answer
    ///
    /// A non-9000 status is a rejection, a payload other than 28 bytes is
    /// malformed and an SCP identifier other than 02 is unsupported.
    pub fn from_response(response: Response) -> Result<Self> {
        let response = response.check(&[StatusWord::SUCCESS]).inspect_err(|sw| {
            warn!(status = %sw, "INITIALIZE UPDATE rejected");
        })?;

        let payload = response.payload();
        if payload.len() != INITIALIZE_UPDATE_RESPONSE_LENGTH {
            return Err(ResponseError::UnexpectedLength {
                actual: payload.len(),
                expected: INITIALIZE_UPDATE_RESPONSE_LENGTH,
            }
            .into());
        }

        let scp_id = payload[11];
        if scp_id != scp::SCP02 {
            return Err(Error::UnsupportedScpVersion(scp_id));
        }

        let mut parsed = Self {
            key_diversification_data: [0; 10],
            key_version: payload[10],
            scp_id,
            sequence_counter: [0; 2],
            card_challenge: [0; 6],
            card_cryptogram: [0; 8],
        };
        parsed.key_diversification_data.copy_from_slice(&payload[0..10]);
        parsed.sequence_counter.copy_from_slice(&payload[12..14]);
        parsed.card_challenge.copy_from_slice(&payload[14..20]);
        parsed.card_cryptogram.copy_from_slice(&payload[20..28]);

        Ok(parsed)
    }
}
