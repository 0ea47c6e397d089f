//! SCP02 secure channel
//!
//! [`SecureChannel`] owns the card transport and drives the handshake
//! (INITIALIZE UPDATE, cryptogram check, EXTERNAL AUTHENTICATE). Once
//! established every command goes through [`Scp02Wrapper`], which appends a
//! C-MAC chained over all previously sent commands.

use bytes::{BufMut, BytesMut};
use cipher::Iv;
use derive_more::Display;
use gpcard_apdu_core::{CardTransport, Command, CommandError, MAX_DATA_LEN, Response};
use rand::RngCore;
use tracing::{Level, debug, info, instrument, trace, warn};

use crate::{
    Error, Result,
    commands::{ExternalAuthenticateCommand, InitializeUpdateCommand, InitializeUpdateResponse},
    constants::{DEFAULT_BLOCK_SIZE, MAX_ENCRYPTED_BLOCK_SIZE, cla, external_auth_p1},
    crypto::{BLOCK_LEN, HostChallenge, Scp02, Scp02Mac, encrypt_data, encrypt_icv, mac_full_3des},
    session::{KeyCandidates, Session, SessionKeys},
};

/// Protection applied to commands after the handshake
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
pub enum SecurityLevel {
    /// C-MAC only
    #[default]
    #[display("mac")]
    Mac,
    /// C-MAC and command data encryption
    #[display("mac+enc")]
    MacEnc,
}

impl SecurityLevel {
    /// P1 of EXTERNAL AUTHENTICATE for this level
    pub const fn p1(self) -> u8 {
        match self {
            Self::Mac => external_auth_p1::CMAC,
            Self::MacEnc => external_auth_p1::CMAC | external_auth_p1::CDEC,
        }
    }

    /// Whether command data is encrypted
    pub const fn encrypts(self) -> bool {
        matches!(self, Self::MacEnc)
    }

    /// Largest LOAD block that still fits a short APDU once wrapped
    pub const fn max_block_size(self) -> usize {
        match self {
            Self::Mac => DEFAULT_BLOCK_SIZE,
            Self::MacEnc => MAX_ENCRYPTED_BLOCK_SIZE,
        }
    }
}

/// Lifecycle of a secure channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
pub enum SecureChannelState {
    /// No handshake has completed
    #[default]
    #[display("unestablished")]
    Unestablished,
    /// Handshake in progress
    #[display("authenticating")]
    Authenticating,
    /// Commands are wrapped with the session keys
    #[display("established")]
    Established,
    /// Handshake failed; only [`SecureChannel::reset`] leaves this state
    #[display("failed")]
    Failed,
}

/// SCP02 command wrapper
///
/// Holds the session keys and the MAC chaining value. The first wrapped
/// command (EXTERNAL AUTHENTICATE) is MACed with a zero ICV; every later
/// command uses the previous MAC encrypted under the first half of S-MAC.
pub struct Scp02Wrapper {
    keys: SessionKeys,
    icv: Option<Iv<Scp02>>,
    level: SecurityLevel,
}

impl std::fmt::Debug for Scp02Wrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scp02Wrapper")
            .field("icv", &self.icv.as_ref().map(hex::encode))
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

impl Scp02Wrapper {
    /// Create a MAC-only wrapper with a fresh chain
    pub const fn new(keys: SessionKeys) -> Self {
        Self {
            keys,
            icv: None,
            level: SecurityLevel::Mac,
        }
    }

    /// Change the protection applied to subsequent commands
    pub const fn set_level(&mut self, level: SecurityLevel) {
        self.level = level;
    }

    /// Current protection level
    pub const fn level(&self) -> SecurityLevel {
        self.level
    }

    /// Last MAC sent, `None` before the first wrapped command
    pub const fn icv(&self) -> Option<&Iv<Scp02>> {
        self.icv.as_ref()
    }

    /// Wrap a command and advance the MAC chain
    ///
    /// Sets the secure messaging bit in CLA, optionally encrypts the data
    /// field, then appends the C-MAC computed over
    /// `CLA' INS P1 P2 Lc' data'`. Fails without touching the chain when the
    /// wrapped data would not fit a short APDU.
    pub fn wrap_command(&mut self, command: &Command) -> Result<Command> {
        let data = if self.level.encrypts() && !command.data().is_empty() {
            encrypt_data(self.keys.enc(), command.data()).into()
        } else {
            command.data().clone()
        };

        let wrapped_len = data.len() + BLOCK_LEN;
        if wrapped_len > MAX_DATA_LEN {
            return Err(CommandError::data_too_long(wrapped_len, MAX_DATA_LEN).into());
        }

        let cla = command.class() | cla::SECURE_MESSAGING;

        let mut mac_data = BytesMut::with_capacity(5 + data.len());
        mac_data.put_u8(cla);
        mac_data.put_u8(command.instruction());
        mac_data.put_u8(command.p1());
        mac_data.put_u8(command.p2());
        mac_data.put_u8(wrapped_len as u8);
        mac_data.put_slice(&data);

        let icv = match &self.icv {
            Some(previous) => encrypt_icv(self.keys.mac(), previous),
            None => Iv::<Scp02>::default(),
        };
        let mac: Scp02Mac = mac_full_3des(self.keys.mac(), &icv, &mac_data);
        self.icv = Some(mac.into());

        let mut wrapped_data = BytesMut::with_capacity(wrapped_len);
        wrapped_data.put_slice(&data);
        wrapped_data.put_slice(&mac);

        let mut wrapped = Command::new_with_data(
            cla,
            command.instruction(),
            command.p1(),
            command.p2(),
            wrapped_data.freeze(),
        );
        if let Some(le) = command.expected_length() {
            wrapped = wrapped.with_le(le);
        }

        Ok(wrapped)
    }
}

/// Card connection with an SCP02 session on top
///
/// One command is in flight at a time: every exchange takes `&mut self`.
#[derive(Debug)]
pub struct SecureChannel<T: CardTransport> {
    transport: T,
    state: SecureChannelState,
    session: Option<Session>,
    wrapper: Option<Scp02Wrapper>,
}

impl<T: CardTransport> SecureChannel<T> {
    /// Wrap a transport; no handshake is performed yet
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            state: SecureChannelState::Unestablished,
            session: None,
            wrapper: None,
        }
    }

    /// Current state
    pub const fn state(&self) -> SecureChannelState {
        self.state
    }

    /// Whether commands can be wrapped
    pub fn is_established(&self) -> bool {
        self.state == SecureChannelState::Established
    }

    /// Authenticated session, if established
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Protection applied to wrapped commands, if established
    pub fn security_level(&self) -> Option<SecurityLevel> {
        self.wrapper.as_ref().map(Scp02Wrapper::level)
    }

    /// Borrow the underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the underlying transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport, dropping any session
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run the handshake with a fresh random host challenge
    pub fn open(&mut self, candidates: &KeyCandidates, level: SecurityLevel) -> Result<()> {
        let mut host_challenge = HostChallenge::default();
        rand::rng().fill_bytes(&mut host_challenge);
        self.open_with_challenge(candidates, level, host_challenge)
    }

    /// Run the handshake with a caller-supplied host challenge
    ///
    /// Any failure leaves the channel [`SecureChannelState::Failed`] with
    /// the session keys wiped.
    pub fn open_with_challenge(
        &mut self,
        candidates: &KeyCandidates,
        level: SecurityLevel,
        host_challenge: HostChallenge,
    ) -> Result<()> {
        if self.state == SecureChannelState::Failed {
            return Err(Error::ChannelFailed);
        }

        self.drop_session();
        self.state = SecureChannelState::Authenticating;
        debug!(%level, "Opening SCP02 secure channel");

        match self.handshake(candidates, level, host_challenge) {
            Ok((session, wrapper)) => {
                info!(keys = session.key_name(), %level, "Secure channel established");
                self.session = Some(session);
                self.wrapper = Some(wrapper);
                self.state = SecureChannelState::Established;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Secure channel handshake failed");
                self.drop_session();
                self.state = SecureChannelState::Failed;
                Err(err)
            }
        }
    }

    fn handshake(
        &mut self,
        candidates: &KeyCandidates,
        level: SecurityLevel,
        host_challenge: HostChallenge,
    ) -> Result<(Session, Scp02Wrapper)> {
        let init = InitializeUpdateCommand::with_challenge(host_challenge).to_command();
        let response = self.exchange(&init)?;
        let init_response = InitializeUpdateResponse::from_response(response)?;

        let session = Session::from_response(candidates, &init_response, host_challenge)?;

        let mut wrapper = Scp02Wrapper::new(session.keys().clone());
        let auth = ExternalAuthenticateCommand::from_session(&session, level).to_command();
        let response = self.exchange(&wrapper.wrap_command(&auth)?)?;
        if !response.is_success() {
            warn!(status = %response.status(), "EXTERNAL AUTHENTICATE rejected");
            return Err(Error::AuthenticationFailed("card rejected the host cryptogram"));
        }

        wrapper.set_level(level);
        Ok((session, wrapper))
    }

    /// Send a command through the secure channel
    ///
    /// The MAC chain advances as soon as the command is wrapped, so it stays
    /// in step with the card even when the card answers with an error status.
    #[instrument(level = "trace", skip_all, fields(ins = command.instruction()))]
    pub fn transmit(&mut self, command: &Command) -> Result<Response> {
        let wrapper = match self.state {
            SecureChannelState::Established => {
                self.wrapper.as_mut().ok_or(Error::NoSecureChannel)?
            }
            SecureChannelState::Failed => return Err(Error::ChannelFailed),
            _ => return Err(Error::NoSecureChannel),
        };

        let wrapped = wrapper.wrap_command(command)?;
        trace!(command = ?command, wrapped = ?wrapped, "Command wrapped with C-MAC");

        self.exchange(&wrapped)
    }

    /// Send a command without secure messaging
    #[instrument(level = "trace", skip_all, fields(ins = command.instruction()))]
    pub fn transmit_plain(&mut self, command: &Command) -> Result<Response> {
        self.exchange(command)
    }

    fn exchange(&mut self, command: &Command) -> Result<Response> {
        command.validate()?;

        let raw = self.transport.transmit_raw(&command.to_bytes())?;
        let response = Response::from_bytes(&raw)?;

        let status = response.status();
        let level = status.tracing_level();
        if level == Level::DEBUG {
            debug!(status = %status, "Card response");
        } else if level == Level::INFO {
            info!(status = %status, "Card response");
        } else {
            warn!(status = %status, "Card response");
        }

        Ok(response)
    }

    /// Drop the session keys and return to [`SecureChannelState::Unestablished`]
    pub fn close(&mut self) {
        if self.state == SecureChannelState::Established {
            debug!("Closing SCP02 secure channel");
        }
        self.drop_session();
        if self.state != SecureChannelState::Failed {
            self.state = SecureChannelState::Unestablished;
        }
    }

    /// Reset the transport and start over from [`SecureChannelState::Unestablished`]
    pub fn reset(&mut self) -> Result<()> {
        self.drop_session();
        self.transport.reset()?;
        self.state = SecureChannelState::Unestablished;
        Ok(())
    }

    fn drop_session(&mut self) {
        self.session = None;
        self.wrapper = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DEFAULT_KEY, Keys, STATUS_KEY};
    use bytes::Bytes;
    use gpcard_apdu_core::{MockTransport, StatusWord};
    use hex_literal::hex;

    const INIT_RESPONSE: [u8; 30] =
        hex!("000002650183039536622002000de9c62ba1c4c8e55fcb91b6654ce49000");
    const HOST_CHALLENGE: HostChallenge = hex!("f0467f908e5ca23f");

    fn mock(responses: &[&'static [u8]]) -> MockTransport {
        MockTransport::new(responses.iter().map(|r| Bytes::from_static(r)).collect())
    }

    fn session_keys(mac: [u8; 16]) -> SessionKeys {
        SessionKeys::new(DEFAULT_KEY, mac, DEFAULT_KEY)
    }

    #[test]
    fn test_wrap_command() {
        let mut wrapper = Scp02Wrapper::new(session_keys(hex!("2983ba77d709c2daa1e6000abccac951")));
        assert!(wrapper.icv().is_none());

        let cmd = Command::new_with_data(0x80, 0x82, 0x01, 0x00, hex!("1d4de92eaf7a2c9f").to_vec());
        let wrapped = wrapper.wrap_command(&cmd).unwrap();
        assert_eq!(
            wrapped.to_bytes().as_ref(),
            hex!("84820100101d4de92eaf7a2c9f8f9b0df681c1d3ec")
        );
        assert_eq!(wrapper.icv().unwrap().as_slice(), hex!("8f9b0df681c1d3ec"));

        let cmd = Command::new_with_data(0x80, 0xF2, 0x80, 0x02, hex!("4f00").to_vec()).with_le(0);
        let wrapped = wrapper.wrap_command(&cmd).unwrap();
        assert_eq!(
            wrapped.to_bytes().as_ref(),
            hex!("84f280020a4f0030f149209e17b39700")
        );
    }

    #[test]
    fn test_wrap_rejects_oversized_data() {
        let mut wrapper = Scp02Wrapper::new(session_keys(hex!("2983ba77d709c2daa1e6000abccac951")));
        let cmd = Command::new_with_data(0x80, 0xE8, 0x00, 0x00, vec![0u8; 248]);

        assert!(matches!(
            wrapper.wrap_command(&cmd),
            Err(Error::Command(CommandError::DataTooLong(256, 255)))
        ));
        assert!(wrapper.icv().is_none());
    }

    #[test]
    fn test_wrap_with_encryption() {
        let mut wrapper = Scp02Wrapper::new(session_keys(hex!("2983ba77d709c2daa1e6000abccac951")));
        wrapper.set_level(SecurityLevel::MacEnc);

        let cmd = Command::new_with_data(0x80, 0xE4, 0x00, 0x00, hex!("4f07a0000008040001").to_vec());
        let wrapped = wrapper.wrap_command(&cmd).unwrap();
        // 9 bytes of data pad to 16, plus the MAC
        assert_eq!(wrapped.data().len(), 24);
        assert_ne!(&wrapped.data()[..9], hex!("4f07a0000008040001"));

        let empty = Command::new(0x80, 0xE4, 0x00, 0x00);
        assert_eq!(wrapper.wrap_command(&empty).unwrap().data().len(), 8);
    }

    #[test]
    fn test_max_block_size_fits_wrapped_load() {
        for level in [SecurityLevel::Mac, SecurityLevel::MacEnc] {
            let mut wrapper =
                Scp02Wrapper::new(session_keys(hex!("2983ba77d709c2daa1e6000abccac951")));
            wrapper.set_level(level);

            let max = level.max_block_size();
            let fits = Command::new_with_data(0x80, 0xE8, 0x00, 0x00, vec![0u8; max]);
            assert!(wrapper.wrap_command(&fits).unwrap().data().len() <= MAX_DATA_LEN);

            let too_long = Command::new_with_data(0x80, 0xE8, 0x00, 0x00, vec![0u8; max + 1]);
            assert!(matches!(
                wrapper.wrap_command(&too_long),
                Err(Error::Command(CommandError::DataTooLong(256, 255)))
            ));
        }
        assert_eq!(SecurityLevel::MacEnc.max_block_size(), 239);
    }

    #[test]
    fn test_handshake_establishes_channel() {
        let mut channel = SecureChannel::new(mock(&[&INIT_RESPONSE, &hex!("9000")]));
        channel
            .open_with_challenge(&KeyCandidates::default(), SecurityLevel::Mac, HOST_CHALLENGE)
            .unwrap();

        assert_eq!(channel.state(), SecureChannelState::Established);
        assert_eq!(channel.session().unwrap().key_name(), "default");

        let sent = &channel.transport().commands;
        assert_eq!(sent[0].as_ref(), hex!("8050000008f0467f908e5ca23f00"));
        assert_eq!(
            sent[1].as_ref(),
            hex!("84820100103ce060483aace927a3cda954b0e88839")
        );
    }

    #[test]
    fn test_chained_command_after_handshake() {
        let mut channel = SecureChannel::new(mock(&[&INIT_RESPONSE, &hex!("9000")]));
        channel
            .open_with_challenge(&KeyCandidates::default(), SecurityLevel::Mac, HOST_CHALLENGE)
            .unwrap();

        let delete = Command::new_with_data(0x80, 0xE4, 0x00, 0x00, hex!("4f07a0000008040001").to_vec());
        let response = channel.transmit(&delete).unwrap();
        assert!(response.is_success());

        assert_eq!(
            channel.transport().commands[2].as_ref(),
            hex!("84e40000114f07a000000804000186484189135a6e44")
        );
    }

    #[test]
    fn test_handshake_fails_without_matching_keys() {
        let mut channel = SecureChannel::new(mock(&[&INIT_RESPONSE, &hex!("9000")]));
        let candidates = KeyCandidates::single("status", Keys::from_single_key(STATUS_KEY));

        let result = channel.open_with_challenge(&candidates, SecurityLevel::Mac, HOST_CHALLENGE);
        assert!(matches!(result, Err(Error::AuthenticationFailed(_))));
        assert_eq!(channel.state(), SecureChannelState::Failed);
        assert!(channel.session().is_none());

        // EXTERNAL AUTHENTICATE is never sent
        assert_eq!(channel.transport().commands.len(), 1);

        let cmd = Command::new(0x80, 0xE4, 0x00, 0x00);
        assert!(matches!(channel.transmit(&cmd), Err(Error::ChannelFailed)));
        assert!(matches!(
            channel.open_with_challenge(&KeyCandidates::default(), SecurityLevel::Mac, HOST_CHALLENGE),
            Err(Error::ChannelFailed)
        ));

        channel.reset().unwrap();
        assert_eq!(channel.state(), SecureChannelState::Unestablished);
    }

    #[test]
    fn test_external_authenticate_rejected() {
        let mut channel = SecureChannel::new(mock(&[&INIT_RESPONSE, &hex!("6982")]));

        let result =
            channel.open_with_challenge(&KeyCandidates::default(), SecurityLevel::Mac, HOST_CHALLENGE);
        assert!(matches!(result, Err(Error::AuthenticationFailed(_))));
        assert_eq!(channel.state(), SecureChannelState::Failed);
    }

    #[test]
    fn test_initialize_update_rejected() {
        let mut channel = SecureChannel::new(mock(&[&hex!("6A88")]));

        let result =
            channel.open_with_challenge(&KeyCandidates::default(), SecurityLevel::Mac, HOST_CHALLENGE);
        assert!(matches!(
            result,
            Err(Error::CommandRejected(sw)) if sw == StatusWord::REFERENCED_DATA_NOT_FOUND
        ));
        assert_eq!(channel.state(), SecureChannelState::Failed);
    }

    #[test]
    fn test_transmit_requires_channel() {
        let mut channel = SecureChannel::new(MockTransport::with_success());
        let cmd = Command::new(0x80, 0xE4, 0x00, 0x00);

        assert!(matches!(channel.transmit(&cmd), Err(Error::NoSecureChannel)));
        assert!(channel.transport().commands.is_empty());

        assert!(channel.transmit_plain(&cmd).unwrap().is_success());
    }

    #[test]
    fn test_close_returns_to_unestablished() {
        let mut channel = SecureChannel::new(mock(&[&INIT_RESPONSE, &hex!("9000")]));
        channel
            .open_with_challenge(&KeyCandidates::default(), SecurityLevel::MacEnc, HOST_CHALLENGE)
            .unwrap();
        assert_eq!(channel.security_level(), Some(SecurityLevel::MacEnc));

        channel.close();
        assert_eq!(channel.state(), SecureChannelState::Unestablished);
        assert!(channel.session().is_none());
        assert_eq!(channel.security_level(), None);
    }
}
