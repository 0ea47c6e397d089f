//! Card simulator for integration tests
//!
//! Plays the Issuer Security Domain side of SCP02: answers INITIALIZE
//! UPDATE, checks the host cryptogram and verifies every C-MAC against its
//! own chaining value. Commands with a bad MAC get 6982.

#![allow(dead_code, unreachable_pub)]

use std::collections::{BTreeSet, HashMap};

use bytes::{BufMut, Bytes, BytesMut};
use cipher::{BlockDecryptMut, Iv, KeyIvInit, block_padding::Iso7816};
use des::TdesEde3;
use gpcard_apdu_core::{CardTransport, Command, TransportError};
use gpcard_globalplatform::{
    Keys,
    constants::{cla, ins, install_p1},
    crypto::{
        CardChallenge, HostChallenge, Scp02, SequenceCounter, calculate_cryptogram, encrypt_icv,
        mac_full_3des, resize_key,
    },
    session::SessionKeys,
};

pub const SW_OK: [u8; 2] = [0x90, 0x00];
pub const SW_NOT_FOUND: [u8; 2] = [0x6A, 0x88];
pub const SW_SECURITY: [u8; 2] = [0x69, 0x82];
pub const SW_WRONG_DATA: [u8; 2] = [0x6A, 0x80];
pub const SW_INS_NOT_SUPPORTED: [u8; 2] = [0x6D, 0x00];

/// One LOAD the card accepted or rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedBlock {
    pub p1: u8,
    pub p2: u8,
    pub data: Bytes,
}

#[derive(Debug)]
pub struct CardSimulator {
    keys: Keys,
    sequence_counter: SequenceCounter,
    card_challenge: CardChallenge,
    session: Option<SessionKeys>,
    pending_host_challenge: Option<HostChallenge>,
    icv: Option<Iv<Scp02>>,
    pub authenticated: bool,
    /// Command data is encrypted after EXTERNAL AUTHENTICATE P1 03
    pub encrypted: bool,
    /// AIDs currently on the card
    pub objects: BTreeSet<Vec<u8>>,
    /// AIDs whose DELETE answers with a fixed status word
    pub delete_overrides: HashMap<Vec<u8>, [u8; 2]>,
    /// LOAD with this P2 is answered with 6A80
    pub fail_load_at: Option<u8>,
    pub loaded_blocks: Vec<ReceivedBlock>,
    pub installed: Vec<Bytes>,
    pub raw_commands: Vec<Bytes>,
    pub mac_failures: usize,
}

impl CardSimulator {
    pub fn new(keys: Keys) -> Self {
        Self {
            keys,
            sequence_counter: [0x00, 0x0d],
            card_challenge: [0xe9, 0xc6, 0x2b, 0xa1, 0xc4, 0xc8],
            session: None,
            pending_host_challenge: None,
            icv: None,
            authenticated: false,
            encrypted: false,
            objects: BTreeSet::new(),
            delete_overrides: HashMap::new(),
            fail_load_at: None,
            loaded_blocks: Vec::new(),
            installed: Vec::new(),
            raw_commands: Vec::new(),
            mac_failures: 0,
        }
    }

    pub fn with_objects<I, A>(mut self, aids: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        self.objects.extend(aids.into_iter().map(|a| a.as_ref().to_vec()));
        self
    }

    /// Raw commands with the given INS, in the order received
    pub fn commands_with_ins(&self, instruction: u8) -> Vec<Command> {
        self.raw_commands
            .iter()
            .filter_map(|raw| Command::from_bytes(raw).ok())
            .filter(|cmd| cmd.instruction() == instruction)
            .collect()
    }

    fn respond(payload: &[u8], sw: [u8; 2]) -> Bytes {
        let mut out = BytesMut::with_capacity(payload.len() + 2);
        out.put_slice(payload);
        out.put_slice(&sw);
        out.freeze()
    }

    fn initialize_update(&mut self, command: &Command) -> Bytes {
        let Ok(host_challenge) = HostChallenge::try_from(command.data().as_ref()) else {
            return Self::respond(&[], SW_WRONG_DATA);
        };

        let session = SessionKeys::derive(&self.keys, &self.sequence_counter);
        let card_cryptogram = calculate_cryptogram(
            session.enc(),
            &self.sequence_counter,
            &self.card_challenge,
            &host_challenge,
            false,
        );

        self.session = Some(session);
        self.pending_host_challenge = Some(host_challenge);
        self.icv = None;
        self.authenticated = false;
        self.encrypted = false;

        let mut payload = BytesMut::with_capacity(28);
        payload.put_slice(&[0u8; 10]);
        payload.put_slice(&[0x20, 0x02]);
        payload.put_slice(&self.sequence_counter);
        payload.put_slice(&self.card_challenge);
        payload.put_slice(&card_cryptogram);
        Self::respond(&payload, SW_OK)
    }

    /// Check the trailing C-MAC and return the unwrapped data
    fn verify_mac(&mut self, command: &Command) -> Option<Bytes> {
        let session = self.session.as_ref()?;
        let data = command.data();
        if data.len() < 8 {
            return None;
        }
        let (body, mac) = data.split_at(data.len() - 8);

        let mut mac_data = BytesMut::new();
        mac_data.put_slice(&[
            command.class(),
            command.instruction(),
            command.p1(),
            command.p2(),
            data.len() as u8,
        ]);
        mac_data.put_slice(body);

        let icv = match &self.icv {
            Some(previous) => encrypt_icv(session.mac(), previous),
            None => Iv::<Scp02>::default(),
        };
        let expected = mac_full_3des(session.mac(), &icv, &mac_data);
        if expected != mac {
            return None;
        }

        self.icv = Some(expected.into());
        Some(Bytes::copy_from_slice(body))
    }

    fn decrypt(&self, data: Bytes) -> Option<Bytes> {
        if !self.encrypted || data.is_empty() {
            return Some(data);
        }
        let session = self.session.as_ref()?;
        cbc::Decryptor::<TdesEde3>::new(&resize_key(session.enc()), &Iv::<Scp02>::default())
            .decrypt_padded_vec_mut::<Iso7816>(&data)
            .ok()
            .map(Bytes::from)
    }

    fn external_authenticate(&mut self, p1: u8, data: &[u8]) -> Bytes {
        let (Some(session), Some(host_challenge)) =
            (self.session.as_ref(), self.pending_host_challenge.take())
        else {
            return Self::respond(&[], SW_SECURITY);
        };

        let expected = calculate_cryptogram(
            session.enc(),
            &self.sequence_counter,
            &self.card_challenge,
            &host_challenge,
            true,
        );
        if data != expected {
            return Self::respond(&[], SW_SECURITY);
        }

        self.authenticated = true;
        self.encrypted = p1 & 0x02 != 0;
        Self::respond(&[], SW_OK)
    }

    fn delete(&mut self, data: &[u8]) -> Bytes {
        let [0x4F, len, aid @ ..] = data else {
            return Self::respond(&[], SW_WRONG_DATA);
        };
        if usize::from(*len) != aid.len() {
            return Self::respond(&[], SW_WRONG_DATA);
        }

        if let Some(sw) = self.delete_overrides.get(aid) {
            return Self::respond(&[], *sw);
        }
        if self.objects.remove(aid) {
            Self::respond(&[], SW_OK)
        } else {
            Self::respond(&[], SW_NOT_FOUND)
        }
    }

    fn handle(&mut self, command: &Command) -> Bytes {
        if command.class() == cla::GP && command.instruction() == ins::INITIALIZE_UPDATE {
            return self.initialize_update(command);
        }
        if command.class() == cla::ISO7816 && command.instruction() == ins::SELECT {
            return Self::respond(&[0x6F, 0x00], SW_OK);
        }
        if command.class() & cla::SECURE_MESSAGING == 0 {
            return Self::respond(&[], SW_SECURITY);
        }

        let Some(data) = self.verify_mac(command) else {
            self.mac_failures += 1;
            return Self::respond(&[], SW_SECURITY);
        };

        if command.instruction() == ins::EXTERNAL_AUTHENTICATE {
            return self.external_authenticate(command.p1(), &data);
        }
        if !self.authenticated {
            return Self::respond(&[], SW_SECURITY);
        }
        let Some(data) = self.decrypt(data) else {
            return Self::respond(&[], SW_WRONG_DATA);
        };

        match command.instruction() {
            ins::DELETE => self.delete(&data),
            ins::INSTALL => {
                if command.p1() == install_p1::FOR_LOAD {
                    self.loaded_blocks.clear();
                }
                self.installed.push(data);
                Self::respond(&[], SW_OK)
            }
            ins::LOAD => {
                let block = ReceivedBlock {
                    p1: command.p1(),
                    p2: command.p2(),
                    data,
                };
                self.loaded_blocks.push(block);
                if self.fail_load_at == Some(command.p2()) {
                    Self::respond(&[], SW_WRONG_DATA)
                } else {
                    Self::respond(&[], SW_OK)
                }
            }
            _ => Self::respond(&[], SW_INS_NOT_SUPPORTED),
        }
    }
}

impl CardTransport for CardSimulator {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.raw_commands.push(Bytes::copy_from_slice(command));
        let command = Command::from_bytes(command)
            .map_err(|_| TransportError::other("unparseable command"))?;
        Ok(self.handle(&command))
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.session = None;
        self.icv = None;
        self.authenticated = false;
        self.encrypted = false;
        Ok(())
    }
}
