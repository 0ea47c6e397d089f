//! Keys and session state for the SCP02 secure channel
//!
//! [`Keys`] is a static key set shared with the card. [`KeyCandidates`] is
//! the ordered list of key sets tried during the handshake; the first one
//! whose card cryptogram verifies becomes the [`Session`].

use std::fmt;

use tracing::{debug, trace};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    Error, Result,
    commands::initialize_update::InitializeUpdateResponse,
    crypto::{
        CardChallenge, DERIVATION_DEK, DERIVATION_ENC, DERIVATION_MAC, HostChallenge, Scp02Key,
        SequenceCounter, calculate_cryptogram, derive_key,
    },
};

/// Keycard "status" key, tried first
pub const STATUS_KEY: Scp02Key = [
    0xc2, 0x12, 0xe0, 0x73, 0xff, 0x8b, 0x4b, 0xbf, 0xaf, 0xf4, 0xde, 0x8a, 0xb6, 0x55, 0x22, 0x1f,
];

/// GlobalPlatform default test key
pub const DEFAULT_KEY: Scp02Key = [
    0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0x4a, 0x4b, 0x4c, 0x4d, 0x4e, 0x4f,
];

/// Secure Channel Protocol (SCP) keys
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Keys {
    enc: Scp02Key,
    mac: Scp02Key,
    dek: Scp02Key,
}

impl Keys {
    /// Create a key set from its three components
    pub const fn new(enc: Scp02Key, mac: Scp02Key, dek: Scp02Key) -> Self {
        Self { enc, mac, dek }
    }

    /// Create a new key set where all keys are the same
    pub const fn from_single_key(key: Scp02Key) -> Self {
        Self {
            enc: key,
            mac: key,
            dek: key,
        }
    }

    /// Parse a 16-byte key given as 32 hex characters and use it for all three keys
    pub fn from_hex(key: &str) -> Result<Self> {
        let mut bytes = hex::decode(key).map_err(|_| Error::InvalidKey("not a hex string"))?;
        let parsed = Scp02Key::try_from(bytes.as_slice())
            .map_err(|_| Error::InvalidKey("expected 16 bytes"));
        bytes.zeroize();
        Ok(Self::from_single_key(parsed?))
    }

    /// Get the encryption key
    pub const fn enc(&self) -> &Scp02Key {
        &self.enc
    }

    /// Get the MAC key
    pub const fn mac(&self) -> &Scp02Key {
        &self.mac
    }

    /// Get the data encryption key
    pub const fn dek(&self) -> &Scp02Key {
        &self.dek
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys").finish_non_exhaustive()
    }
}

/// A key set with a label used in logs
#[derive(Debug, Clone)]
pub struct NamedKeys {
    /// Label, e.g. `status` or `default`
    pub name: String,
    /// The key set
    pub keys: Keys,
}

impl NamedKeys {
    /// Label a key set
    pub fn new(name: impl Into<String>, keys: Keys) -> Self {
        Self {
            name: name.into(),
            keys,
        }
    }
}

/// Ordered key sets tried during the handshake; the first match wins
#[derive(Debug, Clone)]
pub struct KeyCandidates(Vec<NamedKeys>);

impl KeyCandidates {
    /// Build a candidate list in the given order
    pub const fn new(candidates: Vec<NamedKeys>) -> Self {
        Self(candidates)
    }

    /// A single key set
    pub fn single(name: impl Into<String>, keys: Keys) -> Self {
        Self(vec![NamedKeys::new(name, keys)])
    }

    /// Append a candidate at the lowest priority
    pub fn push(&mut self, candidate: NamedKeys) {
        self.0.push(candidate);
    }

    /// Iterate in priority order
    pub fn iter(&self) -> impl Iterator<Item = &NamedKeys> {
        self.0.iter()
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no candidates
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for KeyCandidates {
    /// The Keycard status key followed by the GlobalPlatform default key
    fn default() -> Self {
        Self(vec![
            NamedKeys::new("status", Keys::from_single_key(STATUS_KEY)),
            NamedKeys::new("default", Keys::from_single_key(DEFAULT_KEY)),
        ])
    }
}

/// Session keys derived for one secure channel
///
/// Wiped when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    enc: Scp02Key,
    mac: Scp02Key,
    dek: Scp02Key,
}

impl SessionKeys {
    /// Use already derived session keys
    pub const fn new(enc: Scp02Key, mac: Scp02Key, dek: Scp02Key) -> Self {
        Self { enc, mac, dek }
    }

    /// Derive session keys from a static key set and the card's sequence counter
    pub fn derive(keys: &Keys, sequence_counter: &SequenceCounter) -> Self {
        Self {
            enc: derive_key(keys.enc(), sequence_counter, &DERIVATION_ENC),
            mac: derive_key(keys.mac(), sequence_counter, &DERIVATION_MAC),
            dek: derive_key(keys.dek(), sequence_counter, &DERIVATION_DEK),
        }
    }

    /// S-ENC
    pub const fn enc(&self) -> &Scp02Key {
        &self.enc
    }

    /// S-MAC
    pub const fn mac(&self) -> &Scp02Key {
        &self.mac
    }

    /// S-DEK
    pub const fn dek(&self) -> &Scp02Key {
        &self.dek
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

/// Authenticated SCP02 session material
#[derive(Debug, Clone)]
pub struct Session {
    keys: SessionKeys,
    key_name: String,
    key_version: u8,
    sequence_counter: SequenceCounter,
    card_challenge: CardChallenge,
    host_challenge: HostChallenge,
}

impl Session {
    /// Pick the first candidate key set whose card cryptogram matches
    ///
    /// Fails with [`Error::AuthenticationFailed`] when no candidate verifies.
    pub fn from_response(
        candidates: &KeyCandidates,
        response: &InitializeUpdateResponse,
        host_challenge: HostChallenge,
    ) -> Result<Self> {
        for candidate in candidates.iter() {
            let keys = SessionKeys::derive(&candidate.keys, &response.sequence_counter);
            let expected = calculate_cryptogram(
                keys.enc(),
                &response.sequence_counter,
                &response.card_challenge,
                &host_challenge,
                false,
            );

            if expected == response.card_cryptogram {
                debug!(keys = %candidate.name, "Card cryptogram verified");
                return Ok(Self {
                    keys,
                    key_name: candidate.name.clone(),
                    key_version: response.key_version,
                    sequence_counter: response.sequence_counter,
                    card_challenge: response.card_challenge,
                    host_challenge,
                });
            }

            trace!(keys = %candidate.name, "Card cryptogram mismatch");
        }

        Err(Error::AuthenticationFailed("no candidate key verified the card cryptogram"))
    }

    /// Host cryptogram for EXTERNAL AUTHENTICATE
    pub fn host_cryptogram(&self) -> [u8; 8] {
        calculate_cryptogram(
            self.keys.enc(),
            &self.sequence_counter,
            &self.card_challenge,
            &self.host_challenge,
            true,
        )
    }

    /// Get the session keys
    pub const fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    /// Label of the key set that verified
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Key version number reported by the card
    pub const fn key_version(&self) -> u8 {
        self.key_version
    }

    /// Get the card challenge
    pub const fn card_challenge(&self) -> &CardChallenge {
        &self.card_challenge
    }

    /// Get the host challenge
    pub const fn host_challenge(&self) -> &HostChallenge {
        &self.host_challenge
    }

    /// Get the sequence counter
    pub const fn sequence_counter(&self) -> &SequenceCounter {
        &self.sequence_counter
    }
}
