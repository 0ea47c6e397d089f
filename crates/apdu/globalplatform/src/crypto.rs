//! Cryptographic operations for the GlobalPlatform SCP02 protocol
//!
//! Session key derivation, card/host cryptograms, the SCP02 retail MAC and
//! command data encryption. The block ciphers come from the RustCrypto
//! `des`/`cbc` crates; this module only chains them the way SCP02 requires.

use cbc_mac::{CbcMac, Mac};
use cipher::{
    BlockEncrypt, BlockEncryptMut, Iv, IvSizeUser, Key, KeyInit, KeyIvInit, KeySizeUser,
    block_padding::{Iso7816, RawPadding},
    consts::{U8, U16},
    generic_array::GenericArray,
};
use des::{Des, TdesEde3};

/// Static or session key: 16-byte two-key 3DES
pub type Scp02Key = [u8; 16];
/// Derivation constant selecting which session key is produced
pub type Purpose = [u8; 2];
/// Sequence counter reported by the card in INITIALIZE UPDATE
pub type SequenceCounter = [u8; 2];
/// Card challenge reported by the card in INITIALIZE UPDATE
pub type CardChallenge = [u8; 6];
/// Random challenge chosen by the host
pub type HostChallenge = [u8; 8];
/// Card or host authentication cryptogram
pub type Cryptogram = [u8; 8];
/// C-MAC appended to wrapped commands
pub type Scp02Mac = [u8; 8];

/// Derivation purpose for the encryption key
pub const DERIVATION_ENC: Purpose = [0x01, 0x82];
/// Derivation purpose for the MAC key
pub const DERIVATION_MAC: Purpose = [0x01, 0x01];
/// Derivation purpose for the data encryption key
pub const DERIVATION_DEK: Purpose = [0x01, 0x81];

/// DES block length
pub const BLOCK_LEN: usize = 8;

/// Placeholder struct for defining SCP02 cryptographic parameters
#[allow(missing_debug_implementations)]
pub struct Scp02;

impl KeySizeUser for Scp02 {
    type KeySize = U16;
}

impl IvSizeUser for Scp02 {
    type IvSize = U8;
}

/// Derive a session key from a static card key
///
/// `3DES-CBC(K, IV = 0, purpose || seq || 00..00)` over two blocks.
pub fn derive_key(card_key: &Scp02Key, seq: &SequenceCounter, purpose: &Purpose) -> Scp02Key {
    let mut blocks = [GenericArray::default(), GenericArray::default()];
    blocks[0][0..2].copy_from_slice(purpose);
    blocks[0][2..4].copy_from_slice(seq);

    let mut encryptor =
        cbc::Encryptor::<TdesEde3>::new(&resize_key(card_key), &Iv::<Scp02>::default());
    encryptor.encrypt_blocks_mut(&mut blocks);

    let mut result = Scp02Key::default();
    result[0..8].copy_from_slice(&blocks[0]);
    result[8..16].copy_from_slice(&blocks[1]);
    result
}

/// Calculate the card (`for_host == false`) or host cryptogram
///
/// The card cryptogram covers `host || seq || card_challenge`, the host
/// cryptogram `seq || card_challenge || host`. Both are padded to three
/// blocks and the last 3DES-CBC block is returned.
pub fn calculate_cryptogram(
    enc_key: &Scp02Key,
    sequence_counter: &SequenceCounter,
    card_challenge: &CardChallenge,
    host_challenge: &HostChallenge,
    for_host: bool,
) -> Cryptogram {
    let mut blocks = [GenericArray::default(); 3];

    if for_host {
        blocks[0][0..2].copy_from_slice(sequence_counter);
        blocks[0][2..8].copy_from_slice(card_challenge);
        blocks[1][0..8].copy_from_slice(host_challenge);
    } else {
        blocks[0][0..8].copy_from_slice(host_challenge);
        blocks[1][0..2].copy_from_slice(sequence_counter);
        blocks[1][2..8].copy_from_slice(card_challenge);
    }

    Iso7816::raw_pad(&mut blocks[2], 0);
    let mut cipher =
        cbc::Encryptor::<TdesEde3>::new(&resize_key(enc_key), &Iv::<Scp02>::default());
    cipher.encrypt_blocks_mut(&mut blocks);

    blocks[2].into()
}

/// Apply ISO/IEC 9797-1 method 2 padding
///
/// Always appends `80` and then zeros up to the next block boundary, so
/// block-aligned input grows by a whole block.
pub fn pad_iso7816(data: &[u8]) -> Vec<u8> {
    let padded_len = (data.len() / BLOCK_LEN + 1) * BLOCK_LEN;
    let mut padded = vec![0u8; padded_len];
    padded[..data.len()].copy_from_slice(data);
    Iso7816::raw_pad(&mut padded, data.len());
    padded
}

/// Calculate the SCP02 retail MAC
///
/// Every block except the last is chained with single DES under the first
/// half of the key; the last block is encrypted with full 3DES.
pub fn mac_full_3des(key: &Scp02Key, iv: &Iv<Scp02>, data: &[u8]) -> Scp02Mac {
    let padded = pad_iso7816(data);
    let (head, last) = padded.split_at(padded.len() - BLOCK_LEN);

    let mut chain = *iv;
    if !head.is_empty() {
        let mut blocks: Vec<GenericArray<u8, U8>> = head
            .chunks_exact(BLOCK_LEN)
            .map(GenericArray::clone_from_slice)
            .collect();
        let mut des_cbc = cbc::Encryptor::<Des>::new(GenericArray::from_slice(&key[..8]), iv);
        des_cbc.encrypt_blocks_mut(&mut blocks);
        if let Some(tail) = blocks.last() {
            chain = *tail;
        }
    }

    let mut last_block = GenericArray::clone_from_slice(last);
    for (byte, chained) in last_block.iter_mut().zip(chain.iter()) {
        *byte ^= *chained;
    }
    TdesEde3::new(&resize_key(key)).encrypt_block(&mut last_block);

    last_block.into()
}

/// Encrypt the previous MAC to form the next ICV
///
/// Single DES under the first half of the MAC key.
pub fn encrypt_icv(mac_key: &Scp02Key, icv: &Iv<Scp02>) -> Iv<Scp02> {
    let key = GenericArray::from_slice(&mac_key[..8]);
    let mut mac = <CbcMac<Des> as Mac>::new(key);
    mac.update(icv.as_slice());
    mac.finalize().into_bytes()
}

/// Encrypt command data under the session ENC key
///
/// `3DES-CBC(key, IV = 0, data || 80 00..)`.
pub fn encrypt_data(enc_key: &Scp02Key, data: &[u8]) -> Vec<u8> {
    cbc::Encryptor::<TdesEde3>::new(&resize_key(enc_key), &Iv::<Scp02>::default())
        .encrypt_padded_vec_mut::<Iso7816>(data)
}

/// Resize a 16-byte key to the 24-byte `K1 || K2 || K1` 3DES form
pub fn resize_key(key: &Scp02Key) -> Key<TdesEde3> {
    let mut result = Key::<TdesEde3>::default();
    result[..16].copy_from_slice(key);
    result[16..24].copy_from_slice(&key[..8]);
    result
}
