//! Counter mode.
//!
//! Envelope: `nonce (16) || ciphertext (multiple of 32)`. Every block is
//! produced from a fresh clone of the message-initial state with the block
//! counter folded into register 0, so blocks are independent of one another
//! and of the plaintext.

use crate::engine;
use crate::error::{Error, Result};
use crate::padding;
use crate::schedule::KeyMaterial;
use crate::shake::{domain, shake256_into};
use crate::state::CipherState;
use crate::{BLOCK_SIZE, IV_SIZE, NONCE_SIZE};

/// Derive the 32-byte internal IV from a 16-byte nonce.
fn derive_iv(nonce: &[u8]) -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    shake256_into(&[nonce, domain::CTR_IV], &mut iv);
    iv
}

/// Encrypt `plaintext`, returning the `nonce || ciphertext` envelope. The
/// nonce must be unique per key.
pub fn encrypt(material: &KeyMaterial, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return Err(Error::InvalidNonceLength);
    }
    let initial = material.mix_iv(&derive_iv(nonce))?;

    let padded = padding::pad(plaintext);
    let mut envelope = Vec::with_capacity(NONCE_SIZE + padded.len());
    envelope.extend_from_slice(nonce);
    for (index, chunk) in padded.chunks_exact(BLOCK_SIZE).enumerate() {
        envelope.extend_from_slice(&process_block(material, &initial, index as u64, chunk));
    }
    Ok(envelope)
}

/// Decrypt a `nonce || ciphertext` envelope.
pub fn decrypt(material: &KeyMaterial, envelope: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < NONCE_SIZE + BLOCK_SIZE
        || (envelope.len() - NONCE_SIZE) % BLOCK_SIZE != 0
    {
        return Err(Error::InvalidCiphertextLength);
    }
    let (nonce, body) = envelope.split_at(NONCE_SIZE);
    let initial = material.mix_iv(&derive_iv(nonce))?;

    let mut padded = Vec::with_capacity(body.len());
    for (index, chunk) in body.chunks_exact(BLOCK_SIZE).enumerate() {
        padded.extend_from_slice(&process_block(material, &initial, index as u64, chunk));
    }
    padding::unpad(padded)
}

/// One independent counter-mode block: clone the initial state, fold the
/// counter, run the transform. Encryption and decryption are the same
/// operation.
pub(crate) fn process_block(
    material: &KeyMaterial,
    initial: &CipherState,
    index: u64,
    data: &[u8],
) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    block.copy_from_slice(data);

    let mut working = initial.clone();
    engine::fold_counter(&mut working, index);
    engine::run_block(material, &mut working, index, &block)
}
