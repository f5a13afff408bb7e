//! Cipher-block-chaining mode.
//!
//! Envelope: `IV (32) || ciphertext (multiple of 32)`. Each plaintext block
//! is XORed with the previous ciphertext block (the IV for block 0) before
//! the transform, and every ciphertext block is folded back into the working
//! state, so the mode is inherently sequential.

use crate::engine;
use crate::error::{Error, Result};
use crate::padding;
use crate::schedule::KeyMaterial;
use crate::{BLOCK_SIZE, IV_SIZE};

/// Encrypt `plaintext` under a caller-supplied 32-byte IV, returning the
/// `IV || ciphertext` envelope. The IV must be unique per key.
pub fn encrypt(material: &KeyMaterial, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut state = material.mix_iv(iv)?;

    let padded = padding::pad(plaintext);
    let mut envelope = Vec::with_capacity(IV_SIZE + padded.len());
    envelope.extend_from_slice(iv);

    let mut previous = [0u8; BLOCK_SIZE];
    previous.copy_from_slice(iv);
    for (index, chunk) in padded.chunks_exact(BLOCK_SIZE).enumerate() {
        let mut chained = [0u8; BLOCK_SIZE];
        for (c, (p, prev)) in chained.iter_mut().zip(chunk.iter().zip(previous.iter())) {
            *c = p ^ prev;
        }
        let ciphertext = engine::run_block(material, &mut state, index as u64, &chained);
        engine::fold_ciphertext(&mut state, &ciphertext);
        envelope.extend_from_slice(&ciphertext);
        previous = ciphertext;
    }
    Ok(envelope)
}

/// Decrypt an `IV || ciphertext` envelope.
pub fn decrypt(material: &KeyMaterial, envelope: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < IV_SIZE + BLOCK_SIZE || (envelope.len() - IV_SIZE) % BLOCK_SIZE != 0 {
        return Err(Error::InvalidCiphertextLength);
    }
    let (iv, body) = envelope.split_at(IV_SIZE);
    let mut state = material.mix_iv(iv)?;

    let mut padded = Vec::with_capacity(body.len());
    let mut previous = [0u8; BLOCK_SIZE];
    previous.copy_from_slice(iv);
    for (index, chunk) in body.chunks_exact(BLOCK_SIZE).enumerate() {
        let mut ciphertext = [0u8; BLOCK_SIZE];
        ciphertext.copy_from_slice(chunk);
        // The transform XORs the keystream off; undoing the chain recovers
        // the plaintext block.
        let chained = engine::run_block(material, &mut state, index as u64, &ciphertext);
        engine::fold_ciphertext(&mut state, &ciphertext);
        let mut plain = [0u8; BLOCK_SIZE];
        for (p, (c, prev)) in plain.iter_mut().zip(chained.iter().zip(previous.iter())) {
            *p = c ^ prev;
        }
        padded.extend_from_slice(&plain);
        previous = ciphertext;
    }
    padding::unpad(padded)
}
