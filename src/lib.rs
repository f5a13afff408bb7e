//! Random Universe Cipher - reference implementation.
//!
//! A symmetric, key-derived block cipher: 512-bit master key, 256-bit
//! blocks, and a 3,584-bit internal state of seven 512-bit registers.
//! All round material (registers, routing selectors, round keys, S-boxes)
//! is derived from the master key through domain-separated SHAKE256, and the
//! S-boxes must pass non-linearity, differential-uniformity and
//! algebraic-degree gates before a key is accepted.
//!
//! This crate is the normative reference: it favours clarity and
//! bit-reproducibility over speed, and any accelerated backend must agree
//! with it byte for byte.
//!
//! # Modules
//! | Module | Purpose |
//! |--------|---------|
//! | [`ctr`]  | Counter mode, `nonce || ciphertext` envelope |
//! | [`cbc`]  | Cipher-block chaining, `IV || ciphertext` envelope |
//! | [`aead`] | GCM-style authenticated encryption |
//! | [`sbox`] | S-box generation and quality metrics |
//!
//! # Example
//! ```
//! use ruc_core::{ctr, KeyMaterial, SboxCriteria};
//!
//! let key = [0x42u8; ruc_core::KEY_SIZE];
//! let material = KeyMaterial::expand_with(&key, &SboxCriteria::RELAXED)?;
//! let envelope = ctr::encrypt(&material, &[7u8; ruc_core::NONCE_SIZE], b"attack at dawn")?;
//! assert_eq!(ctr::decrypt(&material, &envelope)?, b"attack at dawn");
//! # Ok::<(), ruc_core::Error>(())
//! ```

pub mod aead;
pub mod cbc;
mod chacha;
pub mod ctr;
mod engine;
pub mod error;
mod gf;
mod limbs;
mod padding;
pub mod sbox;
mod schedule;
mod shake;
mod state;

pub use error::{Error, Result};
pub use sbox::{Sbox, SboxCriteria};
pub use schedule::{KeyMaterial, Selector};
pub use state::CipherState;

/// Block size in bytes (256 bits).
pub const BLOCK_SIZE: usize = 32;

/// Master key size in bytes (512 bits).
pub const KEY_SIZE: usize = 64;

/// IV size in bytes (256 bits).
pub const IV_SIZE: usize = 32;

/// Nonce size in bytes for CTR and AEAD envelopes.
pub const NONCE_SIZE: usize = 16;

/// Number of rounds per block.
pub const ROUNDS: usize = 24;

/// Number of 512-bit state registers.
pub const REGISTER_COUNT: usize = 7;

/// Expand a 64-byte master key under the strict S-box acceptance predicate.
pub fn expand_key(key: &[u8]) -> Result<KeyMaterial> {
    KeyMaterial::expand(key)
}

/// Mix a 32-byte IV into key-expanded state, yielding the per-message
/// initial state.
pub fn mix_iv(material: &KeyMaterial, iv: &[u8]) -> Result<CipherState> {
    material.mix_iv(iv)
}

/// Encrypt one 256-bit block at the given block index. Runs the transform
/// on a private clone of `state`: the keystream for a (key, IV, index)
/// triple is a pure function, so repeated calls agree.
pub fn encrypt_block(
    plaintext: &[u8; BLOCK_SIZE],
    block_index: u64,
    state: &CipherState,
    material: &KeyMaterial,
) -> [u8; BLOCK_SIZE] {
    engine::run_block(material, &mut state.clone(), block_index, plaintext)
}

/// Decrypt one 256-bit block. Identical to [`encrypt_block`]; XOR is
/// self-inverse.
pub fn decrypt_block(
    ciphertext: &[u8; BLOCK_SIZE],
    block_index: u64,
    state: &CipherState,
    material: &KeyMaterial,
) -> [u8; BLOCK_SIZE] {
    engine::run_block(material, &mut state.clone(), block_index, ciphertext)
}
