//! Deterministic ChaCha20 byte stream.
//!
//! Used purely as a PRNG for Fisher–Yates permutations and the per-block
//! selector priority draw. The stream is the RFC 8439 keystream under the
//! given 32-byte key with an all-zero 12-byte nonce, block counter starting
//! at 0, bytes consumed left to right.

use chacha20::{
    cipher::{KeyIvInit, StreamCipher},
    ChaCha20, Key, Nonce,
};

const ZERO_NONCE: [u8; 12] = [0u8; 12];

/// An endless reader over a seeded ChaCha20 keystream.
pub struct ChaChaReader {
    cipher: ChaCha20,
}

impl ChaChaReader {
    pub fn new(seed: &[u8; 32]) -> Self {
        let cipher = ChaCha20::new(Key::from_slice(seed), Nonce::from_slice(&ZERO_NONCE));
        ChaChaReader { cipher }
    }

    /// Fill `buf` with the next keystream bytes.
    pub fn fill(&mut self, buf: &mut [u8]) {
        buf.fill(0);
        self.cipher.apply_keystream(buf);
    }

    /// Read the next four bytes as a big-endian u32.
    pub fn next_u32(&mut self) -> u32 {
        let mut word = [0u8; 4];
        self.fill(&mut word);
        u32::from_be_bytes(word)
    }
}
