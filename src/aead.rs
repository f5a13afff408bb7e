//! Authenticated encryption, GCM style.
//!
//! The payload is encrypted in counter mode under a SHAKE-derived sub-key,
//! with payload blocks on counters 1 and up; counter 0 produces the mask
//! that whitens the tag. The tag is a GHASH-style polynomial over GF(2^128)
//! of the padded associated data and ciphertext plus their bit lengths.
//!
//! Envelope: `nonce (16) || ciphertext (multiple of 32) || tag (16)`. The
//! password-bundled layout prepends a 16-byte KDF salt; the KDF itself lives
//! outside this crate.

use subtle::ConstantTimeEq;

use crate::ctr::process_block;
use crate::engine;
use crate::error::{Error, Result};
use crate::padding;
use crate::schedule::KeyMaterial;
use crate::sbox::SboxCriteria;
use crate::shake::{domain, shake256_into};
use crate::state::CipherState;
use crate::{BLOCK_SIZE, IV_SIZE, KEY_SIZE, NONCE_SIZE};

/// Authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// KDF salt length in the password-bundled envelope.
pub const SALT_SIZE: usize = 16;

/// An authenticated-encryption context: the expanded encryption sub-key and
/// the GHASH point.
pub struct Aead {
    material: KeyMaterial,
    auth_point: Block128,
}

impl std::fmt::Debug for Aead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aead").finish_non_exhaustive()
    }
}

impl Aead {
    /// Derive the encryption and authentication sub-keys from a 64-byte
    /// master key and expand the encryption key under `criteria`.
    pub fn new(master_key: &[u8], criteria: &SboxCriteria) -> Result<Self> {
        if master_key.len() != KEY_SIZE {
            return Err(Error::InvalidKeyLength);
        }
        let mut enc_key = [0u8; KEY_SIZE];
        shake256_into(&[master_key, domain::GCM_ENC], &mut enc_key);
        let mut auth_key = [0u8; 32];
        shake256_into(&[master_key, domain::GCM_AUTH], &mut auth_key);

        let mut h = [0u8; TAG_SIZE];
        h.copy_from_slice(&auth_key[..TAG_SIZE]);
        Ok(Aead {
            material: KeyMaterial::expand_with(&enc_key, criteria)?,
            auth_point: Block128::from_be_bytes(&h),
        })
    }

    /// Encrypt and authenticate, returning `nonce || ciphertext || tag`. The
    /// nonce must be unique per key.
    pub fn seal(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        if nonce.len() != NONCE_SIZE {
            return Err(Error::InvalidNonceLength);
        }
        let initial = self.material.mix_iv(&derive_iv(nonce))?;

        let padded = padding::pad(plaintext);
        let mut envelope = Vec::with_capacity(NONCE_SIZE + padded.len() + TAG_SIZE);
        envelope.extend_from_slice(nonce);
        for (i, chunk) in padded.chunks_exact(BLOCK_SIZE).enumerate() {
            envelope.extend_from_slice(&process_block(
                &self.material,
                &initial,
                i as u64 + 1,
                chunk,
            ));
        }

        let tag = self.tag(&initial, aad, &envelope[NONCE_SIZE..]);
        envelope.extend_from_slice(&tag);
        Ok(envelope)
    }

    /// Verify and decrypt a `nonce || ciphertext || tag` envelope. The tag is
    /// checked in constant time before any plaintext is produced.
    pub fn open(&self, aad: &[u8], envelope: &[u8]) -> Result<Vec<u8>> {
        if envelope.len() < NONCE_SIZE + BLOCK_SIZE + TAG_SIZE
            || (envelope.len() - NONCE_SIZE - TAG_SIZE) % BLOCK_SIZE != 0
        {
            return Err(Error::InvalidCiphertextLength);
        }
        let (nonce, rest) = envelope.split_at(NONCE_SIZE);
        let (body, tag) = rest.split_at(rest.len() - TAG_SIZE);
        let initial = self.material.mix_iv(&derive_iv(nonce))?;

        let expected = self.tag(&initial, aad, body);
        if !bool::from(expected.ct_eq(tag)) {
            return Err(Error::AuthenticationFailed);
        }

        let mut padded = Vec::with_capacity(body.len());
        for (i, chunk) in body.chunks_exact(BLOCK_SIZE).enumerate() {
            padded.extend_from_slice(&process_block(
                &self.material,
                &initial,
                i as u64 + 1,
                chunk,
            ));
        }
        padding::unpad(padded)
    }

    /// GHASH over `pad16(aad) || pad16(ct) || u64be(|aad| bits) || u64be(|ct|
    /// bits)`, whitened with the zero-counter keystream block.
    fn tag(&self, initial: &CipherState, aad: &[u8], ciphertext: &[u8]) -> [u8; TAG_SIZE] {
        let mut digest = Block128::ZERO;
        ghash_section(&mut digest, self.auth_point, aad);
        ghash_section(&mut digest, self.auth_point, ciphertext);

        let mut lengths = [0u8; TAG_SIZE];
        lengths[..8].copy_from_slice(&(aad.len() as u64 * 8).to_be_bytes());
        lengths[8..].copy_from_slice(&(ciphertext.len() as u64 * 8).to_be_bytes());
        digest.absorb(self.auth_point, &lengths);

        // Encryption of the zero-counter block; payload counters start at 1.
        let mut mask_state = initial.clone();
        engine::fold_counter(&mut mask_state, 0);
        let mask = engine::run_block(&self.material, &mut mask_state, 0, &[0u8; BLOCK_SIZE]);

        let mut tag = digest.to_be_bytes();
        for (t, m) in tag.iter_mut().zip(mask.iter()) {
            *t ^= m;
        }
        tag
    }
}

/// Derive the AEAD's internal 32-byte IV from a 16-byte nonce.
fn derive_iv(nonce: &[u8]) -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    shake256_into(&[nonce, domain::GCM_IV], &mut iv);
    iv
}

/// Prepend a KDF salt to a sealed envelope:
/// `salt (16) || nonce (16) || ciphertext || tag (16)`.
pub fn bundle_with_salt(salt: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    if salt.len() != SALT_SIZE {
        return Err(Error::InvalidCiphertextLength);
    }
    let mut bundled = Vec::with_capacity(SALT_SIZE + sealed.len());
    bundled.extend_from_slice(salt);
    bundled.extend_from_slice(sealed);
    Ok(bundled)
}

/// Split a password-bundled envelope into the KDF salt and the sealed
/// remainder. The caller feeds the salt to its KDF to recover the master
/// key, then calls [`Aead::open`] on the remainder.
pub fn split_salt(envelope: &[u8]) -> Result<(&[u8], &[u8])> {
    if envelope.len() < SALT_SIZE + NONCE_SIZE + BLOCK_SIZE + TAG_SIZE {
        return Err(Error::InvalidCiphertextLength);
    }
    Ok(envelope.split_at(SALT_SIZE))
}

/// A 128-bit big-endian value for GHASH arithmetic.
#[derive(Clone, Copy, PartialEq, Eq)]
struct Block128 {
    hi: u64,
    lo: u64,
}

impl Block128 {
    const ZERO: Block128 = Block128 { hi: 0, lo: 0 };

    fn from_be_bytes(bytes: &[u8; 16]) -> Self {
        let mut hi = [0u8; 8];
        let mut lo = [0u8; 8];
        hi.copy_from_slice(&bytes[..8]);
        lo.copy_from_slice(&bytes[8..]);
        Block128 {
            hi: u64::from_be_bytes(hi),
            lo: u64::from_be_bytes(lo),
        }
    }

    fn to_be_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.hi.to_be_bytes());
        out[8..].copy_from_slice(&self.lo.to_be_bytes());
        out
    }

    fn xor(self, rhs: Block128) -> Block128 {
        Block128 {
            hi: self.hi ^ rhs.hi,
            lo: self.lo ^ rhs.lo,
        }
    }

    /// One GHASH step: absorb a 16-byte block, `Y <- (Y ^ X) * H`.
    fn absorb(&mut self, h: Block128, block: &[u8; 16]) {
        *self = gf128_mul(self.xor(Block128::from_be_bytes(block)), h);
    }
}

/// GF(2^128) multiply per SP 800-38D, right-shift method, polynomial
/// x^128 + x^7 + x^2 + x + 1.
fn gf128_mul(x: Block128, y: Block128) -> Block128 {
    const R: Block128 = Block128 {
        hi: 0xE100_0000_0000_0000,
        lo: 0,
    };
    let mut z = Block128::ZERO;
    let mut v = y;
    let mut x = x;
    for _ in 0..128 {
        if x.hi & (1 << 63) != 0 {
            z = z.xor(v);
        }
        let lsb = v.lo & 1 != 0;
        v = Block128 {
            lo: (v.lo >> 1) | ((v.hi & 1) << 63),
            hi: v.hi >> 1,
        };
        if lsb {
            v = v.xor(R);
        }
        x = Block128 {
            hi: (x.hi << 1) | (x.lo >> 63),
            lo: x.lo << 1,
        };
    }
    z
}

/// Absorb a byte section in 16-byte blocks, zero-padding the last one.
/// Empty sections contribute nothing.
fn ghash_section(digest: &mut Block128, h: Block128, data: &[u8]) {
    let mut chunks = data.chunks_exact(16);
    for chunk in &mut chunks {
        let mut block = [0u8; 16];
        block.copy_from_slice(chunk);
        digest.absorb(h, &block);
    }
    let rem = chunks.remainder();
    if !rem.is_empty() {
        let mut block = [0u8; 16];
        block[..rem.len()].copy_from_slice(rem);
        digest.absorb(h, &block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aead() -> Aead {
        Aead::new(&[0x42u8; KEY_SIZE], &SboxCriteria::RELAXED).unwrap()
    }

    #[test]
    fn rejects_wrong_key_and_nonce_lengths() {
        assert_eq!(
            Aead::new(&[0u8; 32], &SboxCriteria::RELAXED).unwrap_err(),
            Error::InvalidKeyLength
        );
        let cipher = aead();
        assert_eq!(
            cipher.seal(&[0u8; 12], b"", b"data").unwrap_err(),
            Error::InvalidNonceLength
        );
    }

    #[test]
    fn round_trips_with_and_without_aad() {
        let cipher = aead();
        let nonce = [5u8; NONCE_SIZE];
        for (aad, payload) in [
            (&b""[..], &b""[..]),
            (&b"header"[..], &b""[..]),
            (&b""[..], &b"payload bytes"[..]),
            (&b"header"[..], &[0xA5u8; 100][..]),
        ] {
            let envelope = cipher.seal(&nonce, aad, payload).unwrap();
            assert_eq!(
                envelope.len(),
                NONCE_SIZE + (payload.len() / BLOCK_SIZE + 1) * BLOCK_SIZE + TAG_SIZE
            );
            assert_eq!(cipher.open(aad, &envelope).unwrap(), payload);
        }
    }

    #[test]
    fn aad_is_bound_to_the_tag() {
        let cipher = aead();
        let envelope = cipher.seal(&[5u8; NONCE_SIZE], b"context-1", b"").unwrap();
        assert_eq!(
            cipher.open(b"context-2", &envelope).unwrap_err(),
            Error::AuthenticationFailed
        );
        assert!(cipher.open(b"context-1", &envelope).is_ok());
    }

    #[test]
    fn any_bit_flip_breaks_authentication() {
        let cipher = aead();
        let envelope = cipher
            .seal(&[5u8; NONCE_SIZE], b"aad", b"sixteen byte msg")
            .unwrap();
        for position in 0..envelope.len() {
            let mut tampered = envelope.clone();
            tampered[position] ^= 0x04;
            assert_eq!(
                cipher.open(b"aad", &tampered).unwrap_err(),
                Error::AuthenticationFailed,
                "byte {position}"
            );
        }
    }

    #[test]
    fn truncation_is_rejected_before_verification() {
        let cipher = aead();
        let envelope = cipher.seal(&[5u8; NONCE_SIZE], b"", b"msg").unwrap();
        assert_eq!(
            cipher.open(b"", &envelope[..envelope.len() - 1]).unwrap_err(),
            Error::InvalidCiphertextLength
        );
        assert_eq!(
            cipher.open(b"", &envelope[..NONCE_SIZE + TAG_SIZE]).unwrap_err(),
            Error::InvalidCiphertextLength
        );
    }

    #[test]
    fn salt_bundle_layout() {
        let cipher = aead();
        let sealed = cipher.seal(&[5u8; NONCE_SIZE], b"", b"msg").unwrap();
        let salt = [0xABu8; SALT_SIZE];
        let bundled = bundle_with_salt(&salt, &sealed).unwrap();
        assert_eq!(bundled.len(), SALT_SIZE + sealed.len());

        let (parsed_salt, rest) = split_salt(&bundled).unwrap();
        assert_eq!(parsed_salt, salt);
        assert_eq!(cipher.open(b"", rest).unwrap(), b"msg".to_vec());

        assert_eq!(
            split_salt(&bundled[..SALT_SIZE + NONCE_SIZE]).unwrap_err(),
            Error::InvalidCiphertextLength
        );
        assert_eq!(
            bundle_with_salt(&salt[..8], &sealed).unwrap_err(),
            Error::InvalidCiphertextLength
        );
    }

    #[test]
    fn gf128_known_answer() {
        // NIST GCM test case 2: H = 66e94bd4ef8a2c3b884cfa59ca342b2e,
        // GHASH of a single zero ciphertext block and its length block
        // yields f38cbb1ad69223dcc3457ae5b6b0f885.
        let h = Block128::from_be_bytes(
            &hex_block("66e94bd4ef8a2c3b884cfa59ca342b2e"),
        );
        let mut digest = Block128::ZERO;
        digest.absorb(h, &hex_block("0388dace60b6a392f328c2b971b2fe78"));
        digest.absorb(h, &hex_block("00000000000000000000000000000080"));
        assert_eq!(
            digest.to_be_bytes(),
            hex_block("f38cbb1ad69223dcc3457ae5b6b0f885")
        );
    }

    fn hex_block(s: &str) -> [u8; 16] {
        let mut out = [0u8; 16];
        out.copy_from_slice(&hex::decode(s).unwrap());
        out
    }
}
