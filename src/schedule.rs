//! Key expansion.
//!
//! Everything the round engine consumes is derived here, once per key:
//! seven 512-bit registers, an odd-selector routing list, 24 round keys and
//! 24 quality-checked S-boxes. Identical keys yield identical material.

use zeroize::Zeroize;

use crate::chacha::ChaChaReader;
use crate::error::{Error, Result};
use crate::limbs::{Register, REGISTER_BYTES};
use crate::sbox::{Sbox, SboxCriteria};
use crate::shake::{domain, shake256_into};
use crate::{KEY_SIZE, REGISTER_COUNT, ROUNDS};

/// An odd 16-bit routing value together with its derived key constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selector {
    pub(crate) value: u16,
    pub(crate) konst: u8,
}

impl Selector {
    /// The routing value itself; always odd and non-zero.
    pub fn value(&self) -> u16 {
        self.value
    }
}

/// All per-key material. Immutable after construction; any number of
/// encryption tasks may read it concurrently. Wiped on drop.
pub struct KeyMaterial {
    pub(crate) master: [u8; KEY_SIZE],
    pub(crate) registers: [Register; REGISTER_COUNT],
    pub(crate) selectors: Vec<Selector>,
    pub(crate) round_keys: Vec<Register>,
    pub(crate) sboxes: Vec<Sbox>,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

impl KeyMaterial {
    /// Expand a 64-byte master key under the normative strict S-box
    /// acceptance predicate.
    pub fn expand(key: &[u8]) -> Result<Self> {
        Self::expand_with(key, &SboxCriteria::STRICT)
    }

    /// Expand a 64-byte master key under explicit S-box acceptance criteria.
    pub fn expand_with(key: &[u8], criteria: &SboxCriteria) -> Result<Self> {
        let master: [u8; KEY_SIZE] = key.try_into().map_err(|_| Error::InvalidKeyLength)?;

        let mut registers = [Register::default(); REGISTER_COUNT];
        for (i, reg) in registers.iter_mut().enumerate() {
            let mut bytes = [0u8; REGISTER_BYTES];
            shake256_into(&[&master, domain::REG, &[i as u8]], &mut bytes);
            *reg = Register::from_be_bytes(&bytes);
        }

        let selectors = derive_selectors(&master);

        let mut round_keys = Vec::with_capacity(ROUNDS);
        for r in 0..ROUNDS as u16 {
            let mut bytes = [0u8; REGISTER_BYTES];
            shake256_into(&[&master, domain::RK, &r.to_be_bytes()], &mut bytes);
            round_keys.push(Register::from_be_bytes(&bytes));
        }

        let mut sboxes = Vec::with_capacity(ROUNDS);
        for r in 0..ROUNDS as u16 {
            sboxes.push(Sbox::generate(&master, r, criteria)?);
        }

        Ok(KeyMaterial {
            master,
            registers,
            selectors,
            round_keys,
            sboxes,
        })
    }

    /// The selector routing list, in its per-key permuted order.
    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.master.zeroize();
        for reg in &mut self.registers {
            reg.wipe();
        }
        for rk in &mut self.round_keys {
            rk.wipe();
        }
        for sbox in &mut self.sboxes {
            sbox.table.zeroize();
        }
        for sel in &mut self.selectors {
            sel.value = 0;
            sel.konst = 0;
        }
    }
}

/// Derive the selector list: `16 + (K[1] mod 16)` odd 16-bit values, each
/// paired with its key constant, then permuted by a key-seeded Fisher–Yates.
fn derive_selectors(master: &[u8; KEY_SIZE]) -> Vec<Selector> {
    let count = 16 + usize::from(master[1] % 16);

    let mut selectors = Vec::with_capacity(count);
    for j in 0..count as u16 {
        let mut bytes = [0u8; 2];
        shake256_into(&[master, domain::SEL, &j.to_be_bytes()], &mut bytes);
        let mut value = u16::from_be_bytes(bytes);
        if value % 2 == 0 {
            value += 1;
        }
        if value == 0 {
            value = 1;
        }
        selectors.push(Selector {
            value,
            konst: key_constant(master, value),
        });
    }

    let mut seed = [0u8; 32];
    shake256_into(&[master, domain::PERM], &mut seed);
    let mut stream = ChaChaReader::new(&seed);
    for i in (1..count).rev() {
        let j = stream.next_u32() as usize % (i + 1);
        selectors.swap(i, j);
    }
    selectors
}

/// First byte of `SHAKE256(K || "RUC-CONST" || u16be(sel), 1)`.
fn key_constant(master: &[u8; KEY_SIZE], selector: u16) -> u8 {
    let mut byte = [0u8; 1];
    shake256_into(&[master, domain::CONST, &selector.to_be_bytes()], &mut byte);
    byte[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(key_byte: u8) -> KeyMaterial {
        KeyMaterial::expand_with(&[key_byte; KEY_SIZE], &SboxCriteria::RELAXED).unwrap()
    }

    #[test]
    fn rejects_short_and_long_keys() {
        assert_eq!(
            KeyMaterial::expand_with(&[0u8; 32], &SboxCriteria::RELAXED).unwrap_err(),
            Error::InvalidKeyLength
        );
        assert_eq!(
            KeyMaterial::expand_with(&[0u8; 65], &SboxCriteria::RELAXED).unwrap_err(),
            Error::InvalidKeyLength
        );
    }

    #[test]
    fn expansion_is_pure() {
        let a = material(0x11);
        let b = material(0x11);
        assert_eq!(a.registers, b.registers);
        assert_eq!(a.selectors, b.selectors);
        assert_eq!(a.round_keys, b.round_keys);
        for (x, y) in a.sboxes.iter().zip(b.sboxes.iter()) {
            assert_eq!(x.table(), y.table());
        }
    }

    #[test]
    fn selector_count_tracks_second_key_byte() {
        let mut key = [0u8; KEY_SIZE];
        key[1] = 0;
        let km = KeyMaterial::expand_with(&key, &SboxCriteria::RELAXED).unwrap();
        assert_eq!(km.selectors.len(), 16);

        key[1] = 15;
        let km = KeyMaterial::expand_with(&key, &SboxCriteria::RELAXED).unwrap();
        assert_eq!(km.selectors.len(), 31);

        key[1] = 16;
        let km = KeyMaterial::expand_with(&key, &SboxCriteria::RELAXED).unwrap();
        assert_eq!(km.selectors.len(), 16);
    }

    #[test]
    fn selectors_are_odd_and_nonzero() {
        for key_byte in [0x00, 0x42, 0xFF] {
            let km = material(key_byte);
            for sel in km.selectors() {
                assert_eq!(sel.value() % 2, 1);
                assert_ne!(sel.value(), 0);
            }
        }
    }

    #[test]
    fn permutation_preserves_the_selector_multiset() {
        let km = material(0x42);
        // Re-derive the pre-shuffle values straight from the SHAKE stream
        // and compare as multisets.
        let mut expected = Vec::new();
        for j in 0..km.selectors.len() as u16 {
            let mut bytes = [0u8; 2];
            shake256_into(&[&km.master, domain::SEL, &j.to_be_bytes()], &mut bytes);
            let mut value = u16::from_be_bytes(bytes);
            if value % 2 == 0 {
                value += 1;
            }
            expected.push(value);
        }
        let mut got: Vec<u16> = km.selectors().iter().map(|s| s.value()).collect();
        expected.sort_unstable();
        got.sort_unstable();
        assert_eq!(got, expected);
    }

    #[test]
    fn key_constants_match_their_derivation() {
        let km = material(0x37);
        for sel in km.selectors() {
            assert_eq!(sel.konst, key_constant(&km.master, sel.value));
        }
    }

    #[test]
    fn registers_differ_between_keys() {
        let a = material(0x00);
        let b = material(0x01);
        assert_ne!(a.registers, b.registers);
        assert_ne!(a.round_keys, b.round_keys);
    }
}
