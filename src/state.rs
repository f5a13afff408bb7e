//! Per-message cipher state.
//!
//! A message's initial state is the key-expanded registers with the IV
//! absorbed and cross-diffused. CTR clones it per block; CBC mutates one
//! working copy across the whole message.

use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::limbs::{Register, REGISTER_BYTES};
use crate::schedule::KeyMaterial;
use crate::shake::{domain, shake256_into};
use crate::{IV_SIZE, REGISTER_COUNT};

/// The seven working registers plus the IV they were mixed with.
#[derive(Clone)]
pub struct CipherState {
    pub(crate) registers: [Register; REGISTER_COUNT],
    pub(crate) iv: [u8; IV_SIZE],
}

impl std::fmt::Debug for CipherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherState").finish_non_exhaustive()
    }
}

impl KeyMaterial {
    /// Absorb a 32-byte IV into the key-expanded registers and cross-diffuse,
    /// producing the per-message initial state.
    pub fn mix_iv(&self, iv: &[u8]) -> Result<CipherState> {
        let iv: [u8; IV_SIZE] = iv.try_into().map_err(|_| Error::InvalidIvLength)?;

        let mut expanded = [0u8; REGISTER_BYTES];
        shake256_into(&[&iv, domain::IV_EXPAND], &mut expanded);
        let expanded = Register::from_be_bytes(&expanded);

        let mut registers = self.registers;
        for (i, reg) in registers.iter_mut().enumerate() {
            *reg ^= expanded.rotate_left((i as u32 * 73) % 512);
        }

        // Three rounds of cross-diffusion, applied in place, register 0
        // first.
        for _ in 0..3 {
            for i in 0..REGISTER_COUNT {
                let a = registers[(i + 1) % REGISTER_COUNT].rotate_left(17);
                let b = registers[(i + 3) % REGISTER_COUNT].rotate_left(41);
                registers[i] ^= a ^ b;
            }
        }

        Ok(CipherState { registers, iv })
    }
}

impl Drop for CipherState {
    fn drop(&mut self) {
        for reg in &mut self.registers {
            reg.wipe();
        }
        self.iv.zeroize();
    }
}
