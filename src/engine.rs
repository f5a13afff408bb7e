//! The 24-round block transform.
//!
//! Per block: order the selectors by a key/IV/index-seeded priority draw,
//! run 24 rounds of selector-routed register mutation while summing round
//! bytes into the accumulator, then squeeze the keystream out of the final
//! state with SHAKE256 and XOR it over the data. Decryption is the same
//! transform; XOR is self-inverse.

use sha3::{
    digest::{ExtendableOutput, Update, XofReader},
    Shake256,
};

use crate::chacha::ChaChaReader;
use crate::gf;
use crate::limbs::{Accumulator, Register, REGISTER_BYTES};
use crate::schedule::{KeyMaterial, Selector};
use crate::shake::{domain, shake256_into};
use crate::state::CipherState;
use crate::{BLOCK_SIZE, REGISTER_COUNT, ROUNDS};

/// Order the selector list for one block.
///
/// A ChaCha20 stream seeded with `SHAKE256(K || IV || u64be(n) || "RUC-PRIO")`
/// assigns each slot a priority in 0..7; the list is stable-sorted by
/// priority, so ties keep their per-key order.
fn order_selectors(material: &KeyMaterial, state: &CipherState, block_index: u64) -> Vec<Selector> {
    let mut seed = [0u8; 32];
    shake256_into(
        &[
            &material.master,
            &state.iv,
            &block_index.to_be_bytes(),
            domain::PRIO,
        ],
        &mut seed,
    );
    let mut stream = ChaChaReader::new(&seed);

    let mut prioritised: Vec<(u32, Selector)> = material
        .selectors
        .iter()
        .map(|&sel| (stream.next_u32() % 7, sel))
        .collect();
    prioritised.sort_by_key(|&(priority, _)| priority);
    prioritised.into_iter().map(|(_, sel)| sel).collect()
}

/// Run the block transform on `state`, returning `input` XOR keystream.
///
/// Mutates the registers through all 24 rounds; the caller decides whether
/// those mutations survive (CBC) or are discarded with a per-block clone
/// (CTR). Ciphertext feedback is separate, see [`fold_ciphertext`].
pub(crate) fn run_block(
    material: &KeyMaterial,
    state: &mut CipherState,
    block_index: u64,
    input: &[u8; BLOCK_SIZE],
) -> [u8; BLOCK_SIZE] {
    let ordered = order_selectors(material, state, block_index);
    let mut accumulator = Accumulator::new();

    for round in 0..ROUNDS {
        let sbox = &material.sboxes[round];
        let round_key_low = material.round_keys[round].low_u32();

        for sel in &ordered {
            let place = ((state.registers[0].low_u32()
                ^ u32::from(sel.value)
                ^ round_key_low)
                % REGISTER_COUNT as u32) as usize;

            let doubled = sel.value.wrapping_mul(2);
            let state_byte = state.registers[place].top_byte();
            let gf_result = gf::mul(doubled as u8, state_byte) ^ sel.konst;
            let result = sbox.lookup(gf_result);

            let reg = &mut state.registers[place];
            *reg = gf::mul_register(*reg, result);
            reg.xor_low(u64::from(result) << (sel.value % 16));
            let low = reg.low_byte();
            reg.xor_low(u64::from(sbox.lookup(low)));
            *reg = reg.rotate_left(1);

            let neighbour = state.registers[(place + 1) % REGISTER_COUNT];
            state.registers[place] ^= neighbour;

            accumulator.add_byte(result);
        }

        // Inter-round diffusion over a snapshot: all seven registers read
        // the pre-diffusion values.
        let snapshot = state.registers;
        for (i, reg) in state.registers.iter_mut().enumerate() {
            *reg = snapshot[i]
                ^ snapshot[(i + 1) % REGISTER_COUNT]
                ^ snapshot[(i + 2) % REGISTER_COUNT];
        }
    }

    let keystream = squeeze_keystream(&accumulator, state, block_index);
    let mut output = [0u8; BLOCK_SIZE];
    for (o, (i, k)) in output.iter_mut().zip(input.iter().zip(keystream.iter())) {
        *o = i ^ k;
    }
    output
}

/// Keystream emission: SHAKE256 over the accumulator, the seven registers,
/// the "RUC-KS" tag and the block index.
fn squeeze_keystream(
    accumulator: &Accumulator,
    state: &CipherState,
    block_index: u64,
) -> [u8; BLOCK_SIZE] {
    let mut hasher = Shake256::default();
    hasher.update(&accumulator.to_be_bytes());
    for reg in &state.registers {
        hasher.update(&reg.to_be_bytes());
    }
    hasher.update(domain::KS);
    hasher.update(&block_index.to_be_bytes());

    let mut keystream = [0u8; BLOCK_SIZE];
    hasher.finalize_xof().read(&mut keystream);
    keystream
}

/// Fold the CTR block counter into register 0.
pub(crate) fn fold_counter(state: &mut CipherState, block_index: u64) {
    let mut mask = [0u8; REGISTER_BYTES];
    shake256_into(
        &[&block_index.to_be_bytes(), domain::CTR_COUNTER],
        &mut mask,
    );
    state.registers[0] ^= Register::from_be_bytes(&mask);
}

/// Ciphertext feedback: lift the 256-bit ciphertext into each register,
/// shifted left by `(i * 37) mod 256` bits. Exercised by CBC only.
pub(crate) fn fold_ciphertext(state: &mut CipherState, ciphertext: &[u8; BLOCK_SIZE]) {
    let lifted = Register::from_low_bytes(ciphertext);
    for (i, reg) in state.registers.iter_mut().enumerate() {
        *reg ^= lifted.shift_left((i as u32 * 37) % 256);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sbox::SboxCriteria;
    use crate::{IV_SIZE, KEY_SIZE};

    fn material() -> KeyMaterial {
        KeyMaterial::expand_with(&[0x42u8; KEY_SIZE], &SboxCriteria::RELAXED).unwrap()
    }

    #[test]
    fn selector_ordering_is_deterministic_per_block() {
        let km = material();
        let state = km.mix_iv(&[0u8; IV_SIZE]).unwrap();
        let a = order_selectors(&km, &state, 5);
        let b = order_selectors(&km, &state, 5);
        assert_eq!(a, b);
        assert_eq!(a.len(), km.selectors().len());
    }

    #[test]
    fn selector_ordering_depends_on_block_index() {
        let km = material();
        let state = km.mix_iv(&[0u8; IV_SIZE]).unwrap();
        // The orderings are permutations of the same list; with 7 priority
        // buckets over 16..=31 slots, two blocks almost surely differ.
        let a = order_selectors(&km, &state, 0);
        let b = order_selectors(&km, &state, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn transform_is_a_pure_function_of_its_inputs() {
        let km = material();
        let initial = km.mix_iv(&[9u8; IV_SIZE]).unwrap();
        let block = [0xA5u8; BLOCK_SIZE];

        let mut s1 = initial.clone();
        let mut s2 = initial.clone();
        assert_eq!(
            run_block(&km, &mut s1, 3, &block),
            run_block(&km, &mut s2, 3, &block)
        );
        assert_eq!(s1.registers, s2.registers);
    }

    #[test]
    fn transform_round_trips() {
        let km = material();
        let initial = km.mix_iv(&[9u8; IV_SIZE]).unwrap();
        let plaintext = [0x3Cu8; BLOCK_SIZE];

        let ciphertext = run_block(&km, &mut initial.clone(), 0, &plaintext);
        let recovered = run_block(&km, &mut initial.clone(), 0, &ciphertext);
        assert_eq!(recovered, plaintext);
        assert_ne!(ciphertext, plaintext);
    }

    #[test]
    fn block_index_changes_the_keystream() {
        let km = material();
        let initial = km.mix_iv(&[9u8; IV_SIZE]).unwrap();
        let zero = [0u8; BLOCK_SIZE];

        let a = run_block(&km, &mut initial.clone(), 0, &zero);
        let b = run_block(&km, &mut initial.clone(), 1, &zero);
        assert_ne!(a, b);
    }

    #[test]
    fn counter_fold_touches_register_zero_only() {
        let km = material();
        let initial = km.mix_iv(&[0u8; IV_SIZE]).unwrap();
        let mut folded = initial.clone();
        fold_counter(&mut folded, 7);
        assert_ne!(folded.registers[0], initial.registers[0]);
        for i in 1..REGISTER_COUNT {
            assert_eq!(folded.registers[i], initial.registers[i]);
        }
    }

    #[test]
    fn ciphertext_feedback_perturbs_every_register() {
        let km = material();
        let initial = km.mix_iv(&[0u8; IV_SIZE]).unwrap();
        let mut fed = initial.clone();
        let mut ciphertext = [0u8; BLOCK_SIZE];
        ciphertext[BLOCK_SIZE - 1] = 1;
        fold_ciphertext(&mut fed, &ciphertext);
        for i in 0..REGISTER_COUNT {
            assert_ne!(fed.registers[i], initial.registers[i], "register {i}");
        }
    }
}
