//! SHAKE256 wrappers and the cipher's domain-separation tags.
//!
//! Every piece of key-derived material comes out of SHAKE256 over
//! `key || tag || index`, with the tags below keeping the derivations disjoint.

use sha3::{
    digest::{ExtendableOutput, Update, XofReader},
    Shake256,
};

/// ASCII domain-separation tags. Changing any of these changes every
/// ciphertext ever produced.
pub(crate) mod domain {
    pub const REG: &[u8] = b"RUC-REG";
    pub const SEL: &[u8] = b"RUC-SEL";
    pub const PERM: &[u8] = b"RUC-PERM";
    pub const RK: &[u8] = b"RUC-RK";
    pub const SBOX: &[u8] = b"RUC-SBOX";
    pub const CONST: &[u8] = b"RUC-CONST";
    pub const IV_EXPAND: &[u8] = b"RUC-IV-EXPAND";
    pub const PRIO: &[u8] = b"RUC-PRIO";
    pub const KS: &[u8] = b"RUC-KS";
    pub const GCM_ENC: &[u8] = b"RUC-GCM-ENC";
    pub const GCM_AUTH: &[u8] = b"RUC-GCM-AUTH";
    pub const GCM_IV: &[u8] = b"RUC-GCM-IV";
    pub const CTR_IV: &[u8] = b"RUC-CTR-IV";
    /// Historical counter tag. Not RUC-prefixed; changing it would break
    /// every existing CTR ciphertext.
    pub const CTR_COUNTER: &[u8] = b"CTR";
}

/// Compute SHAKE256 over the concatenation of `parts`, filling `output`.
/// Byte-identical to hashing the concatenated buffer in one call.
pub(crate) fn shake256_into(parts: &[&[u8]], output: &mut [u8]) {
    let mut hasher = Shake256::default();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize_xof().read(output);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_known_answer() {
        // FIPS-202 SHAKE256(""), first 32 bytes.
        let mut out = [0u8; 32];
        shake256_into(&[], &mut out);
        assert_eq!(
            hex::encode(out),
            "46b9dd2b0ba88d1323b3feb743eeb243fcd52ea62b81b82b50c27646ed5762fd"
        );
    }

    #[test]
    fn multi_part_matches_single_part() {
        let mut split = [0u8; 48];
        shake256_into(&[b"RUC", b"-", b"TEST", &[0, 7]], &mut split);
        let mut whole = [0u8; 48];
        shake256_into(&[b"RUC-TEST\x00\x07"], &mut whole);
        assert_eq!(split, whole);
    }

    #[test]
    fn output_lengths_are_a_prefix_chain() {
        let mut long = [0u8; 128];
        shake256_into(&[b"prefix property"], &mut long);
        let mut short = [0u8; 17];
        shake256_into(&[b"prefix property"], &mut short);
        assert_eq!(&long[..17], &short[..]);
    }
}
