//! Library-wide error and result types.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the cipher core can produce.
///
/// Nothing else crosses the API boundary: internal arithmetic cannot fail,
/// and partial outputs are never returned.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The master key is not exactly 64 bytes.
    #[error("master key must be 64 bytes")]
    InvalidKeyLength,
    /// The IV is not exactly 32 bytes.
    #[error("IV must be 32 bytes")]
    InvalidIvLength,
    /// The nonce is not exactly 16 bytes.
    #[error("nonce must be 16 bytes")]
    InvalidNonceLength,
    /// An envelope is shorter than its header plus one block (plus the tag
    /// for AEAD), or its body is not a whole number of blocks.
    #[error("ciphertext envelope is truncated or misaligned")]
    InvalidCiphertextLength,
    /// A PKCS#7 pad byte is out of range or the pad bytes disagree.
    #[error("invalid PKCS#7 padding")]
    InvalidPadding,
    /// The AEAD tag did not match. No plaintext was produced.
    #[error("authentication failed")]
    AuthenticationFailed,
    /// No candidate permutation met the S-box acceptance criteria within the
    /// retry budget. Unrecoverable for this key.
    #[error("S-box generation exhausted its retry budget")]
    SboxGenerationFailed,
}
