//! PKCS#7 padding with the cipher's 32-byte blocks.
//!
//! The always-pad policy applies: a message whose length is already a
//! multiple of 32 still gains a full block of padding, so the unpadder never
//! has to guess.

use crate::error::{Error, Result};
use crate::BLOCK_SIZE;

/// Pad `data` out to a whole number of blocks.
pub(crate) fn pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_len as u8);
    padded
}

/// Strip and validate PKCS#7 padding. The input must be a non-empty whole
/// number of blocks.
pub(crate) fn unpad(mut data: Vec<u8>) -> Result<Vec<u8>> {
    let last = *data.last().ok_or(Error::InvalidPadding)?;
    let pad_len = usize::from(last);
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return Err(Error::InvalidPadding);
    }
    if data[data.len() - pad_len..].iter().any(|&b| b != last) {
        return Err(Error::InvalidPadding);
    }
    data.truncate(data.len() - pad_len);
    Ok(data)
}
