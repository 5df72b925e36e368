//! Shamir splitting of data keys.

use sharks::{Share, Sharks};

use sigil_core::EncryptionKey;

use crate::error::{EnvelopeError, Result};

/// Most shares a key can be split into.
pub const MAX_SHARES: usize = 255;

/// Split `key` into `count` shares, any `threshold` of which recover it.
pub fn split(key: &EncryptionKey, threshold: u8, count: usize) -> Result<Vec<Vec<u8>>> {
    if threshold == 0 || usize::from(threshold) > count || count > MAX_SHARES {
        return Err(EnvelopeError::EncryptionUnavailable(format!(
            "cannot split into {count} shares with threshold {threshold}"
        )));
    }
    let dealer = Sharks(threshold).dealer(key.as_bytes());
    Ok(dealer.take(count).map(|share| Vec::from(&share)).collect())
}

/// Recover a data key from at least `threshold` shares.
pub fn combine(threshold: u8, shares: &[Vec<u8>]) -> Result<EncryptionKey> {
    let shares = shares
        .iter()
        .map(|bytes| Share::try_from(bytes.as_slice()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| EnvelopeError::MalformedCiphertext(format!("bad key share: {e}")))?;

    let secret = Sharks(threshold)
        .recover(shares.as_slice())
        .map_err(|e| EnvelopeError::MalformedCiphertext(format!("cannot recover key: {e}")))?;
    Ok(EncryptionKey::from_slice(&secret)?)
}
