//! Stage signatures
//!
//! A signature is the SHA256 over an ordered list of inputs. Every input is
//! length-prefixed, so moving bytes between neighbouring inputs or swapping
//! two inputs changes the digest.

use sha2::{Digest, Sha256};

/// Number of hex chars shown when a signature is printed for humans
pub const SHORT_LEN: usize = 12;

/// Hash an ordered sequence of inputs into a 64-char hex digest
pub fn hashsum<I, T>(parts: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        let bytes = part.as_ref();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}

/// Display prefix of a signature
pub fn short(signature: &str) -> &str {
    &signature[..SHORT_LEN.min(signature.len())]
}
