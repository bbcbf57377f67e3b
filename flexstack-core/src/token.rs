//! Deterministic resource token generation.
//!
//! ```text
//! input  = len(part_0) + part_0 + ... + len(part_n) + part_n
//!          (len = byte length as a big-endian u64)
//! digest = SHA-256(input)
//! value  = first 8 bytes of digest, big-endian u64
//! token  = base32(value), 13 chars of [a-z2-7], most significant first
//! ```
//!
//! The token carries 64 bits of entropy. Uniqueness of resource names rests
//! on it alone; nothing checks a live registry for collisions.

use sha2::{Digest, Sha256};

use crate::id::ResourceToken;

/// Length of every generated token.
pub const TOKEN_LEN: usize = 13;

const ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Token for a deployment, derived from subscription, seed, and location.
#[must_use]
pub fn generate_token(subscription_id: &str, seed: &str, location: &str) -> ResourceToken {
    derive_token(&[subscription_id, seed, location])
}

/// Token over an arbitrary list of parts.
///
/// Each part is length-prefixed before hashing, so no two distinct part
/// lists share an input, whatever bytes the parts contain.
#[must_use]
pub fn derive_token(parts: &[&str]) -> ResourceToken {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    ResourceToken(encode(u64::from_be_bytes(prefix)))
}

fn encode(mut value: u64) -> String {
    let mut out = [0u8; TOKEN_LEN];
    for slot in out.iter_mut().rev() {
        #[expect(clippy::cast_possible_truncation, reason = "value is masked to 0..32")]
        let idx = (value & 0x1f) as usize;
        *slot = ALPHABET[idx];
        value >>= 5;
    }
    out.iter().map(|&b| char::from(b)).collect()
}
