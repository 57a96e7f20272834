//! Share-possession commitments.
//!
//! A guardian publishes `SHA-256(share_bytes ‖ index ‖ salt)` on-chain via
//! the guardian registry. The digest proves possession of a specific share
//! without revealing it; the salt prevents dictionary correlation across
//! wills. The index is mixed in as its decimal string form.

use sha2::{Digest, Sha256};

use heirloom_core::types::Salt;

use crate::shamir::KeyShare;

/// Commitment digest for a share under `salt`.
pub fn commit_share(share: &KeyShare, salt: &Salt) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(&share.bytes);
    hasher.update(share.index.to_string().as_bytes());
    hasher.update(salt.0);
    hasher.finalize().into()
}

/// True iff `digest` commits to exactly this share and salt.
pub fn verify_commit(share: &KeyShare, salt: &Salt, digest: &[u8; 32]) -> bool {
    commit_share(share, salt) == *digest
}
