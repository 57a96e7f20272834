use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::constants::REPUTATION_INITIAL;
use crate::types::{Principal, Timestamp};

/// A guardian as stored in the guardian registry, keyed by principal.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GuardianProfile {
    pub principal: Principal,
    pub active: bool,
    /// Admin-toggled verification flag. Only verified guardians may be
    /// attached to new wills.
    pub verified: bool,
    /// Off-band profile document (URI). Opaque to the engine.
    pub metadata_uri: String,
    /// Hash of the guardian's encryption public key, used by clients when
    /// distributing key shares. Opaque to the engine.
    pub public_key_hash: [u8; 32],
    /// Merkle root over the guardian's share commitments. Opaque.
    pub commitment_root: [u8; 32],
    /// 0..=1000. Starts at 100, +10 per successful release, admin-clippable.
    pub reputation: u32,
    /// Active wills currently referencing this guardian.
    pub total_wills: u32,
    pub successful_releases: u32,
    pub registration_time: Timestamp,
    /// Opaque share-possession commitments published by the guardian.
    pub commitments: BTreeSet<[u8; 32]>,
}

impl GuardianProfile {
    /// Fresh registration: active, unverified, initial reputation.
    pub fn new(
        principal: Principal,
        metadata_uri: String,
        public_key_hash: [u8; 32],
        commitment_root: [u8; 32],
        now: Timestamp,
    ) -> Self {
        Self {
            principal,
            active: true,
            verified: false,
            metadata_uri,
            public_key_hash,
            commitment_root,
            reputation: REPUTATION_INITIAL,
            total_wills: 0,
            successful_releases: 0,
            registration_time: now,
            commitments: BTreeSet::new(),
        }
    }
}
