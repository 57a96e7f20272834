//! The will record and its state helpers.
//!
//! A [`Will`] is the unit of custody: an owner, an ordered guardian set with
//! a k-of-n approval threshold, an ordered beneficiary set with basis-point
//! shares, the encrypted-payload witnesses, and the liveness/release state
//! machine fields. The record is owned by the will engine; the asset vault
//! and guardian registry reference it only by id and principal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::BASIS_POINTS_DENOM;
use crate::types::{Cid, PayloadHash, Principal, Timestamp, WillId};

/// Compute the default equal split over `n` beneficiaries: `10000 / n` basis
/// points each, with the division remainder assigned to beneficiary 0.
pub fn equal_shares(n: usize) -> Vec<u16> {
    debug_assert!(n > 0);
    let base = (BASIS_POINTS_DENOM / n as u32) as u16;
    let remainder = (BASIS_POINTS_DENOM % n as u32) as u16;
    let mut shares = vec![base; n];
    shares[0] += remainder;
    shares
}

/// A will as stored in the state DB.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Will {
    pub id: WillId,
    /// Principal who created the will. Immutable.
    pub owner: Principal,
    /// Ordered beneficiaries (1..=50, pairwise distinct, none null). Immutable.
    pub beneficiaries: Vec<Principal>,
    /// Per-beneficiary basis points, summing to exactly 10 000. Same order as
    /// `beneficiaries`.
    pub shares_bp: Vec<u16>,
    /// Ordered guardians (1..=20, pairwise distinct, none null, none the
    /// owner). A guardian's position here is its approval bitmap index.
    pub guardians: Vec<Principal>,
    /// Companion map principal → bitmap index. Derived from `guardians` at
    /// creation; never diverges.
    pub guardian_index: BTreeMap<Principal, u8>,
    /// Approvals required for quorum (1..=|guardians|). Immutable.
    pub guardian_threshold: u8,
    /// Content identifier of the encrypted payload in the blob store.
    pub encrypted_cid: Cid,
    /// SHA-256 of the encrypted payload; integrity witness for the ciphertext.
    pub payload_hash: PayloadHash,
    /// Liveness window in seconds. Immutable.
    pub heartbeat_timeout: i64,
    /// Last owner liveness assertion. Only ever increases while unreleased.
    pub last_heartbeat: Timestamp,
    /// Optional handle to an external custody scope. None for secrets-only
    /// wills: finalize then skips asset dispatch entirely.
    pub vault_address: Option<Principal>,
    /// Bit i set iff guardian i has approved. Bits only ever flip 0 → 1.
    pub approvals_bitmap: u32,
    pub release_requested: bool,
    pub release_request_ts: Timestamp,
    pub released: bool,
    pub created_at: Timestamp,
}

impl Will {
    /// Bitmap index of `principal`, if it is a guardian of this will.
    pub fn guardian_bit(&self, principal: &Principal) -> Option<u8> {
        self.guardian_index.get(principal).copied()
    }

    /// True if the guardian at `bit` has approved.
    pub fn has_approved(&self, bit: u8) -> bool {
        self.approvals_bitmap & (1u32 << bit) != 0
    }

    /// Set the approval bit. Returns false if it was already set (idempotent
    /// re-approval); bits never clear.
    pub fn approve_bit(&mut self, bit: u8) -> bool {
        let mask = 1u32 << bit;
        if self.approvals_bitmap & mask != 0 {
            return false;
        }
        self.approvals_bitmap |= mask;
        true
    }

    /// Number of guardians that have approved. Native popcount — constant
    /// work regardless of guardian count.
    pub fn approval_count(&self) -> u32 {
        self.approvals_bitmap.count_ones()
    }

    /// True once at least `guardian_threshold` guardians have approved.
    pub fn quorum_met(&self) -> bool {
        self.approval_count() >= self.guardian_threshold as u32
    }

    /// True once the owner has been silent past the liveness window.
    pub fn heartbeat_expired(&self, now: Timestamp) -> bool {
        now >= self.last_heartbeat + self.heartbeat_timeout
    }

    /// Earliest timestamp at which a requested release may finalize.
    pub fn finalizable_at(&self, timelock_secs: i64) -> Timestamp {
        self.release_request_ts + timelock_secs
    }
}
