//! Typed event stream for the engine.
//!
//! Every state-machine transition appends exactly one [`Event`] to a
//! persistent, sequence-numbered log. Events are pure observations: nothing
//! in the engine reads them back, and consumers tail the log out of band.

use serde::{Deserialize, Serialize};

use crate::types::{Principal, Timestamp, WillId};

/// One entry in the append-only event log.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    /// Monotone sequence number, assigned by the log.
    pub seq: u64,
    /// Engine-observed timestamp of the transition.
    pub at: Timestamp,
    pub event: Event,
}

/// Every observable transition in the system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Event {
    // ── Will engine ──────────────────────────────────────────────────────────
    WillCreated {
        will_id: WillId,
        owner: Principal,
        guardian_count: u8,
        threshold: u8,
    },
    Heartbeat {
        will_id: WillId,
    },
    GuardianApproved {
        will_id: WillId,
        guardian: Principal,
        approvals: u32,
    },
    ReleaseRequested {
        will_id: WillId,
        /// Earliest timestamp at which finalize may succeed.
        projected_release_ts: Timestamp,
    },
    ReleaseFinalized {
        will_id: WillId,
        beneficiaries: Vec<Principal>,
    },
    EnginePaused,
    EngineUnpaused,

    // ── Asset vault ──────────────────────────────────────────────────────────
    AssetDeposited {
        will_id: WillId,
        index: u32,
        depositor: Principal,
    },
    AssetReleased {
        will_id: WillId,
        index: u32,
    },
    EmergencyWithdrawal {
        will_id: WillId,
        index: u32,
        depositor: Principal,
    },

    // ── Guardian registry ────────────────────────────────────────────────────
    GuardianRegistered {
        guardian: Principal,
    },
    GuardianVerified {
        guardian: Principal,
        verified: bool,
    },
    GuardianDeactivated {
        guardian: Principal,
    },
    CommitmentAdded {
        guardian: Principal,
        commitment: [u8; 32],
    },
    ReputationUpdated {
        guardian: Principal,
        reputation: u32,
    },
}
