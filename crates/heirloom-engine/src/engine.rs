use std::collections::BTreeMap;
use std::sync::Arc;

use heirloom_core::auth::{Auth, Role};
use heirloom_core::constants::{
    DEFAULT_SCHEDULER_BATCH, MAX_BENEFICIARIES, MAX_GUARDIANS, MAX_HEARTBEAT_TIMEOUT_SECS,
    MIN_HEARTBEAT_TIMEOUT_SECS, RELEASE_TIMELOCK_SECS,
};
use heirloom_core::error::HeirloomError;
use heirloom_core::event::Event;
use heirloom_core::types::{Cid, PayloadHash, Principal, Timestamp, WillId};
use heirloom_core::will::{equal_shares, Will};
use heirloom_guardians::GuardianRegistry;
use heirloom_store::{StateDb, WillLocks};
use heirloom_vault::AssetVault;
use tracing::{debug, info, warn};

use crate::dispatch::{DispatchOutcome, ReleaseDispatcher};

/// Identity the engine presents for its own privileged calls into the vault
/// and the guardian registry.
const ENGINE_PRINCIPAL: [u8; 32] = *b"heirloom/will-engine/manager/v1\0";

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Mandatory delay between release request and finalization.
    pub release_timelock_secs: i64,
    /// Wills examined per scheduler poll.
    pub scheduler_batch: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            release_timelock_secs: RELEASE_TIMELOCK_SECS,
            scheduler_batch: DEFAULT_SCHEDULER_BATCH,
        }
    }
}

// ── Inputs / outputs ──────────────────────────────────────────────────────────

/// Everything a will is born with. All fields are immutable after creation
/// except the state-machine fields the engine itself drives.
#[derive(Clone, Debug)]
pub struct CreateWillParams {
    pub guardians: Vec<Principal>,
    pub guardian_threshold: u8,
    pub encrypted_cid: Cid,
    pub payload_hash: PayloadHash,
    pub heartbeat_timeout: i64,
    pub beneficiaries: Vec<Principal>,
    pub vault_address: Option<Principal>,
    /// Explicit per-beneficiary basis points. None selects the equal split
    /// (remainder to beneficiary 0).
    pub shares_bp: Option<Vec<u16>>,
}

/// Result of a successful finalization.
#[derive(Debug)]
pub struct FinalizeOutcome {
    pub will_id: WillId,
    pub dispatch: DispatchOutcome,
}

// ── WillEngine ────────────────────────────────────────────────────────────────

/// The will lifecycle engine.
///
/// Owns the will table and the scheduler queue; drives every state-machine
/// transition. Mutations serialise per will id via striped locks; reads are
/// lock-free and may observe an older consistent snapshot.
pub struct WillEngine {
    db: Arc<StateDb>,
    guardians: Arc<GuardianRegistry>,
    dispatcher: ReleaseDispatcher,
    config: EngineConfig,
    locks: WillLocks,
    manager: Auth,
}

impl WillEngine {
    pub fn new(
        db: Arc<StateDb>,
        vault: Arc<AssetVault>,
        guardians: Arc<GuardianRegistry>,
        config: EngineConfig,
    ) -> Self {
        let manager = Auth::with_role(Principal::from_bytes(ENGINE_PRINCIPAL), Role::WillManager);
        let dispatcher =
            ReleaseDispatcher::new(vault, Arc::clone(&guardians), manager.clone());
        Self {
            db,
            guardians,
            dispatcher,
            config,
            locks: WillLocks::new(),
            manager,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── create_will ──────────────────────────────────────────────────────────

    /// Validate and store a new will. The caller becomes its immutable owner;
    /// every guardian is attached through the registry (and must therefore be
    /// registered, active, verified, reputable, and under quota).
    pub fn create_will(
        &self,
        caller: &Principal,
        params: CreateWillParams,
        now: Timestamp,
    ) -> Result<WillId, HeirloomError> {
        if self.db.paused()? {
            return Err(HeirloomError::EnginePaused);
        }
        if caller.is_zero() {
            return Err(HeirloomError::NullPrincipal);
        }

        let CreateWillParams {
            guardians,
            guardian_threshold,
            encrypted_cid,
            payload_hash,
            heartbeat_timeout,
            beneficiaries,
            vault_address,
            shares_bp,
        } = params;

        // Validation, in contract order.
        if guardians.is_empty() || guardians.len() > MAX_GUARDIANS {
            return Err(HeirloomError::GuardianCountOutOfRange {
                max: MAX_GUARDIANS,
                got: guardians.len(),
            });
        }
        if beneficiaries.is_empty() || beneficiaries.len() > MAX_BENEFICIARIES {
            return Err(HeirloomError::BeneficiaryCountOutOfRange {
                max: MAX_BENEFICIARIES,
                got: beneficiaries.len(),
            });
        }
        if guardian_threshold == 0 || guardian_threshold as usize > guardians.len() {
            return Err(HeirloomError::ThresholdOutOfRange {
                guardians: guardians.len(),
                got: guardian_threshold,
            });
        }
        if !(MIN_HEARTBEAT_TIMEOUT_SECS..=MAX_HEARTBEAT_TIMEOUT_SECS).contains(&heartbeat_timeout) {
            return Err(HeirloomError::HeartbeatTimeoutOutOfRange {
                min: MIN_HEARTBEAT_TIMEOUT_SECS,
                max: MAX_HEARTBEAT_TIMEOUT_SECS,
                got: heartbeat_timeout,
            });
        }
        if encrypted_cid.is_empty() {
            return Err(HeirloomError::EmptyCid);
        }
        if payload_hash.is_zero() {
            return Err(HeirloomError::ZeroPayloadHash);
        }
        if guardians.iter().any(Principal::is_zero) || beneficiaries.iter().any(Principal::is_zero)
        {
            return Err(HeirloomError::NullPrincipal);
        }

        let mut guardian_index = BTreeMap::new();
        for (position, guardian) in guardians.iter().enumerate() {
            if guardian == caller {
                return Err(HeirloomError::OwnerAsGuardian);
            }
            if guardian_index.insert(*guardian, position as u8).is_some() {
                return Err(HeirloomError::DuplicateGuardian);
            }
        }
        {
            let mut seen = std::collections::BTreeSet::new();
            for beneficiary in &beneficiaries {
                if !seen.insert(*beneficiary) {
                    return Err(HeirloomError::DuplicateBeneficiary);
                }
            }
        }

        let shares_bp = match shares_bp {
            Some(shares) => {
                if shares.len() != beneficiaries.len() {
                    return Err(HeirloomError::ShareCountMismatch {
                        expected: beneficiaries.len(),
                        got: shares.len(),
                    });
                }
                let sum: u32 = shares.iter().map(|bp| *bp as u32).sum();
                if sum != heirloom_core::constants::BASIS_POINTS_DENOM {
                    return Err(HeirloomError::ShareSumMismatch { got: sum });
                }
                shares
            }
            None => equal_shares(beneficiaries.len()),
        };

        // Count the will against each guardian's quota. Roll back on failure
        // so a half-attached will never exists.
        let mut attached: Vec<&Principal> = Vec::with_capacity(guardians.len());
        for guardian in &guardians {
            if let Err(e) = self.guardians.attach_to_will(&self.manager, guardian) {
                for done in attached {
                    let _ = self.guardians.detach_from_will(&self.manager, done);
                }
                return Err(e);
            }
            attached.push(guardian);
        }

        let id = self.db.next_will_id()?;
        let will = Will {
            id,
            owner: *caller,
            beneficiaries,
            shares_bp,
            guardian_threshold,
            guardian_index,
            guardians,
            encrypted_cid,
            payload_hash,
            heartbeat_timeout,
            last_heartbeat: now,
            vault_address,
            approvals_bitmap: 0,
            release_requested: false,
            release_request_ts: 0,
            released: false,
            created_at: now,
        };
        self.db.put_will(&will)?;
        self.db.push_pending(id)?;
        self.db.append_event(
            now,
            Event::WillCreated {
                will_id: id,
                owner: *caller,
                guardian_count: will.guardians.len() as u8,
                threshold: guardian_threshold,
            },
        )?;
        info!(will_id = id, owner = %caller, "will created");
        Ok(id)
    }

    // ── heartbeat ────────────────────────────────────────────────────────────

    /// Owner liveness assertion. Resets the inactivity clock; permitted while
    /// a release is merely requested (it does not cancel the request), but
    /// rejected once released.
    pub fn heartbeat(
        &self,
        caller: &Principal,
        will_id: WillId,
        now: Timestamp,
    ) -> Result<(), HeirloomError> {
        if self.db.paused()? {
            return Err(HeirloomError::EnginePaused);
        }
        let _g = self.locks.guard(will_id);
        let mut will = self.load(will_id)?;
        if will.released {
            return Err(HeirloomError::AlreadyReleased(will_id));
        }
        if will.owner != *caller {
            return Err(HeirloomError::NotOwner);
        }
        // last_heartbeat is monotone even if the host hands us a stale clock.
        will.last_heartbeat = will.last_heartbeat.max(now);
        self.db.put_will(&will)?;
        self.db.append_event(now, Event::Heartbeat { will_id })?;
        debug!(will_id, "heartbeat");
        Ok(())
    }

    // ── guardian_approve ─────────────────────────────────────────────────────

    /// Record a guardian's approval. Idempotent: re-approval succeeds without
    /// state change. Crossing the threshold requests the release and starts
    /// the timelock; the quorum is sticky from then on.
    pub fn guardian_approve(
        &self,
        caller: &Principal,
        will_id: WillId,
        now: Timestamp,
    ) -> Result<(), HeirloomError> {
        if self.db.paused()? {
            return Err(HeirloomError::EnginePaused);
        }
        let _g = self.locks.guard(will_id);
        let mut will = self.load(will_id)?;
        if will.released {
            return Err(HeirloomError::AlreadyReleased(will_id));
        }
        let bit = will
            .guardian_bit(caller)
            .ok_or(HeirloomError::NotGuardian)?;
        if !will.approve_bit(bit) {
            return Ok(()); // already approved; nothing to do
        }
        self.db.append_event(
            now,
            Event::GuardianApproved {
                will_id,
                guardian: *caller,
                approvals: will.approval_count(),
            },
        )?;
        info!(will_id, guardian = %caller, approvals = will.approval_count(), "guardian approved");

        if will.quorum_met() && !will.release_requested {
            self.request_release(&mut will, now)?;
        }
        self.db.put_will(&will)?;
        Ok(())
    }

    // ── request_release_by_owner ─────────────────────────────────────────────

    /// Owner-initiated release request, independent of the approval state.
    /// Idempotent once requested. Not behind the pause gate: the release
    /// path stays open while paused.
    pub fn request_release_by_owner(
        &self,
        caller: &Principal,
        will_id: WillId,
        now: Timestamp,
    ) -> Result<(), HeirloomError> {
        let _g = self.locks.guard(will_id);
        let mut will = self.load(will_id)?;
        if will.released {
            return Err(HeirloomError::AlreadyReleased(will_id));
        }
        if will.owner != *caller {
            return Err(HeirloomError::NotOwner);
        }
        if will.release_requested {
            return Ok(());
        }
        self.request_release(&mut will, now)?;
        self.db.put_will(&will)
    }

    /// Shared RELEASE_REQUESTED transition. Caller persists the will.
    fn request_release(&self, will: &mut Will, now: Timestamp) -> Result<(), HeirloomError> {
        will.release_requested = true;
        will.release_request_ts = now;
        let projected = now + self.config.release_timelock_secs;
        self.db.append_event(
            now,
            Event::ReleaseRequested { will_id: will.id, projected_release_ts: projected },
        )?;
        info!(will_id = will.id, projected_release_ts = projected, "release requested");
        Ok(())
    }

    // ── finalize_release ─────────────────────────────────────────────────────

    /// Terminal transition. Scheduler role only; requires a matured timelock.
    /// The `released` flag is persisted before dispatch, and dispatch
    /// failures never revert it — distribution is retryable out of band.
    /// Never blocked by the pause gate.
    pub fn finalize_release(
        &self,
        auth: &Auth,
        will_id: WillId,
        now: Timestamp,
    ) -> Result<FinalizeOutcome, HeirloomError> {
        auth.require(Role::Scheduler)?;
        let _g = self.locks.guard(will_id);
        let mut will = self.load(will_id)?;
        if will.released {
            return Err(HeirloomError::AlreadyReleased(will_id));
        }
        if !will.release_requested {
            return Err(HeirloomError::ReleaseNotRequested(will_id));
        }
        let finalizable_at = will.finalizable_at(self.config.release_timelock_secs);
        if now < finalizable_at {
            return Err(HeirloomError::TimelockNotExpired { will_id, finalizable_at });
        }

        will.released = true;
        self.db.put_will(&will)?;
        self.db.remove_pending(will_id)?;
        self.db.append_event(
            now,
            Event::ReleaseFinalized { will_id, beneficiaries: will.beneficiaries.clone() },
        )?;
        info!(will_id, "release finalized");

        let dispatch = self.dispatcher.dispatch(&will, now);
        if !dispatch.errors.is_empty() {
            warn!(will_id, errors = dispatch.errors.len(), "dispatch completed with failures");
        }
        Ok(FinalizeOutcome { will_id, dispatch })
    }

    // ── Eligibility & scheduler ──────────────────────────────────────────────

    /// Pure release-eligibility predicate: unreleased, owned, heartbeat
    /// expired, quorum met.
    pub fn is_eligible_for_release(
        &self,
        will_id: WillId,
        now: Timestamp,
    ) -> Result<bool, HeirloomError> {
        let will = self.load(will_id)?;
        Ok(!will.released
            && !will.owner.is_zero()
            && will.heartbeat_expired(now)
            && will.quorum_met())
    }

    /// Bounded scan of the pending-check ring buffer: examine up to `batch`
    /// wills from the cursor, returning those eligible for a release request.
    /// The cursor advances by `batch` (wrapping) so successive polls cover
    /// the whole queue at bounded per-poll cost.
    pub fn scheduler_poll(
        &self,
        batch: usize,
        now: Timestamp,
    ) -> Result<(bool, Vec<WillId>), HeirloomError> {
        let queue = self.db.pending_queue()?;
        if queue.is_empty() {
            return Ok((false, Vec::new()));
        }
        let cursor = self.db.pending_cursor()? as usize % queue.len();

        let mut work = Vec::new();
        for offset in 0..batch.min(queue.len()) {
            let will_id = queue[(cursor + offset) % queue.len()];
            let will = match self.db.get_will(will_id)? {
                Some(w) => w,
                None => continue,
            };
            if !will.released
                && !will.owner.is_zero()
                && will.heartbeat_expired(now)
                && will.quorum_met()
            {
                work.push(will_id);
            }
        }

        self.db
            .set_pending_cursor(((cursor + batch) % queue.len()) as u64)?;
        Ok((!work.is_empty(), work))
    }

    /// Move each eligible, still-idle will in `work` to RELEASE_REQUESTED.
    /// Separate from finalize because the timelock sits between the two.
    pub fn scheduler_perform(
        &self,
        auth: &Auth,
        work: &[WillId],
        now: Timestamp,
    ) -> Result<(), HeirloomError> {
        auth.require(Role::Scheduler)?;
        for &will_id in work {
            let _g = self.locks.guard(will_id);
            let mut will = match self.db.get_will(will_id)? {
                Some(w) => w,
                None => continue,
            };
            if will.released || will.release_requested {
                continue;
            }
            if !(will.heartbeat_expired(now) && will.quorum_met() && !will.owner.is_zero()) {
                continue;
            }
            self.request_release(&mut will, now)?;
            self.db.put_will(&will)?;
        }
        Ok(())
    }

    /// Finalize every pending will whose timelock has matured. One failed
    /// will never stops the sweep; per-will outcomes are returned.
    pub fn finalize_due(
        &self,
        auth: &Auth,
        now: Timestamp,
    ) -> Result<Vec<(WillId, Result<FinalizeOutcome, HeirloomError>)>, HeirloomError> {
        auth.require(Role::Scheduler)?;
        let mut outcomes = Vec::new();
        for will_id in self.db.pending_queue()? {
            let will = match self.db.get_will(will_id)? {
                Some(w) => w,
                None => continue,
            };
            if will.released || !will.release_requested {
                continue;
            }
            if now < will.finalizable_at(self.config.release_timelock_secs) {
                continue;
            }
            outcomes.push((will_id, self.finalize_release(auth, will_id, now)));
        }
        Ok(outcomes)
    }

    // ── Pause gate ───────────────────────────────────────────────────────────

    /// Admin pause: blocks new wills, heartbeats, and approvals, but never
    /// finalization or emergency withdrawal — a paused system must not
    /// strand assets.
    pub fn set_paused(&self, auth: &Auth, paused: bool, now: Timestamp) -> Result<(), HeirloomError> {
        auth.require(Role::Admin)?;
        self.db.set_paused(paused)?;
        self.db.append_event(
            now,
            if paused { Event::EnginePaused } else { Event::EngineUnpaused },
        )?;
        warn!(paused, "pause gate toggled");
        Ok(())
    }

    pub fn paused(&self) -> Result<bool, HeirloomError> {
        self.db.paused()
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn get_will(&self, will_id: WillId) -> Result<Option<Will>, HeirloomError> {
        self.db.get_will(will_id)
    }

    fn load(&self, will_id: WillId) -> Result<Will, HeirloomError> {
        self.db
            .get_will(will_id)?
            .ok_or(HeirloomError::WillNotFound(will_id))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use heirloom_guardians::GuardianConfig;
    use heirloom_vault::RecordingAdapter;

    const NOW: Timestamp = 1_700_000_000;
    const DAY: i64 = 86_400;
    const WEEK: i64 = 7 * DAY;

    fn principal(tag: u8) -> Principal {
        Principal::from_bytes([tag; 32])
    }

    fn admin() -> Auth {
        Auth::with_role(principal(0xAD), Role::Admin)
    }

    fn scheduler() -> Auth {
        Auth::with_role(principal(0x5C), Role::Scheduler)
    }

    struct Harness {
        engine: WillEngine,
        guardians: Arc<GuardianRegistry>,
        vault: Arc<AssetVault>,
    }

    fn harness(name: &str) -> Harness {
        let dir = std::env::temp_dir().join(format!("heirloom_engine_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(StateDb::open(&dir).expect("open temp db"));
        let vault = Arc::new(AssetVault::new(
            Arc::clone(&db),
            Arc::new(RecordingAdapter::new()),
        ));
        let guardians = Arc::new(GuardianRegistry::new(
            Arc::clone(&db),
            GuardianConfig::default(),
        ));
        let engine = WillEngine::new(
            Arc::clone(&db),
            Arc::clone(&vault),
            Arc::clone(&guardians),
            EngineConfig::default(),
        );
        Harness { engine, guardians, vault }
    }

    /// Register and verify guardians so attach_to_will accepts them.
    fn seed_guardians(h: &Harness, tags: &[u8]) -> Vec<Principal> {
        tags.iter()
            .map(|&tag| {
                let g = principal(tag);
                h.guardians
                    .register(&g, format!("ipfs://guardian/{tag}"), [tag; 32], [0; 32], NOW)
                    .unwrap();
                h.guardians.verify(&admin(), &g, true, NOW).unwrap();
                g
            })
            .collect()
    }

    fn params(guardians: Vec<Principal>, threshold: u8) -> CreateWillParams {
        CreateWillParams {
            guardians,
            guardian_threshold: threshold,
            encrypted_cid: Cid("bafy-engine-test".into()),
            payload_hash: PayloadHash([0xCC; 32]),
            heartbeat_timeout: WEEK,
            beneficiaries: vec![principal(0xB1)],
            vault_address: None,
            shares_bp: None,
        }
    }

    // ── create_will ──────────────────────────────────────────────────────────

    #[test]
    fn create_will_assigns_sequential_ids_and_attaches_guardians() {
        let h = harness("create_ok");
        let guards = seed_guardians(&h, &[10, 11, 12]);
        let owner = principal(1);

        let id1 = h.engine.create_will(&owner, params(guards.clone(), 2), NOW).unwrap();
        let id2 = h.engine.create_will(&owner, params(guards.clone(), 2), NOW).unwrap();
        assert_eq!((id1, id2), (1, 2));

        let will = h.engine.get_will(1).unwrap().unwrap();
        assert_eq!(will.owner, owner);
        assert_eq!(will.last_heartbeat, NOW);
        assert_eq!(will.shares_bp, vec![10_000]);
        assert!(!will.release_requested && !will.released);

        for g in &guards {
            assert_eq!(h.guardians.get(g).unwrap().unwrap().total_wills, 2);
        }
    }

    #[test]
    fn create_will_validation_order() {
        let h = harness("create_bad");
        let guards = seed_guardians(&h, &[10, 11]);
        let owner = principal(1);

        let mut p = params(vec![], 1);
        assert!(matches!(
            h.engine.create_will(&owner, p, NOW).unwrap_err(),
            HeirloomError::GuardianCountOutOfRange { got: 0, .. }
        ));

        p = params(guards.clone(), 3);
        assert!(matches!(
            h.engine.create_will(&owner, p, NOW).unwrap_err(),
            HeirloomError::ThresholdOutOfRange { got: 3, .. }
        ));

        p = params(guards.clone(), 1);
        p.heartbeat_timeout = DAY - 1;
        assert!(matches!(
            h.engine.create_will(&owner, p, NOW).unwrap_err(),
            HeirloomError::HeartbeatTimeoutOutOfRange { .. }
        ));

        p = params(guards.clone(), 1);
        p.encrypted_cid = Cid(String::new());
        assert!(matches!(
            h.engine.create_will(&owner, p, NOW).unwrap_err(),
            HeirloomError::EmptyCid
        ));

        p = params(guards.clone(), 1);
        p.payload_hash = PayloadHash([0; 32]);
        assert!(matches!(
            h.engine.create_will(&owner, p, NOW).unwrap_err(),
            HeirloomError::ZeroPayloadHash
        ));

        p = params(vec![guards[0], guards[0]], 1);
        assert!(matches!(
            h.engine.create_will(&owner, p, NOW).unwrap_err(),
            HeirloomError::DuplicateGuardian
        ));

        p = params(guards.clone(), 1);
        p.beneficiaries = vec![principal(0xB1), principal(0xB1)];
        assert!(matches!(
            h.engine.create_will(&owner, p, NOW).unwrap_err(),
            HeirloomError::DuplicateBeneficiary
        ));

        // Owner listed among their own guardians.
        let mut with_owner = seed_guardians(&h, &[13]);
        with_owner.push(owner);
        // owner is not a registered guardian; the list check fires first.
        p = params(with_owner, 1);
        assert!(matches!(
            h.engine.create_will(&owner, p, NOW).unwrap_err(),
            HeirloomError::OwnerAsGuardian
        ));

        // No will was created along the way, and failed attempts left no
        // quota residue.
        assert!(h.engine.get_will(1).unwrap().is_none());
        assert_eq!(h.guardians.get(&guards[0]).unwrap().unwrap().total_wills, 0);
    }

    #[test]
    fn create_will_rolls_back_attachments_when_one_guardian_is_ineligible() {
        let h = harness("create_rollback");
        let good = seed_guardians(&h, &[10, 11]);
        let unverified = principal(12);
        h.guardians
            .register(&unverified, "uri".into(), [0; 32], [0; 32], NOW)
            .unwrap();

        let mut guards = good.clone();
        guards.push(unverified);
        assert!(matches!(
            h.engine.create_will(&principal(1), params(guards, 1), NOW).unwrap_err(),
            HeirloomError::GuardianNotVerified(_)
        ));
        for g in &good {
            assert_eq!(h.guardians.get(g).unwrap().unwrap().total_wills, 0);
        }
    }

    #[test]
    fn create_will_accepts_explicit_shares_and_rejects_bad_ones() {
        let h = harness("create_shares");
        let guards = seed_guardians(&h, &[10]);
        let owner = principal(1);

        let mut p = params(guards.clone(), 1);
        p.beneficiaries = vec![principal(0xB1), principal(0xB2)];
        p.shares_bp = Some(vec![3_333, 6_667]);
        let id = h.engine.create_will(&owner, p, NOW).unwrap();
        assert_eq!(h.engine.get_will(id).unwrap().unwrap().shares_bp, vec![3_333, 6_667]);

        let mut p = params(guards.clone(), 1);
        p.beneficiaries = vec![principal(0xB1), principal(0xB2)];
        p.shares_bp = Some(vec![5_000, 4_999]);
        assert!(matches!(
            h.engine.create_will(&owner, p, NOW).unwrap_err(),
            HeirloomError::ShareSumMismatch { got: 9_999 }
        ));
    }

    // ── heartbeat ────────────────────────────────────────────────────────────

    #[test]
    fn heartbeat_updates_and_is_owner_only() {
        let h = harness("hb");
        let guards = seed_guardians(&h, &[10]);
        let owner = principal(1);
        let id = h.engine.create_will(&owner, params(guards, 1), NOW).unwrap();

        h.engine.heartbeat(&owner, id, NOW + 100).unwrap();
        assert_eq!(h.engine.get_will(id).unwrap().unwrap().last_heartbeat, NOW + 100);

        // Stale clock: monotone, no rewind.
        h.engine.heartbeat(&owner, id, NOW + 50).unwrap();
        assert_eq!(h.engine.get_will(id).unwrap().unwrap().last_heartbeat, NOW + 100);

        assert!(matches!(
            h.engine.heartbeat(&principal(2), id, NOW + 200).unwrap_err(),
            HeirloomError::NotOwner
        ));
        assert!(matches!(
            h.engine.heartbeat(&owner, 99, NOW).unwrap_err(),
            HeirloomError::WillNotFound(99)
        ));
    }

    #[test]
    fn heartbeat_allowed_after_request_but_not_after_release() {
        let h = harness("hb_requested");
        let guards = seed_guardians(&h, &[10]);
        let owner = principal(1);
        let id = h.engine.create_will(&owner, params(guards, 1), NOW).unwrap();

        h.engine.request_release_by_owner(&owner, id, NOW).unwrap();
        // Still requested afterwards — heartbeat does not cancel.
        h.engine.heartbeat(&owner, id, NOW + 10).unwrap();
        let will = h.engine.get_will(id).unwrap().unwrap();
        assert!(will.release_requested);
        assert_eq!(will.last_heartbeat, NOW + 10);

        h.engine
            .finalize_release(&scheduler(), id, NOW + WEEK)
            .unwrap();
        assert!(matches!(
            h.engine.heartbeat(&owner, id, NOW + WEEK + 1).unwrap_err(),
            HeirloomError::AlreadyReleased(_)
        ));
    }

    // ── guardian_approve ─────────────────────────────────────────────────────

    #[test]
    fn approvals_accumulate_and_quorum_requests_release() {
        let h = harness("approve");
        let guards = seed_guardians(&h, &[10, 11, 12]);
        let owner = principal(1);
        let id = h
            .engine
            .create_will(&owner, params(guards.clone(), 2), NOW)
            .unwrap();

        h.engine.guardian_approve(&guards[0], id, NOW + 1).unwrap();
        let will = h.engine.get_will(id).unwrap().unwrap();
        assert_eq!(will.approvals_bitmap, 0b001);
        assert!(!will.release_requested);

        h.engine.guardian_approve(&guards[1], id, NOW + 2).unwrap();
        let will = h.engine.get_will(id).unwrap().unwrap();
        assert_eq!(will.approvals_bitmap, 0b011);
        assert!(will.release_requested);
        assert_eq!(will.release_request_ts, NOW + 2);

        // A third approval past quorum does not restart the timelock.
        h.engine.guardian_approve(&guards[2], id, NOW + 500).unwrap();
        let will = h.engine.get_will(id).unwrap().unwrap();
        assert_eq!(will.approvals_bitmap, 0b111);
        assert_eq!(will.release_request_ts, NOW + 2);
    }

    #[test]
    fn reapproval_is_idempotent() {
        let h = harness("reapprove");
        let guards = seed_guardians(&h, &[10, 11, 12]);
        let id = h
            .engine
            .create_will(&principal(1), params(guards.clone(), 2), NOW)
            .unwrap();

        h.engine.guardian_approve(&guards[0], id, NOW).unwrap();
        h.engine.guardian_approve(&guards[0], id, NOW + 1).unwrap();
        let will = h.engine.get_will(id).unwrap().unwrap();
        assert_eq!(will.approvals_bitmap, 0b001);
        assert!(!will.release_requested, "single distinct approval is below quorum");
    }

    #[test]
    fn non_guardian_cannot_approve() {
        let h = harness("approve_auth");
        let guards = seed_guardians(&h, &[10]);
        let id = h
            .engine
            .create_will(&principal(1), params(guards, 1), NOW)
            .unwrap();
        assert!(matches!(
            h.engine.guardian_approve(&principal(99), id, NOW).unwrap_err(),
            HeirloomError::NotGuardian
        ));
    }

    // ── finalize_release ─────────────────────────────────────────────────────

    #[test]
    fn finalize_requires_request_role_and_timelock() {
        let h = harness("finalize_gates");
        let guards = seed_guardians(&h, &[10]);
        let owner = principal(1);
        let id = h.engine.create_will(&owner, params(guards, 1), NOW).unwrap();

        assert!(matches!(
            h.engine.finalize_release(&scheduler(), id, NOW).unwrap_err(),
            HeirloomError::ReleaseNotRequested(_)
        ));

        h.engine.request_release_by_owner(&owner, id, NOW).unwrap();
        assert!(matches!(
            h.engine.finalize_release(&Auth::new(principal(7)), id, NOW + WEEK).unwrap_err(),
            HeirloomError::Unauthorized { required: Role::Scheduler }
        ));
        // One second early is still too early.
        assert!(matches!(
            h.engine.finalize_release(&scheduler(), id, NOW + WEEK - 1).unwrap_err(),
            HeirloomError::TimelockNotExpired { .. }
        ));

        h.engine.finalize_release(&scheduler(), id, NOW + WEEK).unwrap();
        let will = h.engine.get_will(id).unwrap().unwrap();
        assert!(will.released);

        // Terminal: a second finalize is rejected, as is everything else.
        assert!(matches!(
            h.engine.finalize_release(&scheduler(), id, NOW + WEEK + 1).unwrap_err(),
            HeirloomError::AlreadyReleased(_)
        ));
        assert!(matches!(
            h.engine.guardian_approve(&principal(10), id, NOW + WEEK + 1).unwrap_err(),
            HeirloomError::AlreadyReleased(_)
        ));
    }

    #[test]
    fn finalize_prunes_the_pending_queue_and_detaches_guardians() {
        let h = harness("finalize_prune");
        let guards = seed_guardians(&h, &[10, 11]);
        let owner = principal(1);
        let id = h
            .engine
            .create_will(&owner, params(guards.clone(), 2), NOW)
            .unwrap();

        h.engine.guardian_approve(&guards[0], id, NOW).unwrap();
        h.engine.guardian_approve(&guards[1], id, NOW).unwrap();
        h.engine.finalize_release(&scheduler(), id, NOW + WEEK).unwrap();

        // Queue pruned: a fresh poll finds nothing to do.
        let (needs_work, work) = h.engine.scheduler_poll(10, NOW + WEEK + DAY).unwrap();
        assert!(!needs_work && work.is_empty());

        // Approvers credited and everyone detached.
        for g in &guards {
            let profile = h.guardians.get(g).unwrap().unwrap();
            assert_eq!(profile.total_wills, 0);
            assert_eq!(profile.successful_releases, 1);
            assert_eq!(profile.reputation, 110);
        }
    }

    // ── Eligibility & scheduler ──────────────────────────────────────────────

    #[test]
    fn eligibility_is_the_exact_conjunction() {
        let h = harness("eligible");
        let guards = seed_guardians(&h, &[10, 11]);
        let owner = principal(1);
        let id = h
            .engine
            .create_will(&owner, params(guards.clone(), 2), NOW)
            .unwrap();

        // Timer not expired, quorum unmet.
        assert!(!h.engine.is_eligible_for_release(id, NOW + 1).unwrap());
        // Timer expired, quorum unmet.
        assert!(!h.engine.is_eligible_for_release(id, NOW + WEEK).unwrap());

        h.engine.guardian_approve(&guards[0], id, NOW).unwrap();
        h.engine.guardian_approve(&guards[1], id, NOW).unwrap();
        // Quorum met, timer not expired (heartbeat_timeout is a week).
        assert!(!h.engine.is_eligible_for_release(id, NOW + 1).unwrap());
        // Both hold.
        assert!(h.engine.is_eligible_for_release(id, NOW + WEEK).unwrap());

        assert!(matches!(
            h.engine.is_eligible_for_release(99, NOW).unwrap_err(),
            HeirloomError::WillNotFound(99)
        ));
    }

    #[test]
    fn scheduler_poll_and_perform_request_releases() {
        let h = harness("sched");
        let guards = seed_guardians(&h, &[10]);
        let owner = principal(1);
        // Three wills; only the second will reach quorum.
        let _a = h.engine.create_will(&owner, params(guards.clone(), 1), NOW).unwrap();
        let b = h.engine.create_will(&owner, params(guards.clone(), 1), NOW).unwrap();
        let _c = h.engine.create_will(&owner, params(guards.clone(), 1), NOW).unwrap();
        h.engine.guardian_approve(&guards[0], b, NOW).unwrap();

        let later = NOW + WEEK + 1;
        let (needs_work, work) = h.engine.scheduler_poll(10, later).unwrap();
        assert!(needs_work);
        assert_eq!(work, vec![b]);

        h.engine.scheduler_perform(&scheduler(), &work, later).unwrap();
        let will = h.engine.get_will(b).unwrap().unwrap();
        assert!(will.release_requested);
        assert_eq!(will.release_request_ts, later);

        // Perform is idempotent over already-requested wills.
        h.engine.scheduler_perform(&scheduler(), &work, later + 5).unwrap();
        assert_eq!(h.engine.get_will(b).unwrap().unwrap().release_request_ts, later);

        // After the timelock, the due sweep finalizes it.
        let outcomes = h.engine.finalize_due(&scheduler(), later + WEEK).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, b);
        assert!(outcomes[0].1.is_ok());
        assert!(h.engine.get_will(b).unwrap().unwrap().released);
    }

    #[test]
    fn scheduler_poll_cursor_wraps_in_batches() {
        let h = harness("sched_cursor");
        let guards = seed_guardians(&h, &[10]);
        let owner = principal(1);
        for _ in 0..5 {
            h.engine.create_will(&owner, params(guards.clone(), 1), NOW).unwrap();
        }
        // Batch 2 over 5 wills: cursor walks 0→2→4→1 (mod 5).
        h.engine.scheduler_poll(2, NOW).unwrap();
        h.engine.scheduler_poll(2, NOW).unwrap();
        let (_, _) = h.engine.scheduler_poll(2, NOW).unwrap();
        // All polls below the heartbeat window find nothing, but the scan
        // stays bounded and wraps rather than running off the queue.
        let (needs_work, work) = h.engine.scheduler_poll(2, NOW).unwrap();
        assert!(!needs_work && work.is_empty());
    }

    // ── Pause gate ───────────────────────────────────────────────────────────

    #[test]
    fn pause_blocks_entry_points_but_not_release_path() {
        let h = harness("pause");
        let guards = seed_guardians(&h, &[10]);
        let owner = principal(1);
        let id = h
            .engine
            .create_will(&owner, params(guards.clone(), 1), NOW)
            .unwrap();
        h.engine.request_release_by_owner(&owner, id, NOW).unwrap();

        assert!(matches!(
            h.engine.set_paused(&Auth::new(principal(9)), true, NOW).unwrap_err(),
            HeirloomError::Unauthorized { required: Role::Admin }
        ));
        h.engine.set_paused(&admin(), true, NOW).unwrap();

        assert!(matches!(
            h.engine.create_will(&owner, params(guards.clone(), 1), NOW).unwrap_err(),
            HeirloomError::EnginePaused
        ));
        assert!(matches!(
            h.engine.heartbeat(&owner, id, NOW + 1).unwrap_err(),
            HeirloomError::EnginePaused
        ));
        assert!(matches!(
            h.engine.guardian_approve(&guards[0], id, NOW + 1).unwrap_err(),
            HeirloomError::EnginePaused
        ));

        // The release path stays open while paused.
        h.engine.finalize_release(&scheduler(), id, NOW + WEEK).unwrap();
        assert!(h.engine.get_will(id).unwrap().unwrap().released);

        h.engine.set_paused(&admin(), false, NOW + WEEK).unwrap();
        assert!(!h.engine.paused().unwrap());
    }

    // ── Dispatch integration ─────────────────────────────────────────────────

    #[test]
    fn finalize_dispatches_assets_for_vault_backed_wills() {
        let h = harness("dispatch_assets");
        let guards = seed_guardians(&h, &[10]);
        let owner = principal(1);

        let mut p = params(guards, 1);
        p.vault_address = Some(principal(0x7A));
        p.beneficiaries = vec![principal(0xB1), principal(0xB2)];
        p.shares_bp = Some(vec![4_000, 6_000]);
        let id = h.engine.create_will(&owner, p, NOW).unwrap();

        h.vault.deposit_native(&owner, id, 1_000, NOW).unwrap();

        h.engine.request_release_by_owner(&owner, id, NOW).unwrap();
        let outcome = h
            .engine
            .finalize_release(&scheduler(), id, NOW + WEEK)
            .unwrap();
        let report = outcome.dispatch.report.expect("vault-backed will distributes");
        assert_eq!(report.released, vec![0]);
        assert!(outcome.dispatch.errors.is_empty());
        assert_eq!(h.vault.native_balance(id).unwrap(), 0);
    }

    #[test]
    fn secrets_only_wills_skip_asset_dispatch() {
        let h = harness("dispatch_secrets");
        let guards = seed_guardians(&h, &[10]);
        let owner = principal(1);
        let id = h.engine.create_will(&owner, params(guards, 1), NOW).unwrap();

        h.engine.request_release_by_owner(&owner, id, NOW).unwrap();
        let outcome = h
            .engine
            .finalize_release(&scheduler(), id, NOW + WEEK)
            .unwrap();
        assert!(outcome.dispatch.report.is_none());
    }
}
