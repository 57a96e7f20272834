use std::sync::Arc;

use heirloom_core::auth::{Auth, Role};
use heirloom_core::constants::{
    DEFAULT_MAX_WILLS_PER_GUARDIAN, DEFAULT_MIN_REPUTATION, REPUTATION_MAX,
    REPUTATION_RELEASE_BONUS,
};
use heirloom_core::error::HeirloomError;
use heirloom_core::event::Event;
use heirloom_core::guardian::GuardianProfile;
use heirloom_core::types::{Principal, Timestamp};
use heirloom_store::StateDb;
use tracing::info;

/// Attachment policy for this registry instance.
#[derive(Clone, Copy, Debug)]
pub struct GuardianConfig {
    /// Minimum reputation required to be attached to a new will.
    pub min_reputation: u32,
    /// Cap on concurrently active wills per guardian.
    pub max_wills_per_guardian: u32,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            min_reputation: DEFAULT_MIN_REPUTATION,
            max_wills_per_guardian: DEFAULT_MAX_WILLS_PER_GUARDIAN,
        }
    }
}

/// The guardian directory. Mutations are authorised by caller identity
/// (register, deactivate, add_commitment), the Admin role (verify,
/// adjust_reputation), or the WillManager role (attach/detach/credit — the
/// will engine's calls).
pub struct GuardianRegistry {
    db: Arc<StateDb>,
    config: GuardianConfig,
}

impl GuardianRegistry {
    pub fn new(db: Arc<StateDb>, config: GuardianConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &GuardianConfig {
        &self.config
    }

    // ── Self-service operations ──────────────────────────────────────────────

    /// Register the caller as a guardian: active, unverified, reputation 100.
    /// A second registration for the same principal is rejected.
    pub fn register(
        &self,
        caller: &Principal,
        metadata_uri: String,
        public_key_hash: [u8; 32],
        commitment_root: [u8; 32],
        now: Timestamp,
    ) -> Result<(), HeirloomError> {
        if self.db.get_guardian(caller)?.is_some() {
            return Err(HeirloomError::GuardianAlreadyRegistered(caller.to_string()));
        }
        let profile =
            GuardianProfile::new(*caller, metadata_uri, public_key_hash, commitment_root, now);
        self.db.put_guardian(&profile)?;
        self.db
            .append_event(now, Event::GuardianRegistered { guardian: *caller })?;
        info!(guardian = %caller, "guardian registered");
        Ok(())
    }

    /// Deactivate a guardian. Allowed for the guardian themselves or an Admin.
    pub fn deactivate(
        &self,
        auth: &Auth,
        guardian: &Principal,
        now: Timestamp,
    ) -> Result<(), HeirloomError> {
        if auth.principal != *guardian {
            auth.require(Role::Admin)?;
        }
        let mut profile = self.load(guardian)?;
        profile.active = false;
        self.db.put_guardian(&profile)?;
        self.db
            .append_event(now, Event::GuardianDeactivated { guardian: *guardian })?;
        Ok(())
    }

    /// Publish a share-possession commitment tag. Requires an active profile.
    pub fn add_commitment(
        &self,
        caller: &Principal,
        commitment: [u8; 32],
        now: Timestamp,
    ) -> Result<(), HeirloomError> {
        let mut profile = self.load(caller)?;
        if !profile.active {
            return Err(HeirloomError::GuardianNotActive(caller.to_string()));
        }
        profile.commitments.insert(commitment);
        self.db.put_guardian(&profile)?;
        self.db
            .append_event(now, Event::CommitmentAdded { guardian: *caller, commitment })?;
        Ok(())
    }

    // ── Admin operations ─────────────────────────────────────────────────────

    /// Toggle the verification flag. Admin only.
    pub fn verify(
        &self,
        auth: &Auth,
        guardian: &Principal,
        verified: bool,
        now: Timestamp,
    ) -> Result<(), HeirloomError> {
        auth.require(Role::Admin)?;
        let mut profile = self.load(guardian)?;
        profile.verified = verified;
        self.db.put_guardian(&profile)?;
        self.db
            .append_event(now, Event::GuardianVerified { guardian: *guardian, verified })?;
        Ok(())
    }

    /// Clip or restore a guardian's reputation. Admin only; capped at 1000.
    pub fn adjust_reputation(
        &self,
        auth: &Auth,
        guardian: &Principal,
        new_value: u32,
        now: Timestamp,
    ) -> Result<(), HeirloomError> {
        auth.require(Role::Admin)?;
        if new_value > REPUTATION_MAX {
            return Err(HeirloomError::ReputationOutOfRange {
                max: REPUTATION_MAX,
                got: new_value,
            });
        }
        let mut profile = self.load(guardian)?;
        profile.reputation = new_value;
        self.db.put_guardian(&profile)?;
        self.db.append_event(
            now,
            Event::ReputationUpdated { guardian: *guardian, reputation: new_value },
        )?;
        Ok(())
    }

    // ── Will-engine operations (WillManager role) ────────────────────────────

    /// Count a new active will against this guardian. The guardian must be
    /// registered, active, verified, reputable, and under quota.
    pub fn attach_to_will(&self, auth: &Auth, guardian: &Principal) -> Result<(), HeirloomError> {
        auth.require(Role::WillManager)?;
        let mut profile = self.load(guardian)?;
        if !profile.active {
            return Err(HeirloomError::GuardianNotActive(guardian.to_string()));
        }
        if !profile.verified {
            return Err(HeirloomError::GuardianNotVerified(guardian.to_string()));
        }
        if profile.reputation < self.config.min_reputation {
            return Err(HeirloomError::GuardianReputationTooLow {
                reputation: profile.reputation,
                min: self.config.min_reputation,
            });
        }
        if profile.total_wills >= self.config.max_wills_per_guardian {
            return Err(HeirloomError::GuardianAtCapacity {
                max: self.config.max_wills_per_guardian,
            });
        }
        profile.total_wills += 1;
        self.db.put_guardian(&profile)
    }

    /// Stop counting a will against this guardian. Saturates at zero.
    pub fn detach_from_will(&self, auth: &Auth, guardian: &Principal) -> Result<(), HeirloomError> {
        auth.require(Role::WillManager)?;
        let mut profile = self.load(guardian)?;
        profile.total_wills = profile.total_wills.saturating_sub(1);
        self.db.put_guardian(&profile)
    }

    /// Credit a guardian for a release that reached finalization.
    pub fn record_successful_release(
        &self,
        auth: &Auth,
        guardian: &Principal,
        now: Timestamp,
    ) -> Result<(), HeirloomError> {
        auth.require(Role::WillManager)?;
        let mut profile = self.load(guardian)?;
        profile.successful_releases += 1;
        profile.reputation = (profile.reputation + REPUTATION_RELEASE_BONUS).min(REPUTATION_MAX);
        self.db.put_guardian(&profile)?;
        self.db.append_event(
            now,
            Event::ReputationUpdated { guardian: *guardian, reputation: profile.reputation },
        )?;
        Ok(())
    }

    // ── Queries (lock-free, may observe an older snapshot) ───────────────────

    pub fn get(&self, guardian: &Principal) -> Result<Option<GuardianProfile>, HeirloomError> {
        self.db.get_guardian(guardian)
    }

    /// Principals currently fit to guard a new will: active, verified,
    /// reputation at or above `min_rep`, and under the workload quota.
    pub fn eligible_guardians(&self, min_rep: u32) -> Result<Vec<Principal>, HeirloomError> {
        Ok(self
            .db
            .iter_guardians()?
            .into_iter()
            .filter(|p| {
                p.active
                    && p.verified
                    && p.reputation >= min_rep
                    && p.total_wills < self.config.max_wills_per_guardian
            })
            .map(|p| p.principal)
            .collect())
    }

    fn load(&self, guardian: &Principal) -> Result<GuardianProfile, HeirloomError> {
        self.db
            .get_guardian(guardian)?
            .ok_or_else(|| HeirloomError::GuardianNotRegistered(guardian.to_string()))
    }
}
