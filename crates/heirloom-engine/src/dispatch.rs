//! Release dispatcher — the thin adapter between a finalized will and the
//! asset vault / guardian registry.
//!
//! Dispatch runs strictly after the will's `released` flag is persisted, and
//! nothing here can revert it: a broken transfer must not wedge the state
//! machine. Failures are collected into the outcome so asset distribution
//! can be retried out of band (`AssetVault::release_assets` skips records
//! that already went out).

use std::sync::Arc;

use heirloom_core::auth::Auth;
use heirloom_core::types::{Principal, Timestamp};
use heirloom_core::will::Will;
use heirloom_guardians::GuardianRegistry;
use heirloom_vault::{AssetVault, ReleaseReport};
use tracing::warn;

/// What happened downstream of a finalization.
#[derive(Clone, Debug, Default)]
pub struct DispatchOutcome {
    /// Per-asset distribution report; None for secrets-only wills (no vault
    /// scope attached).
    pub report: Option<ReleaseReport>,
    /// Guardians credited with a successful release (the approvers).
    pub credited: Vec<Principal>,
    /// Downstream failures. Non-empty outcomes are retryable; the will stays
    /// released either way.
    pub errors: Vec<String>,
}

pub struct ReleaseDispatcher {
    vault: Arc<AssetVault>,
    guardians: Arc<GuardianRegistry>,
    /// WillManager identity the engine uses for component-to-component calls.
    manager: Auth,
}

impl ReleaseDispatcher {
    pub fn new(vault: Arc<AssetVault>, guardians: Arc<GuardianRegistry>, manager: Auth) -> Self {
        Self { vault, guardians, manager }
    }

    /// Distribute a finalized will's assets and settle guardian bookkeeping.
    ///
    /// Asset distribution only runs when the will carries a vault scope;
    /// guardian crediting (approvers) and detachment (everyone — the will is
    /// terminal and stops counting toward quotas) run for every will.
    pub fn dispatch(&self, will: &Will, now: Timestamp) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        if will.vault_address.is_some() {
            match self.vault.release_assets(
                &self.manager,
                will.id,
                &will.beneficiaries,
                &will.shares_bp,
                now,
            ) {
                Ok(report) => {
                    for (index, error) in &report.failed {
                        outcome
                            .errors
                            .push(format!("asset {index} of will {}: {error}", will.id));
                    }
                    outcome.report = Some(report);
                }
                Err(e) => {
                    warn!(will_id = will.id, error = %e, "asset release dispatch failed");
                    outcome.errors.push(e.to_string());
                }
            }
        }

        for (position, guardian) in will.guardians.iter().enumerate() {
            if will.has_approved(position as u8) {
                match self
                    .guardians
                    .record_successful_release(&self.manager, guardian, now)
                {
                    Ok(()) => outcome.credited.push(*guardian),
                    Err(e) => outcome.errors.push(e.to_string()),
                }
            }
            if let Err(e) = self.guardians.detach_from_will(&self.manager, guardian) {
                outcome.errors.push(e.to_string());
            }
        }

        outcome
    }
}
