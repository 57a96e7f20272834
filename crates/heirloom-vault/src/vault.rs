use std::sync::Arc;

use heirloom_core::asset::{AssetKind, DepositRecord};
use heirloom_core::auth::{Auth, Role};
use heirloom_core::constants::BASIS_POINTS_DENOM;
use heirloom_core::error::HeirloomError;
use heirloom_core::event::Event;
use heirloom_core::types::{Amount, Principal, Timestamp, TokenId, WillId};
use heirloom_store::{StateDb, WillLocks};
use tracing::{info, warn};

use crate::adapter::TransferAdapter;

/// Exact floor(q · bp / 10000) without u128 overflow: split q into whole
/// denominations plus remainder (remainder · bp stays far below u128::MAX).
fn basis_share(q: Amount, bp: u16) -> Amount {
    let denom = BASIS_POINTS_DENOM as u128;
    (q / denom) * bp as u128 + (q % denom) * bp as u128 / denom
}

/// Outcome of one `release_assets` batch. Failures are per-asset: a broken
/// beneficiary address never aborts the rest of the batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Deposit indexes distributed in this batch.
    pub released: Vec<u32>,
    /// Indexes that were already released (emergency withdrawal or a prior
    /// batch) and were skipped.
    pub skipped: Vec<u32>,
    /// Indexes whose outbound transfer failed, with the failure message. The
    /// released flag of these records has been rolled back so the release can
    /// be retried out of band.
    pub failed: Vec<(u32, String)>,
}

/// The asset registry. All custody resources live here; only the vault
/// mutates its balances.
pub struct AssetVault {
    db: Arc<StateDb>,
    adapter: Arc<dyn TransferAdapter>,
    locks: WillLocks,
}

impl AssetVault {
    pub fn new(db: Arc<StateDb>, adapter: Arc<dyn TransferAdapter>) -> Self {
        Self { db, adapter, locks: WillLocks::new() }
    }

    // ── Deposits ─────────────────────────────────────────────────────────────

    /// Record a native-value deposit. The host has already moved the value
    /// into its escrow scope; this updates the vault's books.
    pub fn deposit_native(
        &self,
        caller: &Principal,
        will_id: WillId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<u32, HeirloomError> {
        if amount == 0 {
            return Err(HeirloomError::ZeroDeposit);
        }
        let _g = self.locks.guard(will_id);

        let balance = self.db.native_balance(will_id)?;
        let total = self.db.total_native_held()?;
        let index = self.append_deposit(caller, will_id, AssetKind::Native { amount }, now)?;
        self.db.set_native_balance(will_id, balance + amount)?;
        self.db.set_total_native_held(total + amount)?;
        Ok(index)
    }

    pub fn deposit_fungible(
        &self,
        caller: &Principal,
        will_id: WillId,
        token: TokenId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<u32, HeirloomError> {
        if amount == 0 {
            return Err(HeirloomError::ZeroDeposit);
        }
        let _g = self.locks.guard(will_id);
        self.append_deposit(caller, will_id, AssetKind::Fungible { token, amount }, now)
    }

    pub fn deposit_unique(
        &self,
        caller: &Principal,
        will_id: WillId,
        token: TokenId,
        token_id: u128,
        now: Timestamp,
    ) -> Result<u32, HeirloomError> {
        let _g = self.locks.guard(will_id);
        self.append_deposit(caller, will_id, AssetKind::Unique { token, id: token_id }, now)
    }

    /// Semi-fungible deposits track the token id and the amount separately.
    pub fn deposit_semi_fungible(
        &self,
        caller: &Principal,
        will_id: WillId,
        token: TokenId,
        token_id: u128,
        amount: Amount,
        now: Timestamp,
    ) -> Result<u32, HeirloomError> {
        if amount == 0 {
            return Err(HeirloomError::ZeroDeposit);
        }
        let _g = self.locks.guard(will_id);
        self.append_deposit(
            caller,
            will_id,
            AssetKind::SemiFungible { token, id: token_id, amount },
            now,
        )
    }

    fn append_deposit(
        &self,
        caller: &Principal,
        will_id: WillId,
        asset: AssetKind,
        now: Timestamp,
    ) -> Result<u32, HeirloomError> {
        let index = self.db.deposit_count(will_id)?;
        let record = DepositRecord {
            will_id,
            index,
            asset,
            depositor: *caller,
            deposited_at: now,
            released: false,
        };
        self.db.put_deposit(&record)?;
        self.db.set_deposit_count(will_id, index + 1)?;
        self.db.record_first_depositor(will_id, caller)?;
        self.db.append_event(
            now,
            Event::AssetDeposited { will_id, index, depositor: *caller },
        )?;
        info!(will_id, index, "asset deposited");
        Ok(index)
    }

    // ── Release ──────────────────────────────────────────────────────────────

    /// Distribute every unreleased deposit of `will_id` to `beneficiaries`
    /// according to `shares_bp`. Privileged: will-engine (WillManager) only.
    ///
    /// Each record is marked released and persisted before any outbound
    /// transfer is attempted, so a re-entrant call observes it as spent. A
    /// transfer failure rolls back that single record's flag and the batch
    /// continues.
    pub fn release_assets(
        &self,
        auth: &Auth,
        will_id: WillId,
        beneficiaries: &[Principal],
        shares_bp: &[u16],
        now: Timestamp,
    ) -> Result<ReleaseReport, HeirloomError> {
        auth.require(Role::WillManager)?;
        if beneficiaries.is_empty() {
            return Err(HeirloomError::BeneficiaryCountOutOfRange {
                max: heirloom_core::constants::MAX_BENEFICIARIES,
                got: 0,
            });
        }
        if beneficiaries.len() != shares_bp.len() {
            return Err(HeirloomError::ShareCountMismatch {
                expected: beneficiaries.len(),
                got: shares_bp.len(),
            });
        }
        let sum: u32 = shares_bp.iter().map(|bp| *bp as u32).sum();
        if sum != BASIS_POINTS_DENOM {
            return Err(HeirloomError::ShareSumMismatch { got: sum });
        }

        let _g = self.locks.guard(will_id);
        let mut report = ReleaseReport::default();

        for mut record in self.db.iter_deposits(will_id)? {
            if record.released {
                report.skipped.push(record.index);
                continue;
            }

            // Mark spent before touching the adapter.
            record.released = true;
            self.db.put_deposit(&record)?;

            match self.distribute(&record, beneficiaries, shares_bp) {
                Ok(()) => {
                    if let AssetKind::Native { amount } = record.asset {
                        self.debit_native(will_id, amount)?;
                    }
                    self.db
                        .append_event(now, Event::AssetReleased { will_id, index: record.index })?;
                    report.released.push(record.index);
                }
                Err(e) => {
                    warn!(will_id, index = record.index, error = %e, "asset release failed; rolled back");
                    record.released = false;
                    self.db.put_deposit(&record)?;
                    report.failed.push((record.index, e.to_string()));
                }
            }
        }

        info!(
            will_id,
            released = report.released.len(),
            failed = report.failed.len(),
            "release batch complete"
        );
        Ok(report)
    }

    fn distribute(
        &self,
        record: &DepositRecord,
        beneficiaries: &[Principal],
        shares_bp: &[u16],
    ) -> Result<(), HeirloomError> {
        match &record.asset {
            // Indivisible: the whole item goes to beneficiary 0.
            AssetKind::Unique { token, id } => {
                self.adapter.transfer_unique(token, &beneficiaries[0], *id)
            }
            divisible => {
                let quantity = divisible.quantity();
                for (beneficiary, bp) in beneficiaries.iter().zip(shares_bp) {
                    let amount = basis_share(quantity, *bp);
                    if amount == 0 {
                        continue;
                    }
                    match divisible {
                        AssetKind::Native { .. } => {
                            self.adapter.transfer_native(beneficiary, amount)?
                        }
                        AssetKind::Fungible { token, .. } => {
                            self.adapter.transfer_fungible(token, beneficiary, amount)?
                        }
                        AssetKind::SemiFungible { token, id, .. } => self
                            .adapter
                            .transfer_semi_fungible(token, beneficiary, *id, amount)?,
                        AssetKind::Unique { .. } => unreachable!("handled above"),
                    }
                }
                Ok(())
            }
        }
    }

    // ── Emergency withdrawal ─────────────────────────────────────────────────

    /// Return a single unreleased deposit to its original depositor. Works
    /// independently of the will engine and is never blocked by the pause
    /// gate; the will's own state is untouched.
    pub fn emergency_withdraw(
        &self,
        caller: &Principal,
        will_id: WillId,
        asset_index: u32,
        now: Timestamp,
    ) -> Result<(), HeirloomError> {
        let _g = self.locks.guard(will_id);

        let mut record = self
            .db
            .get_deposit(will_id, asset_index)?
            .ok_or(HeirloomError::DepositNotFound { will_id, index: asset_index })?;

        if record.released {
            return Err(HeirloomError::DepositAlreadyReleased { will_id, index: asset_index });
        }
        if record.depositor != *caller {
            return Err(HeirloomError::NotDepositor { will_id, index: asset_index });
        }

        record.released = true;
        self.db.put_deposit(&record)?;

        let refund = match &record.asset {
            AssetKind::Native { amount } => self.adapter.transfer_native(caller, *amount),
            AssetKind::Fungible { token, amount } => {
                self.adapter.transfer_fungible(token, caller, *amount)
            }
            AssetKind::Unique { token, id } => self.adapter.transfer_unique(token, caller, *id),
            AssetKind::SemiFungible { token, id, amount } => {
                self.adapter.transfer_semi_fungible(token, caller, *id, *amount)
            }
        };

        if let Err(e) = refund {
            record.released = false;
            self.db.put_deposit(&record)?;
            return Err(e);
        }

        if let AssetKind::Native { amount } = record.asset {
            self.debit_native(will_id, amount)?;
        }

        self.db.append_event(
            now,
            Event::EmergencyWithdrawal { will_id, index: asset_index, depositor: *caller },
        )?;
        info!(will_id, index = asset_index, "emergency withdrawal");
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn deposits(&self, will_id: WillId) -> Result<Vec<DepositRecord>, HeirloomError> {
        self.db.iter_deposits(will_id)
    }

    pub fn native_balance(&self, will_id: WillId) -> Result<Amount, HeirloomError> {
        self.db.native_balance(will_id)
    }

    pub fn total_native_held(&self) -> Result<Amount, HeirloomError> {
        self.db.total_native_held()
    }

    pub fn first_depositor(&self, will_id: WillId) -> Result<Option<Principal>, HeirloomError> {
        self.db.first_depositor(will_id)
    }

    // ── Internal bookkeeping ─────────────────────────────────────────────────

    fn debit_native(&self, will_id: WillId, amount: Amount) -> Result<(), HeirloomError> {
        let balance = self.db.native_balance(will_id)?;
        let total = self.db.total_native_held()?;
        let new_balance = balance
            .checked_sub(amount)
            .ok_or(HeirloomError::InsufficientBalance { need: amount, have: balance })?;
        let new_total = total
            .checked_sub(amount)
            .ok_or(HeirloomError::InsufficientBalance { need: amount, have: total })?;
        self.db.set_native_balance(will_id, new_balance)?;
        self.db.set_total_native_held(new_total)?;
        Ok(())
    }
}
