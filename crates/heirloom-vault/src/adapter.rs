//! Outbound transfer adapter — the vault's only external collaborator.
//!
//! Inbound custody is the host's job: tokens are transferred into the host's
//! escrow scope before the corresponding `deposit_*` call records them here.
//! Outbound distribution goes through this trait so the policy core stays
//! independent of any particular ledger.

use std::sync::Mutex;

use heirloom_core::error::HeirloomError;
use heirloom_core::types::{Amount, Principal, TokenId};

pub trait TransferAdapter: Send + Sync {
    fn transfer_native(&self, to: &Principal, amount: Amount) -> Result<(), HeirloomError>;

    fn transfer_fungible(
        &self,
        token: &TokenId,
        to: &Principal,
        amount: Amount,
    ) -> Result<(), HeirloomError>;

    fn transfer_unique(
        &self,
        token: &TokenId,
        to: &Principal,
        id: u128,
    ) -> Result<(), HeirloomError>;

    fn transfer_semi_fungible(
        &self,
        token: &TokenId,
        to: &Principal,
        id: u128,
        amount: Amount,
    ) -> Result<(), HeirloomError>;
}

// ── RecordingAdapter ─────────────────────────────────────────────────────────

/// One outbound transfer as observed by [`RecordingAdapter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferCall {
    Native { to: Principal, amount: Amount },
    Fungible { token: TokenId, to: Principal, amount: Amount },
    Unique { token: TokenId, to: Principal, id: u128 },
    SemiFungible { token: TokenId, to: Principal, id: u128, amount: Amount },
}

/// Adapter that records every transfer and always succeeds. Reference
/// implementation for embedding hosts and the workhorse of the test suite.
#[derive(Default)]
pub struct RecordingAdapter {
    calls: Mutex<Vec<TransferCall>>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TransferCall> {
        self.calls.lock().expect("adapter mutex").clone()
    }

    fn record(&self, call: TransferCall) {
        self.calls.lock().expect("adapter mutex").push(call);
    }
}

impl TransferAdapter for RecordingAdapter {
    fn transfer_native(&self, to: &Principal, amount: Amount) -> Result<(), HeirloomError> {
        self.record(TransferCall::Native { to: *to, amount });
        Ok(())
    }

    fn transfer_fungible(
        &self,
        token: &TokenId,
        to: &Principal,
        amount: Amount,
    ) -> Result<(), HeirloomError> {
        self.record(TransferCall::Fungible { token: *token, to: *to, amount });
        Ok(())
    }

    fn transfer_unique(
        &self,
        token: &TokenId,
        to: &Principal,
        id: u128,
    ) -> Result<(), HeirloomError> {
        self.record(TransferCall::Unique { token: *token, to: *to, id });
        Ok(())
    }

    fn transfer_semi_fungible(
        &self,
        token: &TokenId,
        to: &Principal,
        id: u128,
        amount: Amount,
    ) -> Result<(), HeirloomError> {
        self.record(TransferCall::SemiFungible { token: *token, to: *to, id, amount });
        Ok(())
    }
}

// ── FailingAdapter ───────────────────────────────────────────────────────────

/// Adapter that rejects transfers to a chosen set of recipients and records
/// everything else. Used to exercise per-asset rollback.
pub struct FailingAdapter {
    inner: RecordingAdapter,
    reject: Vec<Principal>,
}

impl FailingAdapter {
    pub fn rejecting(reject: Vec<Principal>) -> Self {
        Self { inner: RecordingAdapter::new(), reject }
    }

    pub fn calls(&self) -> Vec<TransferCall> {
        self.inner.calls()
    }

    fn check(&self, to: &Principal) -> Result<(), HeirloomError> {
        if self.reject.contains(to) {
            return Err(HeirloomError::TransferFailed(format!(
                "recipient {to} rejected the transfer"
            )));
        }
        Ok(())
    }
}

impl TransferAdapter for FailingAdapter {
    fn transfer_native(&self, to: &Principal, amount: Amount) -> Result<(), HeirloomError> {
        self.check(to)?;
        self.inner.transfer_native(to, amount)
    }

    fn transfer_fungible(
        &self,
        token: &TokenId,
        to: &Principal,
        amount: Amount,
    ) -> Result<(), HeirloomError> {
        self.check(to)?;
        self.inner.transfer_fungible(token, to, amount)
    }

    fn transfer_unique(
        &self,
        token: &TokenId,
        to: &Principal,
        id: u128,
    ) -> Result<(), HeirloomError> {
        self.check(to)?;
        self.inner.transfer_unique(token, to, id)
    }

    fn transfer_semi_fungible(
        &self,
        token: &TokenId,
        to: &Principal,
        id: u128,
        amount: Amount,
    ) -> Result<(), HeirloomError> {
        self.check(to)?;
        self.inner.transfer_semi_fungible(token, to, id, amount)
    }
}
