use serde::{Deserialize, Serialize};

use crate::types::{Amount, Principal, Timestamp, TokenId, WillId};

// ── AssetKind ────────────────────────────────────────────────────────────────

/// The four asset classes the vault escrows. A tagged sum rather than an
/// overloaded quantity field, so a semi-fungible deposit tracks both its
/// token id and its amount.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AssetKind {
    /// Host-native value (e.g. the chain's base currency).
    Native { amount: Amount },
    /// Fungible token balance within an external token scope.
    Fungible { token: TokenId, amount: Amount },
    /// A unique, indivisible item identified by `id` within `token`.
    Unique { token: TokenId, id: u128 },
    /// A quantity of a specific id within a semi-fungible token scope.
    SemiFungible {
        token: TokenId,
        id: u128,
        amount: Amount,
    },
}

impl AssetKind {
    /// True for classes distributed by basis-point shares. Unique items are
    /// indivisible and go wholly to beneficiary 0.
    pub fn is_divisible(&self) -> bool {
        !matches!(self, AssetKind::Unique { .. })
    }

    /// The divisible quantity of this asset (the unique id is not a quantity).
    pub fn quantity(&self) -> Amount {
        match self {
            AssetKind::Native { amount } => *amount,
            AssetKind::Fungible { amount, .. } => *amount,
            AssetKind::SemiFungible { amount, .. } => *amount,
            AssetKind::Unique { .. } => 1,
        }
    }
}

// ── DepositRecord ────────────────────────────────────────────────────────────

/// One escrowed asset, keyed by `(will_id, index)` in the state DB.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DepositRecord {
    pub will_id: WillId,
    /// Position in the will's deposit vector; assigned at deposit time.
    pub index: u32,
    pub asset: AssetKind,
    /// Principal that made this deposit. Only they may emergency-withdraw it.
    pub depositor: Principal,
    pub deposited_at: Timestamp,
    /// At-most-once guard: set before any outbound transfer is attempted.
    pub released: bool,
}
