//! heirloom-vault
//!
//! The asset registry: escrow for heterogeneous assets per will id, released
//! to beneficiaries by basis-point shares on command of the will engine, with
//! an emergency exit for depositors that works independently of the engine.

pub mod adapter;
pub mod vault;

pub use adapter::{FailingAdapter, RecordingAdapter, TransferAdapter, TransferCall};
pub use vault::{AssetVault, ReleaseReport};
