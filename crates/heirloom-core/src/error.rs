use thiserror::Error;

use crate::auth::Role;
use crate::types::WillId;

/// Recovery taxonomy for [`HeirloomError`]. Hosts switch on the kind to pick
/// a recovery strategy without matching individual variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input validation failure (size, range, duplicate, null). Caller
    /// corrects inputs.
    InvalidParameters,
    /// Caller is not the will's owner.
    NotOwner,
    /// Caller is not in the will's guardian list.
    NotGuardian,
    /// Caller lacks the required role.
    Unauthorized,
    /// Will already finalized; terminal.
    AlreadyReleased,
    /// Finalize called before any release request.
    NotRequested,
    /// Finalize called before the timelock expired; retry after the delay.
    TimelockNotExpired,
    /// Unknown will id.
    WillNotFound,
    /// External asset transfer failed; retry release per asset.
    TransferFailed,
    /// Vault bookkeeping mismatch; investigate, not expected.
    InsufficientBalance,
    /// Shamir share failed its checksum; obtain a fresh share.
    ChecksumMismatch,
    /// Authenticated decryption failed.
    DecryptionFailed,
    /// Admin pause active; wait or unpause.
    Paused,
    /// Persistence layer failure.
    Storage,
}

#[derive(Debug, Error)]
pub enum HeirloomError {
    // ── Will validation ──────────────────────────────────────────────────────
    #[error("guardian count must be between 1 and {max}; got {got}")]
    GuardianCountOutOfRange { max: usize, got: usize },

    #[error("beneficiary count must be between 1 and {max}; got {got}")]
    BeneficiaryCountOutOfRange { max: usize, got: usize },

    #[error("guardian threshold must be between 1 and {guardians}; got {got}")]
    ThresholdOutOfRange { guardians: usize, got: u8 },

    #[error("heartbeat timeout must be between {min} and {max} seconds; got {got}")]
    HeartbeatTimeoutOutOfRange { min: i64, max: i64, got: i64 },

    #[error("encrypted payload CID must not be empty")]
    EmptyCid,

    #[error("payload hash must not be all-zero")]
    ZeroPayloadHash,

    #[error("null principal not allowed in guardian or beneficiary list")]
    NullPrincipal,

    #[error("duplicate guardian in list")]
    DuplicateGuardian,

    #[error("duplicate beneficiary in list")]
    DuplicateBeneficiary,

    #[error("owner may not be their own guardian")]
    OwnerAsGuardian,

    #[error("share list must match beneficiary list length {expected}; got {got}")]
    ShareCountMismatch { expected: usize, got: usize },

    #[error("beneficiary shares must sum to 10000 basis points; got {got}")]
    ShareSumMismatch { got: u32 },

    // ── Authorization ────────────────────────────────────────────────────────
    #[error("caller is not the will owner")]
    NotOwner,

    #[error("caller is not a guardian of this will")]
    NotGuardian,

    #[error("caller lacks required role {required:?}")]
    Unauthorized { required: Role },

    #[error("engine is paused")]
    EnginePaused,

    // ── Will state machine ───────────────────────────────────────────────────
    #[error("will {0} not found")]
    WillNotFound(WillId),

    #[error("will {0} has already been released")]
    AlreadyReleased(WillId),

    #[error("release has not been requested for will {0}")]
    ReleaseNotRequested(WillId),

    #[error("release timelock not expired for will {will_id} (finalizable at {finalizable_at})")]
    TimelockNotExpired {
        will_id: WillId,
        finalizable_at: i64,
    },

    // ── Asset vault ──────────────────────────────────────────────────────────
    #[error("deposit amount must be greater than zero")]
    ZeroDeposit,

    #[error("deposit {index} not found for will {will_id}")]
    DepositNotFound { will_id: WillId, index: u32 },

    #[error("deposit {index} of will {will_id} has already been released")]
    DepositAlreadyReleased { will_id: WillId, index: u32 },

    #[error("only the original depositor may withdraw deposit {index} of will {will_id}")]
    NotDepositor { will_id: WillId, index: u32 },

    #[error("external transfer failed: {0}")]
    TransferFailed(String),

    #[error("insufficient vault balance: need {need}, have {have}")]
    InsufficientBalance { need: u128, have: u128 },

    // ── Guardian registry ────────────────────────────────────────────────────
    #[error("guardian already registered: {0}")]
    GuardianAlreadyRegistered(String),

    #[error("guardian not registered: {0}")]
    GuardianNotRegistered(String),

    #[error("guardian is not active: {0}")]
    GuardianNotActive(String),

    #[error("guardian is not verified: {0}")]
    GuardianNotVerified(String),

    #[error("guardian reputation {reputation} below required minimum {min}")]
    GuardianReputationTooLow { reputation: u32, min: u32 },

    #[error("guardian already at maximum of {max} active wills")]
    GuardianAtCapacity { max: u32 },

    #[error("reputation must not exceed {max}; got {got}")]
    ReputationOutOfRange { max: u32, got: u32 },

    // ── Secret custody ───────────────────────────────────────────────────────
    #[error("share threshold must satisfy 2 <= k <= n <= 255; got k={k}, n={n}")]
    ShareBoundsInvalid { k: u8, n: u8 },

    #[error("too few shares to reconstruct: need {need}, got {got}")]
    TooFewShares { need: u8, got: usize },

    #[error("duplicate share index {0}")]
    DuplicateShareIndex(u8),

    #[error("shares disagree on threshold or secret length")]
    InconsistentShares,

    #[error("share {index} failed its integrity checksum")]
    ChecksumMismatch { index: u8 },

    #[error("decryption failed: ciphertext rejected")]
    DecryptionFailed,

    #[error("unsupported cipher algorithm tag: {0}")]
    UnsupportedAlgorithm(String),

    #[error("payload hash mismatch: ciphertext does not match the stored witness")]
    PayloadHashMismatch,

    #[error("malformed content identifier: {0}")]
    InvalidCid(String),

    #[error("blob not found: {0}")]
    BlobNotFound(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl HeirloomError {
    /// Map this error onto the protocol recovery taxonomy.
    pub fn kind(&self) -> ErrorKind {
        use HeirloomError::*;
        match self {
            GuardianCountOutOfRange { .. }
            | BeneficiaryCountOutOfRange { .. }
            | ThresholdOutOfRange { .. }
            | HeartbeatTimeoutOutOfRange { .. }
            | EmptyCid
            | ZeroPayloadHash
            | NullPrincipal
            | DuplicateGuardian
            | DuplicateBeneficiary
            | OwnerAsGuardian
            | ShareCountMismatch { .. }
            | ShareSumMismatch { .. }
            | ZeroDeposit
            | DepositNotFound { .. }
            | DepositAlreadyReleased { .. }
            | GuardianAlreadyRegistered(_)
            | GuardianNotRegistered(_)
            | GuardianNotActive(_)
            | GuardianNotVerified(_)
            | GuardianReputationTooLow { .. }
            | GuardianAtCapacity { .. }
            | ReputationOutOfRange { .. }
            | ShareBoundsInvalid { .. }
            | TooFewShares { .. }
            | DuplicateShareIndex(_)
            | InconsistentShares
            | UnsupportedAlgorithm(_)
            | PayloadHashMismatch
            | InvalidCid(_)
            | BlobNotFound(_) => ErrorKind::InvalidParameters,

            NotOwner | NotDepositor { .. } => ErrorKind::NotOwner,
            NotGuardian => ErrorKind::NotGuardian,
            Unauthorized { .. } => ErrorKind::Unauthorized,
            EnginePaused => ErrorKind::Paused,

            WillNotFound(_) => ErrorKind::WillNotFound,
            AlreadyReleased(_) => ErrorKind::AlreadyReleased,
            ReleaseNotRequested(_) => ErrorKind::NotRequested,
            TimelockNotExpired { .. } => ErrorKind::TimelockNotExpired,

            TransferFailed(_) => ErrorKind::TransferFailed,
            InsufficientBalance { .. } => ErrorKind::InsufficientBalance,

            ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            DecryptionFailed => ErrorKind::DecryptionFailed,

            Serialization(_) | Storage(_) => ErrorKind::Storage,
        }
    }
}
