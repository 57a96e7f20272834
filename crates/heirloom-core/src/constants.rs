//! ─── Heirloom Protocol Constants ────────────────────────────────────────────
//!
//! "Custody for the promises people leave behind."
//!
//! The engine is host-independent: these values bound every will regardless
//! of the ledger or database embedding the core.

// ── Will shape ───────────────────────────────────────────────────────────────

/// Maximum guardians per will. Approvals pack into a u32 bitmap, so this must
/// stay ≤ 32; the protocol fixes it at 20.
pub const MAX_GUARDIANS: usize = 20;

/// Maximum beneficiaries per will.
pub const MAX_BENEFICIARIES: usize = 50;

// ── Liveness / release timing (seconds) ──────────────────────────────────────

/// Minimum heartbeat timeout: 1 day.
pub const MIN_HEARTBEAT_TIMEOUT_SECS: i64 = 86_400;

/// Maximum heartbeat timeout: 10 years (365-day years).
pub const MAX_HEARTBEAT_TIMEOUT_SECS: i64 = 315_360_000;

/// Mandatory delay between a release request and finalization: 7 days.
pub const RELEASE_TIMELOCK_SECS: i64 = 604_800;

// ── Distribution ─────────────────────────────────────────────────────────────

/// Beneficiary shares are expressed in basis points summing to exactly this.
pub const BASIS_POINTS_DENOM: u32 = 10_000;

// ── Scheduler ────────────────────────────────────────────────────────────────

/// Default number of wills examined per scheduler poll.
pub const DEFAULT_SCHEDULER_BATCH: usize = 10;

// ── Guardian registry ────────────────────────────────────────────────────────

/// Reputation assigned at registration.
pub const REPUTATION_INITIAL: u32 = 100;

/// Reputation ceiling.
pub const REPUTATION_MAX: u32 = 1_000;

/// Reputation credited per successful release.
pub const REPUTATION_RELEASE_BONUS: u32 = 10;

/// Default minimum reputation required to be attached to a new will.
pub const DEFAULT_MIN_REPUTATION: u32 = 50;

/// Default cap on concurrently active wills per guardian.
pub const DEFAULT_MAX_WILLS_PER_GUARDIAN: u32 = 10;

// ── Secret custody ───────────────────────────────────────────────────────────

/// Symmetric key length in bytes (AES-256).
pub const KEY_BYTES: usize = 32;

/// AES-GCM nonce length in bytes (96 bits).
pub const NONCE_BYTES: usize = 12;

/// Minimum Shamir threshold. A 1-of-n split is plaintext escrow, not sharing.
pub const MIN_SHARE_THRESHOLD: u8 = 2;

/// Maximum Shamir shares: GF(2⁸) admits 255 distinct non-zero evaluation
/// points.
pub const MAX_SHARES: u8 = 255;

// ── Concurrency ──────────────────────────────────────────────────────────────

/// Width of the per-will lock stripe array. Distinct wills hashing to
/// different stripes mutate in parallel.
pub const LOCK_STRIPES: usize = 64;
