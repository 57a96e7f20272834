use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use heirloom_core::constants::{KEY_BYTES, NONCE_BYTES};
use heirloom_core::error::HeirloomError;
use heirloom_core::types::Timestamp;

// ── SecretKey ────────────────────────────────────────────────────────────────

/// 256-bit symmetric key. Wiped from memory on drop.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(pub [u8; KEY_BYTES]);

impl SecretKey {
    pub fn as_bytes(&self) -> &[u8; KEY_BYTES] {
        &self.0
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for SecretKey {}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKey(…)")
    }
}

/// Generate a fresh 256-bit key from the OS RNG.
pub fn generate_key() -> SecretKey {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    SecretKey(bytes)
}

// ── EncryptedPayload ─────────────────────────────────────────────────────────

/// Cipher identifier recorded alongside every payload for future agility.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CipherAlgorithm {
    /// AES-256 in GCM mode (authenticated; 96-bit nonce, 128-bit tag).
    Aes256Gcm,
}

impl CipherAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherAlgorithm::Aes256Gcm => "aes-256-gcm",
        }
    }
}

/// An encrypted payload envelope: ciphertext (with the GCM tag appended),
/// the per-call nonce, the algorithm tag, and the encryption timestamp.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_BYTES],
    pub algorithm: CipherAlgorithm,
    pub created_at: Timestamp,
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(plaintext: &[u8], key: &SecretKey, now: Timestamp) -> EncryptedPayload {
    let mut nonce = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .expect("AES-GCM encryption of an in-memory buffer is infallible");

    EncryptedPayload {
        ciphertext,
        nonce,
        algorithm: CipherAlgorithm::Aes256Gcm,
        created_at: now,
    }
}

/// Authenticated decryption. Any tampering with the ciphertext, the nonce,
/// or use of the wrong key fails the GCM tag check.
pub fn decrypt(payload: &EncryptedPayload, key: &SecretKey) -> Result<Vec<u8>, HeirloomError> {
    match payload.algorithm {
        CipherAlgorithm::Aes256Gcm => {}
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(&payload.nonce), payload.ciphertext.as_slice())
        .map_err(|_| HeirloomError::DecryptionFailed)
}
