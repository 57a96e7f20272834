//! Shamir's Secret Sharing over GF(2⁸).
//!
//! Each byte of the secret is shared independently: a random polynomial of
//! degree k-1 with the secret byte as constant term, evaluated at the share
//! index (1..=n). Any k shares reconstruct via Lagrange interpolation at
//! x = 0; fewer reveal nothing about the secret.
//!
//! Arithmetic is over the AES field (x⁸ + x⁴ + x³ + x + 1, i.e. 0x11B).

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use heirloom_core::constants::{MAX_SHARES, MIN_SHARE_THRESHOLD};
use heirloom_core::error::HeirloomError;
use heirloom_core::types::Timestamp;

use crate::cipher::SecretKey;
use crate::hash::sha256;

// ── GF(2⁸) arithmetic ────────────────────────────────────────────────────────

/// Carry-less multiply with reduction by the AES polynomial.
fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1B;
        }
        b >>= 1;
    }
    product
}

/// Multiplicative inverse via a^254 (Fermat; the group has order 255).
fn gf_inv(a: u8) -> u8 {
    debug_assert!(a != 0, "zero has no inverse in GF(2^8)");
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u8;
    while exp != 0 {
        if exp & 1 != 0 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    result
}

/// Evaluate a polynomial (coefficients low-to-high) at `x` via Horner.
fn gf_eval(coefficients: &[u8], x: u8) -> u8 {
    let mut acc = 0u8;
    for &c in coefficients.iter().rev() {
        acc = gf_mul(acc, x) ^ c;
    }
    acc
}

// ── KeyShare ─────────────────────────────────────────────────────────────────

/// One fragment of a split key, as handed to a guardian.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyShare {
    /// Evaluation point, 1..=n. Never zero (x = 0 is the secret itself).
    pub index: u8,
    /// One GF(2⁸) evaluation per secret byte.
    pub bytes: Vec<u8>,
    /// k — shares needed to reconstruct.
    pub threshold: u8,
    /// n — shares issued.
    pub total: u8,
    pub created_at: Timestamp,
    /// SHA-256 of `bytes`; verified before any reconstruction attempt.
    pub checksum: [u8; 32],
}

impl KeyShare {
    pub fn checksum_valid(&self) -> bool {
        sha256(&self.bytes) == self.checksum
    }
}

// ── split / combine ──────────────────────────────────────────────────────────

/// Split `key` into `n` shares, any `k` of which reconstruct it.
/// Requires 2 ≤ k ≤ n ≤ 255.
pub fn split_key(
    key: &SecretKey,
    n: u8,
    k: u8,
    now: Timestamp,
) -> Result<Vec<KeyShare>, HeirloomError> {
    if k < MIN_SHARE_THRESHOLD || k > n || n > MAX_SHARES {
        return Err(HeirloomError::ShareBoundsInvalid { k, n });
    }

    let secret = key.as_bytes();
    let mut share_bytes: Vec<Vec<u8>> = vec![Vec::with_capacity(secret.len()); n as usize];

    let mut coefficients = vec![0u8; k as usize];
    for &secret_byte in secret.iter() {
        coefficients[0] = secret_byte;
        OsRng.fill_bytes(&mut coefficients[1..]);
        for (slot, bytes) in share_bytes.iter_mut().enumerate() {
            bytes.push(gf_eval(&coefficients, slot as u8 + 1));
        }
    }

    Ok(share_bytes
        .into_iter()
        .enumerate()
        .map(|(slot, bytes)| {
            let checksum = sha256(&bytes);
            KeyShare {
                index: slot as u8 + 1,
                bytes,
                threshold: k,
                total: n,
                created_at: now,
                checksum,
            }
        })
        .collect())
}

/// Reconstruct the key from at least `threshold` shares. Every share's
/// checksum is verified first; a tampered share is reported by index rather
/// than silently producing a wrong key.
pub fn combine_shares(shares: &[KeyShare]) -> Result<SecretKey, HeirloomError> {
    let first = shares.first().ok_or(HeirloomError::TooFewShares { need: MIN_SHARE_THRESHOLD, got: 0 })?;
    let threshold = first.threshold;
    if shares.len() < threshold as usize {
        return Err(HeirloomError::TooFewShares { need: threshold, got: shares.len() });
    }

    let secret_len = first.bytes.len();
    let mut seen = [false; 256];
    for share in shares {
        if share.threshold != threshold || share.total != first.total || share.bytes.len() != secret_len {
            return Err(HeirloomError::InconsistentShares);
        }
        if share.index == 0 || seen[share.index as usize] {
            return Err(HeirloomError::DuplicateShareIndex(share.index));
        }
        seen[share.index as usize] = true;
        if !share.checksum_valid() {
            return Err(HeirloomError::ChecksumMismatch { index: share.index });
        }
    }
    if secret_len != heirloom_core::constants::KEY_BYTES {
        return Err(HeirloomError::InconsistentShares);
    }

    // Interpolation only needs exactly `threshold` points.
    let points = &shares[..threshold as usize];
    let mut secret = [0u8; heirloom_core::constants::KEY_BYTES];
    for (byte_position, slot) in secret.iter_mut().enumerate() {
        let mut acc = 0u8;
        for share in points {
            // Lagrange basis at x = 0: Π x_j / (x_j ⊕ x_i) over j ≠ i.
            let mut basis = 1u8;
            for other in points {
                if other.index == share.index {
                    continue;
                }
                basis = gf_mul(basis, gf_mul(other.index, gf_inv(other.index ^ share.index)));
            }
            acc ^= gf_mul(share.bytes[byte_position], basis);
        }
        *slot = acc;
    }
    Ok(SecretKey(secret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::generate_key;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const NOW: Timestamp = 1_700_000_000;

    #[test]
    fn gf_mul_matches_known_aes_values() {
        // Classic AES field examples.
        assert_eq!(gf_mul(0x57, 0x83), 0xC1);
        assert_eq!(gf_mul(0x57, 0x13), 0xFE);
        assert_eq!(gf_mul(0x01, 0xAB), 0xAB);
        assert_eq!(gf_mul(0x00, 0xAB), 0x00);
    }

    #[test]
    fn gf_inv_is_an_inverse() {
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1, "inverse failed for {a}");
        }
    }

    #[test]
    fn split_bounds_enforced() {
        let key = generate_key();
        assert!(matches!(
            split_key(&key, 5, 1, NOW).unwrap_err(),
            HeirloomError::ShareBoundsInvalid { k: 1, n: 5 }
        ));
        assert!(matches!(
            split_key(&key, 2, 3, NOW).unwrap_err(),
            HeirloomError::ShareBoundsInvalid { k: 3, n: 2 }
        ));
        assert!(split_key(&key, 255, 255, NOW).is_ok());
    }

    #[test]
    fn round_trip_exact_threshold() {
        let key = generate_key();
        let shares = split_key(&key, 5, 3, NOW).unwrap();
        assert_eq!(shares.len(), 5);
        let recovered = combine_shares(&shares[..3]).unwrap();
        assert_eq!(recovered, key);
    }

    #[test]
    fn round_trip_any_subset_of_shares() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let n = rng.gen_range(2..=12u8);
            let k = rng.gen_range(2..=n);
            let key = generate_key();
            let shares = split_key(&key, n, k, NOW).unwrap();

            // Pick a random k-subset.
            let mut indexes: Vec<usize> = (0..n as usize).collect();
            for i in (1..indexes.len()).rev() {
                indexes.swap(i, rng.gen_range(0..=i));
            }
            let subset: Vec<KeyShare> =
                indexes[..k as usize].iter().map(|&i| shares[i].clone()).collect();
            assert_eq!(combine_shares(&subset).unwrap(), key, "n={n} k={k}");
        }
    }

    #[test]
    fn too_few_shares_rejected() {
        let key = generate_key();
        let shares = split_key(&key, 5, 3, NOW).unwrap();
        assert!(matches!(
            combine_shares(&shares[..2]).unwrap_err(),
            HeirloomError::TooFewShares { need: 3, got: 2 }
        ));
        assert!(matches!(
            combine_shares(&[]).unwrap_err(),
            HeirloomError::TooFewShares { .. }
        ));
    }

    #[test]
    fn tampered_share_detected_and_clean_subset_recovers() {
        let key = generate_key();
        let mut shares = split_key(&key, 5, 3, NOW).unwrap();

        // Flip one byte of share 2 (index 2 lives at position 1).
        shares[1].bytes[7] ^= 0xFF;

        let tampered = vec![shares[0].clone(), shares[1].clone(), shares[2].clone()];
        assert!(matches!(
            combine_shares(&tampered).unwrap_err(),
            HeirloomError::ChecksumMismatch { index: 2 }
        ));

        // Shares {1, 3, 4} avoid the damage and reconstruct the key.
        let clean = vec![shares[0].clone(), shares[2].clone(), shares[3].clone()];
        assert_eq!(combine_shares(&clean).unwrap(), key);
    }

    #[test]
    fn duplicate_share_index_rejected() {
        let key = generate_key();
        let shares = split_key(&key, 4, 2, NOW).unwrap();
        let duplicated = vec![shares[0].clone(), shares[0].clone()];
        assert!(matches!(
            combine_shares(&duplicated).unwrap_err(),
            HeirloomError::DuplicateShareIndex(1)
        ));
    }

    #[test]
    fn mixed_split_parameters_rejected() {
        let key = generate_key();
        let a = split_key(&key, 4, 2, NOW).unwrap();
        let b = split_key(&key, 5, 3, NOW).unwrap();
        let mixed = vec![a[0].clone(), b[1].clone()];
        assert!(matches!(
            combine_shares(&mixed).unwrap_err(),
            HeirloomError::InconsistentShares
        ));
    }
}
