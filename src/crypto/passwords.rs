//! Password hashing built on PBKDF2-HMAC-SHA256.
//! The derivation parameters are centralized so that hashing and verification
//! always agree; the stored format is `base64(salt || derived key)` and does
//! not describe its own parameters, so changing them invalidates every hash
//! already on disk.

use base64::{engine::general_purpose::STANDARD, Engine};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroize;

/// Salt length in bytes, prepended to the derived key in the stored form.
pub const SALT_LEN: usize = 16;
/// Derived key length in bytes.
pub const KEY_LEN: usize = 32;
/// PBKDF2 round count. Tunable for cost, fixed for compatibility.
const ITERATIONS: u32 = 10_000;

#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("secure random source unavailable: {0}")]
    RandomnessUnavailable(String),
    #[error("stored hash is malformed: {0}")]
    MalformedHash(String),
}

/// Hashes a password with PBKDF2-HMAC-SHA256 under a fresh random salt.
/// Returns the base64 encoding of `salt || key` (48 bytes, 64 characters),
/// suitable for storage in a text column. Two calls with the same password
/// produce different strings because the salt is drawn per call.
pub fn hash_password(plaintext: &str) -> Result<String, PasswordHashError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| PasswordHashError::RandomnessUnavailable(format!("{e}")))?;

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(plaintext.as_bytes(), &salt, ITERATIONS, &mut key);

    let mut combined = Vec::with_capacity(SALT_LEN + KEY_LEN);
    combined.extend_from_slice(&salt);
    combined.extend_from_slice(&key);
    Ok(STANDARD.encode(combined))
}

/// Verifies a plaintext password against a stored `base64(salt || key)` value.
/// A stored value that fails to decode or has the wrong decoded length is
/// reported as [`PasswordHashError::MalformedHash`]; a clean mismatch is the
/// normal `Ok(false)` outcome, not an error.
pub fn verify_password(plaintext: &str, stored: &str) -> Result<bool, PasswordHashError> {
    let decoded = STANDARD
        .decode(stored.trim().as_bytes())
        .map_err(|e| PasswordHashError::MalformedHash(format!("{e}")))?;
    if decoded.len() != SALT_LEN + KEY_LEN {
        return Err(PasswordHashError::MalformedHash(format!(
            "expected {} bytes after decoding, got {}",
            SALT_LEN + KEY_LEN,
            decoded.len()
        )));
    }
    let (salt, expected) = decoded.split_at(SALT_LEN);

    let mut candidate = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(plaintext.as_bytes(), salt, ITERATIONS, &mut candidate);

    let matches = constant_time_eq(&candidate, expected);
    candidate.zeroize();
    Ok(matches)
}

/// Compares two byte slices in time independent of where they first differ.
/// A length mismatch is folded into the accumulator instead of returning
/// early, and the loop always walks the full common length.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().min(b.len()) {
        diff |= usize::from(a[i] ^ b[i]);
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::{constant_time_eq, hash_password, verify_password, KEY_LEN, SALT_LEN};
    use base64::{engine::general_purpose::STANDARD, Engine};

    #[test]
    fn hashes_and_verifies_passwords() {
        let stored = hash_password("Passw0rd!").expect("hashing should succeed");
        assert!(verify_password("Passw0rd!", &stored).expect("verification should run"));
        assert!(!verify_password("wrong", &stored).expect("verification should run"));
    }

    #[test]
    fn stored_form_is_48_bytes_and_64_chars() {
        let stored = hash_password("Passw0rd!").expect("hashing should succeed");
        assert_eq!(stored.len(), 64);
        let raw = STANDARD.decode(stored.as_bytes()).expect("valid base64");
        assert_eq!(raw.len(), SALT_LEN + KEY_LEN);
    }

    #[test]
    fn same_password_hashes_differently() {
        let first = hash_password("repeated").expect("hashing should succeed");
        let second = hash_password("repeated").expect("hashing should succeed");
        assert_ne!(first, second);

        let first_salt = STANDARD.decode(first.as_bytes()).unwrap();
        let second_salt = STANDARD.decode(second.as_bytes()).unwrap();
        assert_ne!(first_salt[..SALT_LEN], second_salt[..SALT_LEN]);
    }

    #[test]
    fn empty_password_round_trips() {
        let stored = hash_password("").expect("hashing should succeed");
        assert!(verify_password("", &stored).expect("verification should run"));
        assert!(!verify_password("x", &stored).expect("verification should run"));
    }

    #[test]
    fn rejects_undecodable_stored_value() {
        let err = verify_password("x", "not-base64!!").unwrap_err();
        assert!(format!("{err}").contains("malformed"));
    }

    #[test]
    fn rejects_short_stored_value() {
        let short = STANDARD.encode([0u8; 10]);
        let err = verify_password("x", &short).unwrap_err();
        assert!(format!("{err}").contains("got 10"));
    }

    #[test]
    fn rejects_oversized_stored_value() {
        let long = STANDARD.encode([0u8; SALT_LEN + KEY_LEN + 1]);
        assert!(verify_password("x", &long).is_err());
    }

    #[test]
    fn comparator_handles_equal_and_unequal_buffers() {
        let left = hex::decode("00ffa1b2c3").unwrap();
        let right = hex::decode("00ffa1b2c3").unwrap();
        assert!(constant_time_eq(&left, &right));

        let first_byte_differs = hex::decode("01ffa1b2c3").unwrap();
        let last_byte_differs = hex::decode("00ffa1b2c4").unwrap();
        assert!(!constant_time_eq(&left, &first_byte_differs));
        assert!(!constant_time_eq(&left, &last_byte_differs));
    }

    #[test]
    fn comparator_treats_length_mismatch_as_unequal() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(!constant_time_eq(b"abcd", b"abc"));
        assert!(!constant_time_eq(b"", b"a"));
        assert!(constant_time_eq(b"", b""));
    }

    // Best-effort statistical check that comparison time does not depend on
    // the position of the first differing byte. Timing noise makes this
    // unsuitable for CI, hence the ignore.
    #[test]
    #[ignore]
    fn comparator_timing_is_position_independent() {
        use std::hint::black_box;
        use std::time::Instant;

        const LEN: usize = 4096;
        const ROUNDS: u32 = 20_000;

        let base = vec![0u8; LEN];
        let mut early = base.clone();
        early[0] = 1;
        let mut late = base.clone();
        late[LEN - 1] = 1;

        let time = |other: &[u8]| {
            let start = Instant::now();
            for _ in 0..ROUNDS {
                black_box(constant_time_eq(black_box(&base), black_box(other)));
            }
            start.elapsed().as_secs_f64()
        };

        // warm-up
        time(&early);

        let early_secs = time(&early);
        let late_secs = time(&late);
        let ratio = early_secs.max(late_secs) / early_secs.min(late_secs);
        assert!(ratio < 1.5, "timing ratio {ratio} suggests an early exit");
    }
}
