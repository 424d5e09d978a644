// ==============================================================================
// security.rs - Password Hashing
// ==============================================================================
// Description: Argon2id password hashing and verification
// Author: Matt Barham
// Created: 2025-11-18
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

// ==============================================================================
// PARAMETERS
// ==============================================================================

/// Memory cost in KiB (46 MiB)
const ARGON2_MEMORY_KIB: u32 = 47104;

/// Iterations
const ARGON2_ITERATIONS: u32 = 3;

/// Lanes
const ARGON2_PARALLELISM: u32 = 4;

fn argon2() -> Result<Argon2<'static>> {
    let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS, ARGON2_PARALLELISM, None)
        .context("Failed to create Argon2 parameters")?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

// ==============================================================================
// HASHING
// ==============================================================================

/// Hashes a password using Argon2id with a fresh random salt
///
/// The returned string is in PHC format and embeds the algorithm,
/// parameters, salt and hash, so verification needs nothing else.
///
/// This is CPU- and memory-heavy; call it from `spawn_blocking`.
///
/// # Errors
///
/// Returns an error if parameter setup or hashing fails (extremely rare)
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(hash)
}

/// Verifies a password against a PHC-format Argon2 hash
///
/// Parameters are read from the hash itself, so digests created with older
/// settings keep verifying.
///
/// # Errors
///
/// Returns an error if the hash string is malformed. A wrong password is
/// `Ok(false)`, not an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification error: {}", e)),
    }
}

/// Well-formed digest with the production parameters that no password matches
const DUMMY_HASH: &str = "$argon2id$v=19$m=47104,t=3,p=4$c29tZXNhbHRzb21lc2FsdA$\
AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Spend the same Argon2 work as a real verification and always fail
///
/// Used for unknown usernames so login latency does not reveal which
/// accounts exist.
pub fn verify_dummy(password: &str) -> Result<bool> {
    verify_password(password, DUMMY_HASH).map(|_| false)
}

// ==============================================================================
// TESTS
// ==============================================================================
