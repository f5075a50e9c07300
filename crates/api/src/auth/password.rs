//! Password hashing, verification, and strength validation.
//!
//! New hashes are Argon2id PHC strings, so parameters and salt travel with
//! the hash. Two stored encodings are accepted at login (see
//! [`recognized_scheme`]):
//!
//! - Argon2id v19 with a 16-byte salt and a 32-byte output, as produced here.
//! - bcrypt (`$2a$`, `$2b$`, `$2y$`, 60 characters), carried over from older
//!   deployments. These verify normally and are flagged by [`needs_rehash`].
//!
//! Anything else in the `password_hash` column is rejected as invalid
//! credentials until the offline migration rewrites it.
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::config::{parse_var, ConfigError, EnvLookup};

/// Default Argon2 time cost (iterations).
pub const DEFAULT_HASH_COST: u32 = 2;
/// Default Argon2 memory cost in KiB.
pub const DEFAULT_HASH_MEMORY_KIB: u32 = 19_456;
/// Minimum length for admin-managed passwords.
pub const MIN_PASSWORD_LENGTH: usize = 8;

const HASH_PARALLELISM: u32 = 1;
const HASH_OUTPUT_LEN: usize = 32;
/// B64 length of a 16-byte salt.
const SALT_B64_LEN: usize = 22;
const RECOGNIZED_PREFIX: &str = "$argon2id$v=19$";
const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];
const BCRYPT_HASH_LEN: usize = 60;

/// Adaptive hash encodings accepted in the `password_hash` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashScheme {
    /// The encoding this service writes.
    Argon2id,
    /// Written by older deployments. Verified, then replaced on login.
    Bcrypt,
}

/// Failure to verify a stored hash (as opposed to a wrong password).
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("argon2: {0}")]
    Argon2(argon2::password_hash::Error),

    #[error("bcrypt: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

impl From<argon2::password_hash::Error> for PasswordError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::Argon2(err)
    }
}

/// Work factor for newly created hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordConfig {
    /// Argon2 time cost.
    pub cost: u32,
    /// Argon2 memory cost in KiB.
    pub memory_kib: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            cost: DEFAULT_HASH_COST,
            memory_kib: DEFAULT_HASH_MEMORY_KIB,
        }
    }
}

impl PasswordConfig {
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `PASSWORD_HASH_COST`       | `2`     |
    /// | `PASSWORD_HASH_MEMORY_KIB` | `19456` |
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let config = Self {
            cost: parse_var(lookup, "PASSWORD_HASH_COST", DEFAULT_HASH_COST)?,
            memory_kib: parse_var(lookup, "PASSWORD_HASH_MEMORY_KIB", DEFAULT_HASH_MEMORY_KIB)?,
        };

        // Reject values Argon2 itself would refuse at hash time.
        if let Err(err) = config.hasher() {
            return Err(ConfigError::Invalid {
                key: "PASSWORD_HASH_COST",
                value: format!("cost={} memory_kib={} ({err})", config.cost, config.memory_kib),
            });
        }
        Ok(config)
    }

    fn hasher(&self) -> Result<Argon2<'static>, argon2::Error> {
        let params = Params::new(
            self.memory_kib,
            self.cost,
            HASH_PARALLELISM,
            Some(HASH_OUTPUT_LEN),
        )?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash a plaintext password using Argon2id with a random salt.
///
/// Returns the PHC-formatted hash string.
pub fn hash_password(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = config
        .hasher()?
        .hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored hash.
///
/// Returns `Ok(true)` if the password matches, `Ok(false)` if it does not.
/// bcrypt hashes go to the bcrypt verifier; everything else is parsed as a
/// PHC string. Parameters are read back from the hash, so hashes made at an
/// older cost still verify.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    if is_bcrypt(hash) {
        return Ok(bcrypt::verify(password, hash)?);
    }

    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// The scheme of `encoded`, if it is an accepted adaptive hash.
pub fn recognized_scheme(encoded: &str) -> Option<HashScheme> {
    if is_bcrypt(encoded) {
        Some(HashScheme::Bcrypt)
    } else if is_argon2id(encoded) {
        Some(HashScheme::Argon2id)
    } else {
        None
    }
}

/// Whether `encoded` is an accepted adaptive hash.
///
/// ```
/// use proposta_api::auth::password::is_recognized_format;
///
/// assert!(!is_recognized_format("hunter2"));
/// assert!(!is_recognized_format("$2b$10$abcdefghijklmnopqrstuu"));
/// assert!(is_recognized_format(
///     "$2b$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy"
/// ));
/// ```
pub fn is_recognized_format(encoded: &str) -> bool {
    recognized_scheme(encoded).is_some()
}

/// Whether a verified hash should be replaced with a fresh Argon2id hash.
pub fn needs_rehash(encoded: &str) -> bool {
    recognized_scheme(encoded) == Some(HashScheme::Bcrypt)
}

fn is_bcrypt(encoded: &str) -> bool {
    encoded.len() == BCRYPT_HASH_LEN
        && BCRYPT_PREFIXES
            .iter()
            .any(|prefix| encoded.starts_with(prefix))
}

/// Argon2id v19, a 16-byte salt and a 32-byte output.
fn is_argon2id(encoded: &str) -> bool {
    if !encoded.starts_with(RECOGNIZED_PREFIX) {
        return false;
    }
    let Ok(parsed) = PasswordHash::new(encoded) else {
        return false;
    };

    let salt_ok = parsed
        .salt
        .is_some_and(|salt| salt.as_str().len() == SALT_B64_LEN);
    let output_ok = parsed
        .hash
        .is_some_and(|output| output.len() == HASH_OUTPUT_LEN);
    salt_ok && output_ok
}

/// Validate that a password meets minimum strength requirements.
///
/// Currently enforces a minimum character length. Returns `Ok(())` when the
/// password is acceptable, or `Err` with a human-readable explanation.
pub fn validate_password_strength(password: &str, min_length: usize) -> Result<(), String> {
    if password.chars().count() < min_length {
        return Err(format!(
            "Password must be at least {min_length} characters long"
        ));
    }
    Ok(())
}
