//! Password hashing with Argon2id

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use std::fmt::Debug;

use crate::config::PasswordConfig;
use crate::domain::DomainError;

/// Hashing seam for stored user credentials
///
/// Callers validate the raw password before it reaches the hasher.
pub trait PasswordHasher: Send + Sync + Debug {
    /// Produce a salted PHC string for `password`
    fn hash(&self, password: &str) -> Result<String, DomainError>;

    /// Check `password` against a stored PHC string; malformed hashes never match
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id hasher with configurable cost parameters
///
/// New hashes use the configured costs. Verification reads the costs embedded
/// in the stored hash, so records hashed under older settings keep working.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Hasher with the argon2 crate's recommended costs
    pub fn new() -> Self {
        Self::default()
    }

    /// Hasher with explicit costs: memory in KiB, iterations, lanes
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, DomainError> {
        let params = Params::new(memory_kib, iterations, parallelism, None).map_err(|e| {
            DomainError::configuration(format!("Invalid password hashing parameters: {}", e))
        })?;

        Ok(Self { params })
    }

    pub fn from_config(config: &PasswordConfig) -> Result<Self, DomainError> {
        Self::with_params(config.memory_kib, config.iterations, config.parallelism)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, DomainError> {
        use argon2::password_hash::PasswordHasher as _;

        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| DomainError::internal(format!("Failed to hash password: {}", e)))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return false;
        };

        self.argon2()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
