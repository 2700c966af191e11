//! User repository trait

use async_trait::async_trait;
use std::fmt::Debug;

#[cfg(test)]
use mockall::automock;

use super::entity::{User, UserId};
use crate::domain::DomainError;

/// Storage boundary for user records
///
/// Implementations own cross-record uniqueness: a write that would give two
/// users the same email or phone fails with `DomainError::DuplicateKey`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepository: Send + Sync + Debug {
    /// Get a user by their ID
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError>;

    /// Get a user by email address
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;

    /// Get a user by phone number
    async fn get_by_phone(&self, phone: &str) -> Result<Option<User>, DomainError>;

    /// Insert a new user, stamping `created_at` and `updated_at`
    async fn create(&self, user: User) -> Result<User, DomainError>;

    /// Replace an existing user, keeping `created_at` and refreshing `updated_at`
    ///
    /// The write only applies if the stored row still has `user.version()`;
    /// otherwise it fails with `DomainError::Conflict` and nothing changes.
    async fn update(&self, user: &User) -> Result<User, DomainError>;

    /// List all users, oldest first
    async fn list(&self) -> Result<Vec<User>, DomainError>;

    /// Count users
    async fn count(&self) -> Result<usize, DomainError>;
}
