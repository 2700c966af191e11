//! User service: registration and record mutations

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::domain::user::{
    validate_password, validate_record, OtpCheck, User, UserDraft, UserId, UserRepository,
};
use crate::domain::DomainError;

use super::otp::OtpGenerator;
use super::password::PasswordHasher;

/// Default lifetime of an issued OTP
pub const DEFAULT_OTP_TTL_SECONDS: i64 = 300;

/// Read-modify-write attempts before a contended update gives up
const MAX_UPDATE_ATTEMPTS: u32 = 32;

/// User service tying validation, hashing and storage together
#[derive(Debug)]
pub struct UserService<R: UserRepository + ?Sized, H: PasswordHasher> {
    repository: Arc<R>,
    hasher: Arc<H>,
    otp_generator: OtpGenerator,
    otp_ttl: Duration,
}

impl<R: UserRepository + ?Sized, H: PasswordHasher> UserService<R, H> {
    /// Create a new user service
    pub fn new(repository: Arc<R>, hasher: Arc<H>) -> Self {
        Self {
            repository,
            hasher,
            otp_generator: OtpGenerator::default(),
            otp_ttl: Duration::seconds(DEFAULT_OTP_TTL_SECONDS),
        }
    }

    /// Override how OTPs are generated and how long they stay valid
    pub fn with_otp(mut self, generator: OtpGenerator, ttl: Duration) -> Self {
        self.otp_generator = generator;
        self.otp_ttl = ttl;
        self
    }

    /// Validate a candidate record and persist it
    ///
    /// Every field failure is reported at once as `DomainError::InvalidRecord`.
    /// Email or phone collisions come back from storage as `DomainError::DuplicateKey`.
    pub async fn register(&self, draft: UserDraft) -> Result<User, DomainError> {
        let record = validate_record(draft).map_err(|errors| {
            debug!(failures = errors.len(), "Rejected invalid user record");
            DomainError::from(errors)
        })?;

        let password_hash = self.hasher.hash(&record.password)?;
        let user = User::new(UserId::generate(), record, password_hash);

        let stored = self.repository.create(user).await?;
        info!(user_id = %stored.id(), "Registered user");

        Ok(stored)
    }

    /// Get a user by ID
    pub async fn get(&self, id: &UserId) -> Result<User, DomainError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("User '{}' not found", id)))
    }

    /// Get a user by email address
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        self.repository.get_by_email(email).await
    }

    /// Get a user by phone number
    pub async fn get_by_phone(&self, phone: &str) -> Result<Option<User>, DomainError> {
        self.repository.get_by_phone(phone).await
    }

    /// List all users
    pub async fn list(&self) -> Result<Vec<User>, DomainError> {
        self.repository.list().await
    }

    /// Count users
    pub async fn count(&self) -> Result<usize, DomainError> {
        self.repository.count().await
    }

    /// Issue a new OTP, replacing any previous one, and return the code
    pub async fn issue_otp(&self, id: &UserId) -> Result<String, DomainError> {
        let code = self.otp_generator.generate();

        self.modify(id, |user| {
            user.issue_otp(code.clone());
            Ok(Mutation::Write(()))
        })
        .await?;

        debug!(user_id = %id, "Issued OTP");
        Ok(code)
    }

    /// Check a submitted OTP
    ///
    /// A matching, unexpired code is consumed, so concurrent checks of one code
    /// succeed at most once. Expired codes are cleared as well.
    pub async fn verify_otp(&self, id: &UserId, code: &str) -> Result<bool, DomainError> {
        let ttl = self.otp_ttl;

        let (_, accepted) = self
            .modify(id, |user| match user.check_otp(code, ttl, Utc::now()) {
                OtpCheck::Valid => {
                    user.clear_otp();
                    Ok(Mutation::Write(true))
                }
                OtpCheck::Expired => {
                    warn!(user_id = %id, "OTP expired");
                    user.clear_otp();
                    Ok(Mutation::Write(false))
                }
                OtpCheck::Mismatch | OtpCheck::NotIssued => Ok(Mutation::Skip(false)),
            })
            .await?;

        Ok(accepted)
    }

    /// Credit reward points
    pub async fn add_reward_points(&self, id: &UserId, points: i64) -> Result<User, DomainError> {
        let (user, _) = self
            .modify(id, |user| user.add_reward_points(points).map(Mutation::Write))
            .await?;
        Ok(user)
    }

    /// Spend reward points; fails without changes if the balance is too low
    pub async fn redeem_reward_points(
        &self,
        id: &UserId,
        points: i64,
    ) -> Result<User, DomainError> {
        let (user, _) = self
            .modify(id, |user| user.redeem_reward_points(points).map(Mutation::Write))
            .await?;
        Ok(user)
    }

    /// Grant or revoke admin rights
    pub async fn set_admin(&self, id: &UserId, is_admin: bool) -> Result<User, DomainError> {
        let (stored, _) = self
            .modify(id, |user| {
                user.set_admin(is_admin);
                Ok(Mutation::Write(()))
            })
            .await?;

        info!(user_id = %id, is_admin, "Changed admin flag");
        Ok(stored)
    }

    /// Replace a user's password after checking the current one
    pub async fn change_password(
        &self,
        id: &UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<User, DomainError> {
        validate_password(new_password).map_err(|e| DomainError::validation(e.to_string()))?;
        let new_hash = self.hasher.hash(new_password)?;

        let (stored, _) = self
            .modify(id, |user| {
                if !self.hasher.verify(current_password, user.password_hash()) {
                    return Err(DomainError::validation("Current password is incorrect"));
                }

                user.set_password_hash(new_hash.clone());
                Ok(Mutation::Write(()))
            })
            .await?;

        Ok(stored)
    }

    /// Read, change and write back one user, re-reading after a concurrent write
    ///
    /// `apply` runs against a fresh copy on every attempt. Errors it returns
    /// abort without writing. Returns the stored user and `apply`'s value.
    async fn modify<T, F>(&self, id: &UserId, mut apply: F) -> Result<(User, T), DomainError>
    where
        F: FnMut(&mut User) -> Result<Mutation<T>, DomainError> + Send,
        T: Send,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let mut user = self.get(id).await?;

            let value = match apply(&mut user)? {
                Mutation::Write(value) => value,
                Mutation::Skip(value) => return Ok((user, value)),
            };

            match self.repository.update(&user).await {
                Ok(stored) => return Ok((stored, value)),
                Err(DomainError::Conflict { .. }) => {
                    debug!(user_id = %id, attempt, "Concurrent user update, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(DomainError::conflict(format!(
            "User '{}' kept changing; gave up after {} attempts",
            id, MAX_UPDATE_ATTEMPTS
        )))
    }
}

/// Outcome of a change applied inside `UserService::modify`
enum Mutation<T> {
    /// Persist the changed user
    Write(T),
    /// Leave storage untouched
    Skip(T),
}
