//! User entity and related types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::ValidUserRecord;
use crate::domain::DomainError;

/// User identifier (UUID v4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier from its string form
    pub fn parse(id: &str) -> Result<Self, DomainError> {
        Uuid::parse_str(id)
            .map(Self)
            .map_err(|e| DomainError::validation(format!("Invalid user ID '{}': {}", id, e)))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of checking a one-time password
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    /// Code matched and is within its lifetime
    Valid,
    /// Code matched but was issued too long ago
    Expired,
    /// Code does not match the issued one
    Mismatch,
    /// No code is currently issued
    NotIssued,
}

/// Stored user entity
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: UserId,
    username: String,
    email: String,
    phone: String,
    /// Argon2 password hash - never exposed in serialization
    #[serde(skip_serializing)]
    password_hash: String,
    is_admin: bool,
    reward_points: i64,
    #[serde(skip_serializing)]
    otp: Option<String>,
    otp_created_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Optimistic lock; bumped by the repository on every successful update
    #[serde(skip_serializing)]
    version: i64,
}

impl User {
    /// Create a user from a validated record and an already hashed password
    pub fn new(id: UserId, record: ValidUserRecord, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();

        Self {
            id,
            username: record.username,
            email: record.email,
            phone: record.phone,
            password_hash: password_hash.into(),
            is_admin: record.is_admin,
            reward_points: record.reward_points,
            otp: record.otp,
            otp_created_at: record.otp_created_at,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Rebuild a user from persisted columns
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: UserId,
        username: String,
        email: String,
        phone: String,
        password_hash: String,
        is_admin: bool,
        reward_points: i64,
        otp: Option<String>,
        otp_created_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        version: i64,
    ) -> Self {
        Self {
            id,
            username,
            email,
            phone,
            password_hash,
            is_admin,
            reward_points,
            otp,
            otp_created_at,
            created_at,
            updated_at,
            version,
        }
    }

    // Getters

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn reward_points(&self) -> i64 {
        self.reward_points
    }

    pub fn otp(&self) -> Option<&str> {
        self.otp.as_deref()
    }

    pub fn otp_created_at(&self) -> Option<DateTime<Utc>> {
        self.otp_created_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Version of the stored row this copy was read from
    pub fn version(&self) -> i64 {
        self.version
    }

    // OTP

    /// Store a freshly issued code together with its issue time
    pub fn issue_otp(&mut self, code: impl Into<String>) {
        let now = Utc::now();
        self.otp = Some(code.into());
        self.otp_created_at = Some(now);
        self.updated_at = now;
    }

    /// Remove any issued code
    pub fn clear_otp(&mut self) {
        self.otp = None;
        self.otp_created_at = None;
        self.touch();
    }

    /// Compare `code` with the issued one
    ///
    /// A code without an issue time cannot be aged and counts as expired.
    pub fn check_otp(&self, code: &str, ttl: Duration, now: DateTime<Utc>) -> OtpCheck {
        let Some(issued) = self.otp.as_deref() else {
            return OtpCheck::NotIssued;
        };

        if !constant_time_eq(issued, code) {
            return OtpCheck::Mismatch;
        }

        match self.otp_created_at {
            Some(created) if now - created <= ttl => OtpCheck::Valid,
            _ => OtpCheck::Expired,
        }
    }

    // Mutators

    /// Add (or subtract, when negative) reward points
    pub fn add_reward_points(&mut self, delta: i64) -> Result<i64, DomainError> {
        let total = self
            .reward_points
            .checked_add(delta)
            .filter(|total| *total >= 0)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "Reward points cannot go below zero (have {}, change {})",
                    self.reward_points, delta
                ))
            })?;

        self.reward_points = total;
        self.touch();
        Ok(total)
    }

    /// Spend reward points
    pub fn redeem_reward_points(&mut self, points: i64) -> Result<i64, DomainError> {
        if points <= 0 {
            return Err(DomainError::validation(
                "Points to redeem must be positive",
            ));
        }

        self.add_reward_points(-points)
    }

    /// Grant or revoke admin rights
    pub fn set_admin(&mut self, is_admin: bool) {
        self.is_admin = is_admin;
        self.touch();
    }

    /// Update the password hash
    pub fn set_password_hash(&mut self, password_hash: impl Into<String>) {
        self.password_hash = password_hash.into();
        self.touch();
    }

    /// Stamp both timestamps on first write
    pub(crate) fn stamp_created(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
        self.updated_at = at;
        self.version = 0;
    }

    /// Carry over the creation time of the stored row, refresh `updated_at`
    /// and move to the next version
    pub(crate) fn stamp_updated(&mut self, created_at: DateTime<Utc>, at: DateTime<Utc>) {
        self.created_at = created_at;
        self.updated_at = at.max(self.updated_at);
        self.version += 1;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_user(username: &str) -> User {
        let record = ValidUserRecord {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            phone: "+14155551234".to_string(),
            password: "secret1".to_string(),
            is_admin: false,
            reward_points: 0,
            otp: None,
            otp_created_at: None,
        };

        User::new(UserId::generate(), record, "hashed_password")
    }

    #[test]
    fn test_user_id_parse() {
        let id = UserId::generate();
        let parsed = UserId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);

        assert!(UserId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_user_creation() {
        let user = create_test_user("alice");

        assert_eq!(user.username(), "alice");
        assert_eq!(user.email(), "alice@example.com");
        assert_eq!(user.password_hash(), "hashed_password");
        assert!(!user.is_admin());
        assert_eq!(user.reward_points(), 0);
        assert!(user.otp().is_none());
        assert_eq!(user.created_at(), user.updated_at());
    }

    #[test]
    fn test_serialization_hides_secrets() {
        let mut user = create_test_user("alice");
        user.issue_otp("424242");

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("otp").is_none());
        assert!(json.get("otpCreatedAt").is_some());
        assert_eq!(json["rewardPoints"], 0);
        assert_eq!(json["isAdmin"], false);
    }

    #[test]
    fn test_issue_and_clear_otp() {
        let mut user = create_test_user("alice");

        user.issue_otp("123456");
        assert_eq!(user.otp(), Some("123456"));
        assert!(user.otp_created_at().is_some());

        user.clear_otp();
        assert!(user.otp().is_none());
        assert!(user.otp_created_at().is_none());
    }

    #[test]
    fn test_check_otp() {
        let mut user = create_test_user("alice");
        let ttl = Duration::minutes(5);

        assert_eq!(user.check_otp("123456", ttl, Utc::now()), OtpCheck::NotIssued);

        user.issue_otp("123456");
        let issued_at = user.otp_created_at().unwrap();

        assert_eq!(user.check_otp("123456", ttl, issued_at), OtpCheck::Valid);
        assert_eq!(user.check_otp("654321", ttl, issued_at), OtpCheck::Mismatch);
        assert_eq!(
            user.check_otp("123456", ttl, issued_at + Duration::minutes(6)),
            OtpCheck::Expired
        );
    }

    #[test]
    fn test_check_otp_without_timestamp_is_expired() {
        let record = ValidUserRecord {
            username: "bob".to_string(),
            email: "bob@example.com".to_string(),
            phone: "4155551234".to_string(),
            password: "secret1".to_string(),
            is_admin: false,
            reward_points: 0,
            otp: Some("111111".to_string()),
            otp_created_at: None,
        };
        let user = User::new(UserId::generate(), record, "hash");

        assert_eq!(
            user.check_otp("111111", Duration::minutes(5), Utc::now()),
            OtpCheck::Expired
        );
    }

    #[test]
    fn test_reward_points() {
        let mut user = create_test_user("alice");

        assert_eq!(user.add_reward_points(50).unwrap(), 50);
        assert_eq!(user.redeem_reward_points(20).unwrap(), 30);
        assert!(user.redeem_reward_points(31).is_err());
        assert!(user.redeem_reward_points(0).is_err());
        assert_eq!(user.reward_points(), 30);
    }

    #[test]
    fn test_mutation_refreshes_updated_at() {
        let mut user = create_test_user("alice");
        let created = user.created_at();

        // Small delay to ensure timestamp differs
        std::thread::sleep(std::time::Duration::from_millis(10));

        user.set_admin(true);
        assert!(user.is_admin());
        assert!(user.updated_at() > created);
        assert_eq!(user.created_at(), created);
    }

    #[test]
    fn test_stamps_track_version() {
        let mut user = create_test_user("alice");
        let now = Utc::now();

        user.stamp_created(now);
        assert_eq!(user.version(), 0);

        user.stamp_updated(now, now);
        user.stamp_updated(now, now);
        assert_eq!(user.version(), 2);

        // Local mutators leave the version to storage
        user.set_admin(true);
        assert_eq!(user.version(), 2);
    }
}
