//! User record normalization and validation

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Loose email shape: word runs joined by `.` or `-`, an `@`, the same
/// grammar again, then one or more `.xx`/`.xxx` suffixes. `\w` is ASCII only.
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*@[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*(\.[A-Za-z0-9_]{2,3})+$",
    )
    .unwrap()
});

static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]{10,15}$").unwrap());

/// Validated fields of a user record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Username,
    Email,
    Phone,
    Password,
}

impl Field {
    /// Storage/wire name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Password => "password",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Username => "Username",
            Self::Email => "Email",
            Self::Phone => "Phone number",
            Self::Password => "Password",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email address",
            Self::Phone => "phone number",
            Self::Password => "password",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-level validation failure
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum FieldError {
    #[error("{} is required", .field.label())]
    MissingField { field: Field },

    #[error("{value} is not a valid {}!", .field.description())]
    InvalidFormat { field: Field, value: String },

    #[error("{} must be at least {minimum} characters long", .field.label())]
    TooShort { field: Field, minimum: usize },
}

impl FieldError {
    /// The field this failure refers to
    pub fn field(&self) -> Field {
        match self {
            Self::MissingField { field }
            | Self::InvalidFormat { field, .. }
            | Self::TooShort { field, .. } => *field,
        }
    }
}

/// Every failure found in one record, in field order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check whether any failure refers to `field`
    pub fn has_field(&self, field: Field) -> bool {
        self.0.iter().any(|e| e.field() == field)
    }

    pub fn into_inner(self) -> Vec<FieldError> {
        self.0
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Candidate user record as supplied by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDraft {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub is_admin: Option<bool>,
    pub reward_points: Option<i64>,
    pub otp: Option<String>,
    pub otp_created_at: Option<DateTime<Utc>>,
}

/// A draft with the username trimmed and defaults applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub is_admin: bool,
    pub reward_points: i64,
    pub otp: Option<String>,
    pub otp_created_at: Option<DateTime<Utc>>,
}

impl From<NormalizedRecord> for UserDraft {
    fn from(record: NormalizedRecord) -> Self {
        Self {
            username: record.username,
            email: record.email,
            phone: record.phone,
            password: record.password,
            is_admin: Some(record.is_admin),
            reward_points: Some(record.reward_points),
            otp: record.otp,
            otp_created_at: record.otp_created_at,
        }
    }
}

/// A record that passed every field rule and may be persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidUserRecord {
    pub username: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub is_admin: bool,
    pub reward_points: i64,
    pub otp: Option<String>,
    pub otp_created_at: Option<DateTime<Utc>>,
}

/// Trim the username and fill in defaults for omitted optional fields
pub fn normalize(raw: UserDraft) -> NormalizedRecord {
    NormalizedRecord {
        username: raw.username.map(|u| u.trim().to_string()),
        email: raw.email,
        phone: raw.phone,
        password: raw.password,
        is_admin: raw.is_admin.unwrap_or(false),
        reward_points: raw.reward_points.unwrap_or(0),
        otp: raw.otp,
        otp_created_at: raw.otp_created_at,
    }
}

/// Check every field rule, collecting all failures
pub fn validate(record: NormalizedRecord) -> Result<ValidUserRecord, ValidationErrors> {
    let username = accept(Field::Username, record.username, validate_username);
    let email = accept(Field::Email, record.email, validate_email);
    let phone = accept(Field::Phone, record.phone, validate_phone);
    let password = accept(Field::Password, record.password, validate_password);

    match (username, email, phone, password) {
        (Ok(username), Ok(email), Ok(phone), Ok(password)) => Ok(ValidUserRecord {
            username,
            email,
            phone,
            password,
            is_admin: record.is_admin,
            reward_points: record.reward_points,
            otp: record.otp,
            otp_created_at: record.otp_created_at,
        }),
        (username, email, phone, password) => Err(ValidationErrors::new(
            [username.err(), email.err(), phone.err(), password.err()]
                .into_iter()
                .flatten()
                .collect(),
        )),
    }
}

/// Normalize then validate a raw draft
pub fn validate_record(raw: UserDraft) -> Result<ValidUserRecord, ValidationErrors> {
    validate(normalize(raw))
}

fn accept(
    field: Field,
    value: Option<String>,
    rule: fn(&str) -> Result<(), FieldError>,
) -> Result<String, FieldError> {
    // An empty string counts as absent for every required field
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or(FieldError::MissingField { field })?;
    rule(&value)?;
    Ok(value)
}

/// Validate a username
///
/// Rules:
/// - Must contain something other than whitespace
pub fn validate_username(username: &str) -> Result<(), FieldError> {
    if username.trim().is_empty() {
        return Err(FieldError::MissingField {
            field: Field::Username,
        });
    }

    Ok(())
}

/// Validate the shape of an email address
///
/// This is a loose check and accepts some addresses RFC 5322 would not.
pub fn validate_email(email: &str) -> Result<(), FieldError> {
    if !EMAIL_PATTERN.is_match(email) {
        return Err(FieldError::InvalidFormat {
            field: Field::Email,
            value: email.to_string(),
        });
    }

    Ok(())
}

/// Validate a phone number
///
/// Rules:
/// - Optional leading `+`
/// - 10 to 15 decimal digits, nothing else
pub fn validate_phone(phone: &str) -> Result<(), FieldError> {
    if !PHONE_PATTERN.is_match(phone) {
        return Err(FieldError::InvalidFormat {
            field: Field::Phone,
            value: phone.to_string(),
        });
    }

    Ok(())
}

/// Validate a raw (unhashed) password
///
/// Rules:
/// - Minimum 6 characters, any content
pub fn validate_password(password: &str) -> Result<(), FieldError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(FieldError::TooShort {
            field: Field::Password,
            minimum: MIN_PASSWORD_LENGTH,
        });
    }

    Ok(())
}
