//! User domain
//!
//! This module provides the user entity, the record validator and the
//! repository trait the storage layer implements.

mod entity;
mod repository;
mod validation;

pub use entity::{OtpCheck, User, UserId};
pub use repository::UserRepository;
pub use validation::{
    normalize, validate, validate_email, validate_password, validate_phone, validate_record,
    validate_username, Field, FieldError, NormalizedRecord, UserDraft, ValidUserRecord,
    ValidationErrors, MIN_PASSWORD_LENGTH,
};

#[cfg(test)]
pub use repository::MockUserRepository;
