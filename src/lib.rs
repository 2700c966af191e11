//! user-registry
//!
//! Validated user records with:
//! - Field normalization and shape checks (email, phone, password length)
//! - Email/phone uniqueness delegated to the storage backend
//! - In-memory and PostgreSQL storage
//! - OTP issuance and reward point bookkeeping

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{
    normalize, validate, validate_record, DomainError, NormalizedRecord, User, UserDraft,
    ValidUserRecord, ValidationErrors,
};
