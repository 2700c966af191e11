//! Domain layer - Core business logic and entities

pub mod error;
pub mod user;

pub use error::DomainError;
pub use user::{
    normalize, validate, validate_record, Field, FieldError, NormalizedRecord, User, UserDraft,
    UserId, UserRepository, ValidUserRecord, ValidationErrors,
};
