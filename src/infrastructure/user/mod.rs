//! User infrastructure module
//!
//! Storage implementations of `UserRepository`, password hashing with Argon2,
//! OTP generation, and the user service.

mod otp;
mod password;
mod postgres_repository;
mod repository;
mod service;

pub use otp::OtpGenerator;
pub use password::{Argon2Hasher, PasswordHasher};
pub use postgres_repository::PostgresUserRepository;
pub use repository::InMemoryUserRepository;
pub use service::{UserService, DEFAULT_OTP_TTL_SECONDS};
