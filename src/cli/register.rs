//! Register command - validates, hashes and stores a record

use std::sync::Arc;

use tracing::warn;

use crate::config::AppConfig;
use crate::domain::user::{User, UserRepository};
use crate::domain::DomainError;
use crate::infrastructure::storage::{create_user_repository, StorageType};
use crate::infrastructure::user::{Argon2Hasher, OtpGenerator, UserService};

use super::{RecordArgs, Report};

/// Register one record against the configured backend; returns whether it was stored
pub async fn run(args: RecordArgs, config: &AppConfig) -> anyhow::Result<bool> {
    let draft = args.read_draft()?;
    let service = build_service(config).await?;

    let report: Report<User> = match service.register(draft).await {
        Ok(user) => Report::Valid { record: user },
        Err(DomainError::InvalidRecord(errors)) => Report::invalid(errors),
        Err(DomainError::DuplicateKey { field }) => Report::Duplicate { field },
        Err(e) => return Err(e.into()),
    };

    report.print()?;
    Ok(report.is_valid())
}

/// Check the OTP and hashing settings, then open the configured store
async fn build_service(
    config: &AppConfig,
) -> Result<UserService<dyn UserRepository, Argon2Hasher>, DomainError> {
    let otp_length = config.otp.checked_length()?;
    let otp_ttl = config.otp.ttl()?;
    let hasher = Argon2Hasher::from_config(&config.password)?;

    if is_ephemeral(config)? {
        warn!(
            "Storage backend is in-memory: the record is checked for uniqueness against an \
             empty store and discarded on exit. Set storage.backend = \"postgres\" to keep it"
        );
    }

    let repository = create_user_repository(&config.storage).await?;

    Ok(UserService::new(repository, Arc::new(hasher))
        .with_otp(OtpGenerator::new(otp_length), otp_ttl))
}

/// Whether registered records vanish when the process exits
fn is_ephemeral(config: &AppConfig) -> Result<bool, DomainError> {
    Ok(config.storage.backend.parse::<StorageType>()? == StorageType::InMemory)
}
