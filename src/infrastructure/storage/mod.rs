//! Storage infrastructure - runtime selection of the user store

pub mod migrations;

use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::config::StorageConfig;
use crate::domain::user::UserRepository;
use crate::domain::DomainError;
use crate::infrastructure::user::{InMemoryUserRepository, PostgresUserRepository};

pub use migrations::{run_user_migrations, Migration, PostgresMigrator};

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    InMemory,
    /// PostgreSQL storage
    Postgres,
}

impl FromStr for StorageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(DomainError::configuration(format!(
                "Unknown storage backend '{}'",
                other
            ))),
        }
    }
}

/// Build the user repository selected by configuration
///
/// The postgres backend connects, applies pending migrations, and fails if no
/// database URL is configured.
pub async fn create_user_repository(
    config: &StorageConfig,
) -> Result<Arc<dyn UserRepository>, DomainError> {
    match config.backend.parse::<StorageType>()? {
        StorageType::InMemory => {
            info!("Using in-memory user storage");
            Ok(Arc::new(InMemoryUserRepository::new()))
        }
        StorageType::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                DomainError::configuration("storage.database_url is required for postgres")
            })?;

            info!("Connecting to PostgreSQL...");
            let pool = sqlx::PgPool::connect(url).await.map_err(|e| {
                DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e))
            })?;

            run_user_migrations(&pool).await?;
            info!("PostgreSQL user storage ready");

            Ok(Arc::new(PostgresUserRepository::new(pool)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_parsing() {
        assert_eq!("memory".parse::<StorageType>().unwrap(), StorageType::InMemory);
        assert_eq!("In-Memory".parse::<StorageType>().unwrap(), StorageType::InMemory);
        assert_eq!("postgresql".parse::<StorageType>().unwrap(), StorageType::Postgres);
        assert!("mongo".parse::<StorageType>().is_err());
    }

    #[tokio::test]
    async fn test_create_in_memory_repository() {
        let config = StorageConfig::default();

        let repository = create_user_repository(&config).await.unwrap();
        assert_eq!(repository.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_postgres_requires_url() {
        let config = StorageConfig {
            backend: "postgres".to_string(),
            database_url: None,
        };

        let err = create_user_repository(&config).await.unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }
}
