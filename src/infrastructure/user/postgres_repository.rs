//! PostgreSQL user repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::domain::user::{Field, User, UserId, UserRepository};
use crate::domain::DomainError;

const USER_COLUMNS: &str = "id, username, email, phone, password_hash, is_admin, reward_points, \
                            otp, otp_created_at, created_at, updated_at, version";

/// PostgreSQL implementation of UserRepository
///
/// Email and phone uniqueness come from the `users_email_key` and
/// `users_phone_key` unique indexes created by the user migrations.
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE {} = $1",
            USER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get user by {}: {}", column, e)))?;

        row.as_ref().map(row_to_user).transpose()
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get user: {}", e)))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        self.fetch_one_by("email", email).await
    }

    async fn get_by_phone(&self, phone: &str) -> Result<Option<User>, DomainError> {
        self.fetch_one_by("phone", phone).await
    }

    async fn create(&self, mut user: User) -> Result<User, DomainError> {
        user.stamp_created(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, phone, password_hash, is_admin,
                               reward_points, otp, otp_created_at, created_at, updated_at,
                               version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.username())
        .bind(user.email())
        .bind(user.phone())
        .bind(user.password_hash())
        .bind(user.is_admin())
        .bind(user.reward_points())
        .bind(user.otp())
        .bind(user.otp_created_at())
        .bind(user.created_at())
        .bind(user.updated_at())
        .bind(user.version())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "create"))?;

        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, DomainError> {
        let now = Utc::now();

        let created_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET username = $2, email = $3, phone = $4, password_hash = $5, is_admin = $6,
                reward_points = $7, otp = $8, otp_created_at = $9, updated_at = $10,
                version = version + 1
            WHERE id = $1 AND version = $11
            RETURNING created_at
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.username())
        .bind(user.email())
        .bind(user.phone())
        .bind(user.password_hash())
        .bind(user.is_admin())
        .bind(user.reward_points())
        .bind(user.otp())
        .bind(user.otp_created_at())
        .bind(now)
        .bind(user.version())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error(e, "update"))?;

        let Some(created_at) = created_at else {
            // No row matched: either the user is gone or its version moved on
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                    .bind(user.id().as_uuid())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| DomainError::storage(format!("Failed to get user: {}", e)))?;

            return Err(if exists {
                DomainError::conflict(format!(
                    "User '{}' was modified concurrently (version {} is stale)",
                    user.id(),
                    user.version()
                ))
            } else {
                DomainError::not_found(format!("User '{}' not found", user.id()))
            });
        };

        let mut stored = user.clone();
        stored.stamp_updated(created_at, now);
        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<User>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users ORDER BY created_at",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list users: {}", e)))?;

        rows.iter().map(row_to_user).collect()
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count users: {}", e)))?;

        Ok(count as usize)
    }
}

/// Map a failed write, turning unique index violations into `DuplicateKey`
fn write_error(error: sqlx::Error, action: &str) -> DomainError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.is_unique_violation() {
            return match db_error.constraint().and_then(constraint_field) {
                Some(field) => DomainError::duplicate_key(field.as_str()),
                None => DomainError::conflict(format!("User already exists: {}", db_error)),
            };
        }
    }

    DomainError::storage(format!("Failed to {} user: {}", action, error))
}

fn constraint_field(constraint: &str) -> Option<Field> {
    if constraint.contains("email") {
        Some(Field::Email)
    } else if constraint.contains("phone") {
        Some(Field::Phone)
    } else {
        None
    }
}

fn row_to_user(row: &sqlx::postgres::PgRow) -> Result<User, DomainError> {
    let read = |e: sqlx::Error| DomainError::storage(format!("Invalid user row: {}", e));

    Ok(User::from_parts(
        UserId::from(row.try_get::<uuid::Uuid, _>("id").map_err(read)?),
        row.try_get("username").map_err(read)?,
        row.try_get("email").map_err(read)?,
        row.try_get("phone").map_err(read)?,
        row.try_get("password_hash").map_err(read)?,
        row.try_get("is_admin").map_err(read)?,
        row.try_get("reward_points").map_err(read)?,
        row.try_get("otp").map_err(read)?,
        row.try_get("otp_created_at").map_err(read)?,
        row.try_get("created_at").map_err(read)?,
        row.try_get("updated_at").map_err(read)?,
        row.try_get("version").map_err(read)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_field() {
        assert_eq!(constraint_field("users_email_key"), Some(Field::Email));
        assert_eq!(constraint_field("users_phone_key"), Some(Field::Phone));
        assert_eq!(constraint_field("users_pkey"), None);
    }

    #[test]
    fn test_write_error_non_database() {
        let err = write_error(sqlx::Error::RowNotFound, "create");
        assert!(matches!(err, DomainError::Storage { .. }));
    }
}
