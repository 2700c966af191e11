//! In-memory user repository implementation

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::user::{Field, User, UserId, UserRepository};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct UserTables {
    users: HashMap<UserId, User>,
    /// Unique index: email -> user ID
    email_index: HashMap<String, UserId>,
    /// Unique index: phone -> user ID
    phone_index: HashMap<String, UserId>,
}

impl UserTables {
    /// Find the first unique field `user` would collide on
    fn collision(&self, user: &User) -> Option<Field> {
        let taken_by_other = |index: &HashMap<String, UserId>, key: &str| {
            index.get(key).is_some_and(|owner| owner != user.id())
        };

        if taken_by_other(&self.email_index, user.email()) {
            Some(Field::Email)
        } else if taken_by_other(&self.phone_index, user.phone()) {
            Some(Field::Phone)
        } else {
            None
        }
    }

    fn index(&mut self, user: &User) {
        self.email_index.insert(user.email().to_string(), *user.id());
        self.phone_index.insert(user.phone().to_string(), *user.id());
    }

    fn unindex(&mut self, user: &User) {
        self.email_index.remove(user.email());
        self.phone_index.remove(user.phone());
    }
}

/// In-memory implementation of UserRepository
///
/// Both unique indexes live behind one lock, so a write checks and claims
/// its email and phone atomically.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    tables: RwLock<UserTables>,
}

impl InMemoryUserRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables
            .email_index
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn get_by_phone(&self, phone: &str) -> Result<Option<User>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables
            .phone_index
            .get(phone)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn create(&self, mut user: User) -> Result<User, DomainError> {
        let mut tables = self.tables.write().await;

        if tables.users.contains_key(user.id()) {
            return Err(DomainError::conflict(format!(
                "User with ID '{}' already exists",
                user.id()
            )));
        }

        if let Some(field) = tables.collision(&user) {
            debug!(user_id = %user.id(), field = field.as_str(), "Rejected duplicate user");
            return Err(DomainError::duplicate_key(field.as_str()));
        }

        user.stamp_created(Utc::now());
        tables.index(&user);
        tables.users.insert(*user.id(), user.clone());

        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, DomainError> {
        let mut tables = self.tables.write().await;

        let Some(existing) = tables.users.get(user.id()).cloned() else {
            return Err(DomainError::not_found(format!("User '{}' not found", user.id())));
        };

        if existing.version() != user.version() {
            debug!(user_id = %user.id(), "Rejected stale user update");
            return Err(stale_write(user));
        }

        if let Some(field) = tables.collision(user) {
            debug!(user_id = %user.id(), field = field.as_str(), "Rejected duplicate user");
            return Err(DomainError::duplicate_key(field.as_str()));
        }

        let mut stored = user.clone();
        stored.stamp_updated(existing.created_at(), Utc::now());

        tables.unindex(&existing);
        tables.index(&stored);
        tables.users.insert(*stored.id(), stored.clone());

        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<User>, DomainError> {
        let tables = self.tables.read().await;

        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at());

        Ok(users)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.users.len())
    }
}

fn stale_write(user: &User) -> DomainError {
    DomainError::conflict(format!(
        "User '{}' was modified concurrently (version {} is stale)",
        user.id(),
        user.version()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::ValidUserRecord;

    fn create_test_user(username: &str, email: &str, phone: &str) -> User {
        let record = ValidUserRecord {
            username: username.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            password: "secret1".to_string(),
            is_admin: false,
            reward_points: 0,
            otp: None,
            otp_created_at: None,
        };

        User::new(UserId::generate(), record, "hashed_password")
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryUserRepository::new();
        let user = create_test_user("alice", "alice@example.com", "4155550001");

        let stored = repo.create(user.clone()).await.unwrap();
        assert_eq!(stored.created_at(), stored.updated_at());

        let retrieved = repo.get(user.id()).await.unwrap().unwrap();
        assert_eq!(retrieved.username(), "alice");
    }

    #[tokio::test]
    async fn test_get_by_email_and_phone() {
        let repo = InMemoryUserRepository::new();
        let user = create_test_user("alice", "alice@example.com", "4155550001");
        repo.create(user.clone()).await.unwrap();

        let by_email = repo.get_by_email("alice@example.com").await.unwrap();
        assert_eq!(by_email.unwrap().id(), user.id());

        let by_phone = repo.get_by_phone("4155550001").await.unwrap();
        assert_eq!(by_phone.unwrap().id(), user.id());

        assert!(repo.get_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_email_uniqueness() {
        let repo = InMemoryUserRepository::new();
        repo.create(create_test_user("alice", "same@example.com", "4155550001"))
            .await
            .unwrap();

        let err = repo
            .create(create_test_user("bob", "same@example.com", "4155550002"))
            .await
            .unwrap_err();

        assert_eq!(err.duplicate_field(), Some("email"));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_phone_uniqueness() {
        let repo = InMemoryUserRepository::new();
        repo.create(create_test_user("alice", "alice@example.com", "4155550001"))
            .await
            .unwrap();

        let err = repo
            .create(create_test_user("bob", "bob@example.com", "4155550001"))
            .await
            .unwrap_err();

        assert_eq!(err.duplicate_field(), Some("phone"));
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let repo = InMemoryUserRepository::new();
        let user = create_test_user("alice", "alice@example.com", "4155550001");
        let stored = repo.create(user).await.unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));

        let mut changed = stored.clone();
        changed.set_admin(true);
        let updated = repo.update(&changed).await.unwrap();

        assert!(updated.is_admin());
        assert_eq!(updated.created_at(), stored.created_at());
        assert!(updated.updated_at() > stored.updated_at());
    }

    #[tokio::test]
    async fn test_update_rejects_stale_version() {
        let repo = InMemoryUserRepository::new();
        let stored = repo
            .create(create_test_user("alice", "alice@example.com", "4155550001"))
            .await
            .unwrap();

        let mut first = stored.clone();
        first.add_reward_points(10);
        let written = repo.update(&first).await.unwrap();
        assert_eq!(written.version(), stored.version() + 1);

        // Second writer still holds the version it read before the first write
        let mut second = stored.clone();
        second.add_reward_points(5);
        let err = repo.update(&second).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));

        let current = repo.get(stored.id()).await.unwrap().unwrap();
        assert_eq!(current.reward_points(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_claim_email_once() {
        let repo = std::sync::Arc::new(InMemoryUserRepository::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    let phone = format!("41555501{:02}", i);
                    repo.create(create_test_user("racer", "race@example.com", &phone))
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(err) => assert_eq!(err.duplicate_field(), Some("email")),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let repo = InMemoryUserRepository::new();
        let user = create_test_user("ghost", "ghost@example.com", "4155550009");

        let err = repo.update(&user).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_rejects_duplicate_phone() {
        let repo = InMemoryUserRepository::new();
        repo.create(create_test_user("alice", "alice@example.com", "4155550001"))
            .await
            .unwrap();
        let bob = repo
            .create(create_test_user("bob", "bob@example.com", "4155550002"))
            .await
            .unwrap();

        // Rebuild bob with alice's phone number
        let clash = User::from_parts(
            *bob.id(),
            bob.username().to_string(),
            bob.email().to_string(),
            "4155550001".to_string(),
            bob.password_hash().to_string(),
            bob.is_admin(),
            bob.reward_points(),
            None,
            None,
            bob.created_at(),
            bob.updated_at(),
            bob.version(),
        );

        let err = repo.update(&clash).await.unwrap_err();
        assert_eq!(err.duplicate_field(), Some("phone"));

        let unchanged = repo.get_by_phone("4155550002").await.unwrap().unwrap();
        assert_eq!(unchanged.id(), bob.id());
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let repo = InMemoryUserRepository::new();

        repo.create(create_test_user("alice", "alice@example.com", "4155550001"))
            .await
            .unwrap();
        repo.create(create_test_user("bob", "bob@example.com", "4155550002"))
            .await
            .unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
