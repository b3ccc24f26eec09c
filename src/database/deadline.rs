use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::concurrency::{ConditionalWrite, VersionedStore};
use crate::database::filters::{Filters, Metadata};
use crate::database::manager::StoreError;
use crate::database::models::{Item, ItemFilter, NewItem, NewUser, Permissions, Scope, Token, User};
use crate::database::repository::{ItemStore, PermissionStore, TokenStore, UserStore};

/// Wraps a store so that every operation fails with `StoreError::Timeout`
/// once `limit` elapses. Expired operations are dropped, never retried.
pub struct Deadline<S> {
    inner: S,
    limit: Duration,
}

impl<S> Deadline<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn run<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        T: Send,
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        match tokio::time::timeout(self.limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation = op, limit_ms = self.limit.as_millis() as u64, "storage deadline exceeded");
                Err(StoreError::Timeout)
            }
        }
    }
}

#[async_trait]
impl<S> VersionedStore<Item> for Deadline<S>
where
    S: ItemStore,
{
    async fn fetch(&self, id: i64) -> Result<Item, StoreError> {
        self.run("items.fetch", VersionedStore::<Item>::fetch(&self.inner, id)).await
    }

    async fn write_if_version(&self, record: &Item) -> Result<ConditionalWrite, StoreError> {
        self.run("items.update", VersionedStore::<Item>::write_if_version(&self.inner, record))
            .await
    }
}

#[async_trait]
impl<S> ItemStore for Deadline<S>
where
    S: ItemStore,
{
    async fn insert(&self, item: &NewItem) -> Result<Item, StoreError> {
        self.run("items.insert", ItemStore::insert(&self.inner, item)).await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.run("items.delete", self.inner.delete(id)).await
    }

    async fn list(&self, filter: &ItemFilter, filters: &Filters) -> Result<(Vec<Item>, Metadata), StoreError> {
        self.run("items.list", self.inner.list(filter, filters)).await
    }
}

#[async_trait]
impl<S> VersionedStore<User> for Deadline<S>
where
    S: UserStore,
{
    async fn fetch(&self, id: i64) -> Result<User, StoreError> {
        self.run("users.fetch", VersionedStore::<User>::fetch(&self.inner, id)).await
    }

    async fn write_if_version(&self, record: &User) -> Result<ConditionalWrite, StoreError> {
        self.run("users.update", VersionedStore::<User>::write_if_version(&self.inner, record))
            .await
    }
}

#[async_trait]
impl<S> UserStore for Deadline<S>
where
    S: UserStore,
{
    async fn register(
        &self,
        user: &NewUser,
        permissions: &[&str],
        activation_ttl: chrono::Duration,
    ) -> Result<(User, Token), StoreError> {
        self.run("users.register", self.inner.register(user, permissions, activation_ttl))
            .await
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.run("users.get_by_email", self.inner.get_by_email(email)).await
    }

    async fn get_for_token(&self, scope: Scope, token_hash: &[u8]) -> Result<User, StoreError> {
        self.run("users.get_for_token", self.inner.get_for_token(scope, token_hash))
            .await
    }
}

#[async_trait]
impl<S> TokenStore for Deadline<S>
where
    S: TokenStore,
{
    async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        self.run("tokens.insert", TokenStore::insert(&self.inner, token)).await
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError> {
        self.run("tokens.delete_all_for_user", self.inner.delete_all_for_user(scope, user_id))
            .await
    }
}

#[async_trait]
impl<S> PermissionStore for Deadline<S>
where
    S: PermissionStore,
{
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        self.run("permissions.get_all_for_user", self.inner.get_all_for_user(user_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;

    #[tokio::test(start_paused = true)]
    async fn test_slow_operation_times_out() {
        let memory = MemoryStore::new();
        memory.set_latency(Some(Duration::from_secs(10)));
        let store = Deadline::new(memory, Duration::from_secs(3));

        let result = VersionedStore::<Item>::fetch(&store, 1).await;
        assert!(matches!(result, Err(StoreError::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_operation_passes_through() {
        let memory = MemoryStore::new();
        memory.set_latency(Some(Duration::from_millis(100)));
        let store = Deadline::new(memory, Duration::from_secs(3));

        let result = VersionedStore::<Item>::fetch(&store, 1).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }
}
