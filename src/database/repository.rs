use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::concurrency::VersionedStore;
use crate::database::deadline::Deadline;
use crate::database::filters::{Filters, Metadata};
use crate::database::manager::StoreError;
use crate::database::memory::MemoryStore;
use crate::database::models::{Item, ItemFilter, NewItem, NewUser, Permissions, Scope, Token, User};
use crate::database::postgres::PgStore;

#[async_trait]
pub trait ItemStore: VersionedStore<Item> {
    async fn insert(&self, item: &NewItem) -> Result<Item, StoreError>;

    /// `NotFound` when no row was removed
    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    async fn list(&self, filter: &ItemFilter, filters: &Filters) -> Result<(Vec<Item>, Metadata), StoreError>;
}

#[async_trait]
pub trait UserStore: VersionedStore<User> {
    /// Create the user, grant `permissions` and issue an activation token
    /// valid for `activation_ttl`, all or nothing. `DuplicateEmail` when the
    /// address is already registered.
    async fn register(
        &self,
        user: &NewUser,
        permissions: &[&str],
        activation_ttl: chrono::Duration,
    ) -> Result<(User, Token), StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Owner of an unexpired token with this hash and scope
    async fn get_for_token(&self, scope: Scope, token_hash: &[u8]) -> Result<User, StoreError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: &Token) -> Result<(), StoreError>;

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, StoreError>;
}

/// Everything a store backend must provide
pub trait Store: ItemStore + UserStore + TokenStore + PermissionStore + 'static {}

impl<S> Store for S where S: ItemStore + UserStore + TokenStore + PermissionStore + 'static {}

/// Storage handles shared by the pipeline and handlers
#[derive(Clone)]
pub struct Models {
    pub items: Arc<dyn ItemStore>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub permissions: Arc<dyn PermissionStore>,
}

impl Models {
    /// Every call through the returned handles is bounded by `operation_timeout`
    pub fn new<S: Store>(store: S, operation_timeout: Duration) -> Self {
        let store = Arc::new(Deadline::new(store, operation_timeout));
        Self {
            items: store.clone(),
            users: store.clone(),
            tokens: store.clone(),
            permissions: store,
        }
    }

    pub fn postgres(pool: sqlx::PgPool, operation_timeout: Duration) -> Self {
        Self::new(PgStore::new(pool), operation_timeout)
    }

    pub fn in_memory(store: MemoryStore, operation_timeout: Duration) -> Self {
        Self::new(store, operation_timeout)
    }
}
