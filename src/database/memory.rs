use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::concurrency::{ConditionalWrite, VersionedStore};
use crate::database::filters::{Filters, Metadata, SortDirection};
use crate::database::manager::StoreError;
use crate::database::models::{Item, ItemFilter, NewItem, NewUser, Permissions, Scope, Token, User};
use crate::database::repository::{ItemStore, PermissionStore, TokenStore, UserStore};

#[derive(Debug, Clone)]
struct StoredToken {
    hash: Vec<u8>,
    user_id: i64,
    expiry: chrono::DateTime<Utc>,
    scope: Scope,
}

#[derive(Debug, Default)]
struct State {
    items: BTreeMap<i64, Item>,
    next_item_id: i64,
    users: BTreeMap<i64, User>,
    next_user_id: i64,
    tokens: Vec<StoredToken>,
    permissions: HashMap<i64, HashSet<String>>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    unavailable: AtomicBool,
    failing_token_writes: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

/// Process-local store used by tests and `--in-memory` development runs.
/// Clones share the same data. Conditional writes are atomic under one lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail as if the backend were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Make token writes fail while every other operation keeps working
    pub fn set_token_writes_failing(&self, failing: bool) {
        self.shared.failing_token_writes.store(failing, AtomicOrdering::SeqCst);
    }

    /// Delay every subsequent operation by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self
            .shared
            .latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Insert a user, bypassing validation; returns the new id
    pub fn seed_user(&self, name: &str, email: &str, password_hash: &str, activated: bool) -> i64 {
        let mut state = self.lock();
        state.next_user_id += 1;
        let id = state.next_user_id;
        state.users.insert(
            id,
            User {
                id,
                created_on: Utc::now(),
                name: name.to_string(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                activated,
                version: 1,
            },
        );
        id
    }

    /// Store a token hash directly
    pub fn seed_token(&self, token: &Token) {
        push_token(&mut self.lock(), token);
    }

    pub fn grant(&self, user_id: i64, codes: &[&str]) {
        self.lock()
            .permissions
            .entry(user_id)
            .or_default()
            .extend(codes.iter().map(|c| c.to_string()));
    }

    /// Overwrite an item row as-is, including its version
    pub fn put_item(&self, item: Item) {
        let mut state = self.lock();
        state.next_item_id = state.next_item_id.max(item.id);
        state.items.insert(item.id, item);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self) -> Result<(), StoreError> {
        let latency = *self
            .shared
            .latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.shared.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn check_token_write(&self) -> Result<(), StoreError> {
        if self.shared.failing_token_writes.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("token writes marked failing".into()));
        }
        Ok(())
    }
}

fn push_token(state: &mut State, token: &Token) {
    state.tokens.push(StoredToken {
        hash: token.hash.clone(),
        user_id: token.user_id,
        expiry: token.expiry,
        scope: token.scope,
    });
}

fn create_user(state: &mut State, new: &NewUser) -> Result<User, StoreError> {
    if state.users.values().any(|u| u.email == new.email) {
        return Err(StoreError::DuplicateEmail);
    }
    state.next_user_id += 1;
    let user = User {
        id: state.next_user_id,
        created_on: Utc::now(),
        name: new.name.clone(),
        email: new.email.clone(),
        password_hash: new.password_hash.clone(),
        activated: new.activated,
        version: 1,
    };
    state.users.insert(user.id, user.clone());
    Ok(user)
}

/// Every word in `query` appears as a word of `field`, ignoring case
fn text_matches(field: &str, query: &str) -> bool {
    let words: HashSet<String> = field
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .all(|w| words.contains(&w.to_lowercase()))
}

fn compare_by(column: &str, a: &Item, b: &Item) -> Ordering {
    match column {
        "created_by" => a.created_by.cmp(&b.created_by),
        "priority" => a.priority.cmp(&b.priority),
        "assigned_to" => a.assigned_to.cmp(&b.assigned_to),
        "status" => a.status.cmp(&b.status),
        _ => a.id.cmp(&b.id),
    }
}

#[async_trait]
impl VersionedStore<Item> for MemoryStore {
    async fn fetch(&self, id: i64) -> Result<Item, StoreError> {
        self.enter().await?;
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        self.lock().items.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn write_if_version(&self, record: &Item) -> Result<ConditionalWrite, StoreError> {
        self.enter().await?;
        let mut state = self.lock();
        match state.items.get_mut(&record.id) {
            Some(stored) if stored.version == record.version => {
                let version = stored.version + 1;
                *stored = Item {
                    version,
                    id: stored.id,
                    created_on: stored.created_on,
                    ..record.clone()
                };
                Ok(ConditionalWrite::Applied { version })
            }
            _ => Ok(ConditionalWrite::NoRowsMatched),
        }
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn insert(&self, new: &NewItem) -> Result<Item, StoreError> {
        self.enter().await?;
        let mut state = self.lock();
        state.next_item_id += 1;
        let item = Item {
            id: state.next_item_id,
            created_on: Utc::now(),
            summary: new.summary.clone(),
            description: new.description.clone(),
            priority: new.priority.clone(),
            status: new.status.clone(),
            assigned_to: new.assigned_to.clone(),
            category: new.category.clone(),
            department: new.department.clone(),
            created_by: new.created_by.clone(),
            due_on: new.due_on,
            closed_on: None,
            version: 1,
        };
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.enter().await?;
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        self.lock()
            .items
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, filter: &ItemFilter, filters: &Filters) -> Result<(Vec<Item>, Metadata), StoreError> {
        self.enter().await?;
        let mut matched: Vec<Item> = self
            .lock()
            .items
            .values()
            .filter(|i| text_matches(&i.created_by, &filter.created_by))
            .filter(|i| text_matches(&i.assigned_to, &filter.assigned_to))
            .filter(|i| text_matches(&i.priority, &filter.priority))
            .filter(|i| text_matches(&i.status, &filter.status))
            .cloned()
            .collect();

        let column = filters.sort_column();
        let direction = filters.sort_direction();
        matched.sort_by(|a, b| {
            let primary = match direction {
                SortDirection::Asc => compare_by(column, a, b),
                SortDirection::Desc => compare_by(column, b, a),
            };
            primary.then(a.id.cmp(&b.id))
        });

        let total = matched.len() as i64;
        let page: Vec<Item> = matched
            .into_iter()
            .skip(filters.offset().max(0) as usize)
            .take(filters.limit().max(0) as usize)
            .collect();

        Ok((page, Metadata::calculate(total, filters.page, filters.page_size)))
    }
}

#[async_trait]
impl VersionedStore<User> for MemoryStore {
    async fn fetch(&self, id: i64) -> Result<User, StoreError> {
        self.enter().await?;
        self.lock().users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn write_if_version(&self, record: &User) -> Result<ConditionalWrite, StoreError> {
        self.enter().await?;
        let mut state = self.lock();
        if state
            .users
            .values()
            .any(|u| u.id != record.id && u.email == record.email)
        {
            return Err(StoreError::DuplicateEmail);
        }
        match state.users.get_mut(&record.id) {
            Some(stored) if stored.version == record.version => {
                let version = stored.version + 1;
                *stored = User {
                    version,
                    id: stored.id,
                    created_on: stored.created_on,
                    ..record.clone()
                };
                Ok(ConditionalWrite::Applied { version })
            }
            _ => Ok(ConditionalWrite::NoRowsMatched),
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn register(
        &self,
        new: &NewUser,
        permissions: &[&str],
        activation_ttl: chrono::Duration,
    ) -> Result<(User, Token), StoreError> {
        self.enter().await?;
        let mut state = self.lock();
        // Every failure is decided before the first mutation
        self.check_token_write()?;

        let user = create_user(&mut state, new)?;
        state
            .permissions
            .entry(user.id)
            .or_default()
            .extend(permissions.iter().map(|c| c.to_string()));
        let token = Token::generate(user.id, activation_ttl, Scope::Activation);
        push_token(&mut state, &token);
        Ok((user, token))
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.enter().await?;
        self.lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_for_token(&self, scope: Scope, token_hash: &[u8]) -> Result<User, StoreError> {
        self.enter().await?;
        let now = Utc::now();
        let state = self.lock();
        state
            .tokens
            .iter()
            .find(|t| t.hash == token_hash && t.scope == scope && t.expiry > now)
            .and_then(|t| state.users.get(&t.user_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        self.enter().await?;
        self.check_token_write()?;
        self.seed_token(token);
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError> {
        self.enter().await?;
        self.lock()
            .tokens
            .retain(|t| !(t.scope == scope && t.user_id == user_id));
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        self.enter().await?;
        Ok(self
            .lock()
            .permissions
            .get(&user_id)
            .map(|codes| codes.iter().cloned().collect())
            .unwrap_or_default())
    }
}
