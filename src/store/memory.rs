//! In-process store.
//!
//! Users and movies live behind one mutex per table so that a conditional
//! update (and the email uniqueness check for users) is a single atomic
//! step. Tokens and grants are independent per key and use `DashMap`.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::clock::{unix_secs, Clock};
use crate::data::{
    Movie, MovieId, NewMovie, NewUser, Permissions, Scope, TokenHash, TokenRecord, User, UserId,
    Version, Versioned, MOVIES_READ, MOVIES_WRITE,
};
use crate::store::{
    CasOutcome, MovieStore, PermissionStore, StoreError, TokenStore, UserStore, VersionedStore,
};

pub struct MemoryStore {
    users: Mutex<HashMap<UserId, User>>,
    movies: Mutex<HashMap<MovieId, Movie>>,
    tokens: DashMap<TokenHash, TokenRecord>,
    grants: DashMap<UserId, Permissions>,
    /// Codes that may be granted.
    catalogue: BTreeSet<String>,
    next_user_id: AtomicI64,
    next_movie_id: AtomicI64,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Empty store with the default permission catalogue.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            movies: Mutex::new(HashMap::new()),
            tokens: DashMap::new(),
            grants: DashMap::new(),
            catalogue: [MOVIES_READ, MOVIES_WRITE]
                .into_iter()
                .map(String::from)
                .collect(),
            next_user_id: AtomicI64::new(1),
            next_movie_id: AtomicI64::new(1),
            clock,
        }
    }

    /// Number of stored tokens, active or not.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    fn users(&self) -> Result<MutexGuard<'_, HashMap<UserId, User>>, StoreError> {
        self.users
            .lock()
            .map_err(|_| StoreError::Backend("user table lock poisoned".into()))
    }

    fn movies(&self) -> Result<MutexGuard<'_, HashMap<MovieId, Movie>>, StoreError> {
        self.movies
            .lock()
            .map_err(|_| StoreError::Backend("movie table lock poisoned".into()))
    }

    fn created_now(&self) -> u64 {
        unix_secs(self.clock.now())
    }
}

/// The conditional update shared by every versioned table. The caller holds
/// the table lock for the whole call.
fn swap_if_current<R: Versioned>(
    rows: &mut HashMap<i64, R>,
    record: &R,
) -> Result<CasOutcome, StoreError> {
    let Some(stored) = rows.get_mut(&record.id()) else {
        return Ok(CasOutcome::Missing);
    };
    if stored.version() != record.version() {
        return Ok(CasOutcome::Stale {
            current: stored.version(),
        });
    }
    let next = stored.version().next().ok_or(StoreError::VersionOverflow)?;
    let mut updated = record.clone();
    updated.set_version(next);
    *stored = updated;
    Ok(CasOutcome::Applied(next))
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_token(&self, token: TokenRecord) -> Result<(), StoreError> {
        match self.tokens.entry(token.hash) {
            Entry::Occupied(_) => Err(StoreError::Backend("duplicate token hash".into())),
            Entry::Vacant(slot) => {
                slot.insert(token);
                Ok(())
            }
        }
    }

    async fn find_token(
        &self,
        hash: &TokenHash,
        scope: Scope,
        now: SystemTime,
    ) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self
            .tokens
            .get(hash)
            .filter(|t| t.scope == scope && t.is_active_at(now))
            .map(|t| t.value().clone()))
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: UserId) -> Result<u64, StoreError> {
        let doomed: Vec<TokenHash> = self
            .tokens
            .iter()
            .filter(|t| t.scope == scope && t.user_id == user_id)
            .map(|t| *t.key())
            .collect();
        let removed = doomed
            .iter()
            .filter(|hash| self.tokens.remove(*hash).is_some())
            .count();
        Ok(removed as u64)
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn get_all_for_user(&self, user_id: UserId) -> Result<Permissions, StoreError> {
        Ok(self
            .grants
            .get(&user_id)
            .map(|p| p.value().clone())
            .unwrap_or_default())
    }

    async fn add_for_user(&self, user_id: UserId, codes: &[&str]) -> Result<(), StoreError> {
        let mut granted = self.grants.entry(user_id).or_default();
        for code in codes.iter().filter(|c| self.catalogue.contains(**c)) {
            granted.grant(*code);
        }
        Ok(())
    }
}

#[async_trait]
impl VersionedStore<User> for MemoryStore {
    async fn compare_and_swap(&self, record: &User) -> Result<CasOutcome, StoreError> {
        let mut users = self.users()?;
        let taken = users
            .values()
            .any(|u| u.id != record.id && u.email == record.email);
        if taken && users.contains_key(&record.id) {
            return Err(StoreError::DuplicateEmail);
        }
        swap_if_current(&mut users, record)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users()?;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let id = self.next_user_id.fetch_add(1, Ordering::Relaxed);
        let stored = User {
            id,
            email: user.email,
            name: user.name,
            password: user.password,
            activated: user.activated,
            version: Version::INITIAL,
            created_at: self.created_now(),
        };
        users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        self.users()?.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.users()?
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl VersionedStore<Movie> for MemoryStore {
    async fn compare_and_swap(&self, record: &Movie) -> Result<CasOutcome, StoreError> {
        let mut movies = self.movies()?;
        swap_if_current(&mut movies, record)
    }
}

#[async_trait]
impl MovieStore for MemoryStore {
    async fn insert_movie(&self, movie: NewMovie) -> Result<Movie, StoreError> {
        let id = self.next_movie_id.fetch_add(1, Ordering::Relaxed);
        let stored = Movie {
            id,
            title: movie.title,
            year: movie.year,
            runtime: movie.runtime,
            genres: movie.genres,
            version: Version::INITIAL,
            created_at: self.created_now(),
        };
        self.movies()?.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_movie(&self, id: MovieId) -> Result<Movie, StoreError> {
        if id <= 0 {
            return Err(StoreError::NotFound);
        }
        self.movies()?.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn delete_movie(&self, id: MovieId) -> Result<(), StoreError> {
        self.movies()?
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
