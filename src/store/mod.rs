//! Persistence collaborator interface.
//!
//! # Data Flow
//! ```text
//! gates / handlers
//!     → resilience::timeouts::with_timeout (bounded wait)
//!     → TokenStore / PermissionStore / UserStore / MovieStore
//!     → VersionedStore::compare_and_swap (single atomic conditional update)
//! ```
//!
//! # Design Decisions
//! - The gates only depend on these traits; `MemoryStore` is the in-process
//!   implementation shipped with the service.
//! - A conditional update reports *which* condition failed (missing record vs
//!   stale version) from inside the same atomic step.

pub mod memory;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use thiserror::Error;

use crate::data::{
    Movie, MovieId, NewMovie, NewUser, Permissions, Scope, TokenHash, TokenRecord, User, UserId,
    Version, Versioned,
};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error("version counter exhausted")]
    VersionOverflow,

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Result of a conditional update keyed on (id, version).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// Exactly one row matched and now carries this version.
    Applied(Version),
    /// No record with this id exists.
    Missing,
    /// The record exists at a different version.
    Stale { current: Version },
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert_token(&self, token: TokenRecord) -> Result<(), StoreError>;

    /// Finds a token by hash and scope that is still active at `now`.
    async fn find_token(
        &self,
        hash: &TokenHash,
        scope: Scope,
        now: SystemTime,
    ) -> Result<Option<TokenRecord>, StoreError>;

    /// Revokes every token of `scope` owned by `user_id`. Returns the count removed.
    async fn delete_all_for_user(&self, scope: Scope, user_id: UserId) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Empty set, not an error, for a user without grants.
    async fn get_all_for_user(&self, user_id: UserId) -> Result<Permissions, StoreError>;

    /// Grants known codes; unknown codes are ignored.
    async fn add_for_user(&self, user_id: UserId, codes: &[&str]) -> Result<(), StoreError>;
}

#[async_trait]
pub trait VersionedStore<R: Versioned>: Send + Sync {
    /// Replaces the stored record with `record` and bumps its version by one,
    /// but only if the stored version equals `record.version()`.
    async fn compare_and_swap(&self, record: &R) -> Result<CasOutcome, StoreError>;
}

#[async_trait]
pub trait UserStore: VersionedStore<User> {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn get_user(&self, id: UserId) -> Result<User, StoreError>;
    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError>;
}

#[async_trait]
pub trait MovieStore: VersionedStore<Movie> {
    async fn insert_movie(&self, movie: NewMovie) -> Result<Movie, StoreError>;
    async fn get_movie(&self, id: MovieId) -> Result<Movie, StoreError>;
    async fn delete_movie(&self, id: MovieId) -> Result<(), StoreError>;
}

/// Handles to each collaborator interface, usually all backed by one store.
#[derive(Clone)]
pub struct Stores {
    pub tokens: Arc<dyn TokenStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub users: Arc<dyn UserStore>,
    pub movies: Arc<dyn MovieStore>,
}

impl Stores {
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: TokenStore + PermissionStore + UserStore + MovieStore + 'static,
    {
        Self {
            tokens: store.clone(),
            permissions: store.clone(),
            users: store.clone(),
            movies: store,
        }
    }
}
