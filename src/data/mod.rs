//! Records the gates reason about.
//!
//! # Ownership
//! ```text
//! User, Movie, TokenRecord, Permissions
//!     → owned by the persistence collaborator (store/)
//!     → computed and validated here, never persisted from here
//! ```
//!
//! `Token` carries the one-time plaintext and exists only between issuance
//! and the response that hands it to the client. Only its `TokenRecord`
//! (hash, owner, scope, expiry) reaches a store.

pub mod movie;
pub mod permissions;
pub mod token;
pub mod user;
pub mod version;

pub use movie::{Movie, MovieId, NewMovie, Runtime};
pub use permissions::{Permissions, MOVIES_READ, MOVIES_WRITE};
pub use token::{Scope, Token, TokenHash, TokenRecord, TOKEN_PLAINTEXT_LEN};
pub use user::{NewUser, PasswordDigest, User, UserId};
pub use version::{Version, Versioned};
