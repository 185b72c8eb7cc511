//! Database module: credential entity and SQL repository.
//!
//! - `model`: typed rows returned by the repository.
//! - `repo`: SQL-only functions plus the [`SqliteCredentialStore`] adapter.
//!
//! External modules should import from `passiify_admin::db`; the repository
//! API is re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::StoredCredential;
