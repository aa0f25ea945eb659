//! Domain errors shared by both storage adapters.
//!
//! Every variant is a local, synchronous, non-retryable failure; the HTTP
//! layer maps them onto status codes and never retries.

use super::models::FavoriteKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    /// The targeted record does not exist. Also covers removing a favorite
    /// id that is not currently a member.
    #[error("{what} '{id}' not found")]
    NotFound { what: &'static str, id: String },

    /// A foreign-key field points at a record that does not exist. The
    /// whole write is rejected and no partial update is applied.
    #[error("field '{field}' references unknown id '{id}'")]
    BadReference { field: &'static str, id: String },

    /// Another user already holds this login.
    #[error("login '{login}' is already taken")]
    LoginTaken { login: String },

    /// Favoriting an id whose target entity does not exist.
    #[error("cannot favorite {kind} '{id}': no such {kind}")]
    FavoriteTargetMissing { kind: FavoriteKind, id: String },

    #[error("field '{field}' is required but was empty")]
    EmptyField { field: &'static str },

    #[error("field '{field}' must be positive, got {value}")]
    NonPositiveValue { field: &'static str, value: i64 },

    /// The old password supplied for a password change does not match.
    #[error("old password does not match")]
    WrongPassword,

    /// Adapter-level failure (I/O, SQLite, hashing).
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for LibraryError {
    fn from(err: rusqlite::Error) -> Self {
        LibraryError::Storage(err.into())
    }
}

pub type LibraryResult<T> = Result<T, LibraryError>;
