//! Home Library Server
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod auth;
pub mod library;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use auth::AuthManager;
pub use library::{LibraryStore, MemoryLibraryStore, SqliteLibraryStore};
pub use server::{run_server, RequestsLoggingLevel};
