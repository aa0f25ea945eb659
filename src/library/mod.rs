mod error;
mod memory_store;
mod models;
mod schema;
mod sqlite_store;
mod trait_def;
mod validation;

pub use error::{LibraryError, LibraryResult};
pub use memory_store::MemoryLibraryStore;
pub use models::{
    now_millis, Album, Artist, FavoriteKind, FavoritesView, NewAlbum, NewArtist, NewTrack,
    PublicUser, Track, User,
};
pub use schema::LIBRARY_VERSIONED_SCHEMAS;
pub use sqlite_store::SqliteLibraryStore;
pub use trait_def::LibraryStore;
pub use validation::RefLookup;
