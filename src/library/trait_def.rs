//! LibraryStore trait definition.
//!
//! The trait is the storage contract for the whole service: every entity
//! write passes through the reference gate, every parent delete runs its
//! cascade synchronously, and favorites keep idempotent-add semantics. The
//! in-memory and SQLite adapters implement the same contract, one with
//! hand-rolled scans and one with declarative foreign-key actions.

use super::error::LibraryResult;
use super::models::{
    Album, Artist, FavoriteKind, FavoritesView, NewAlbum, NewArtist, NewTrack, Track, User,
};

pub trait LibraryStore: Send + Sync {
    // =========================================================================
    // Users
    // =========================================================================

    fn list_users(&self) -> LibraryResult<Vec<User>>;

    /// Fails with `NotFound` if no user holds the id.
    fn get_user(&self, id: &str) -> LibraryResult<User>;

    /// Lookup by login, for authentication. `Ok(None)` when unknown.
    fn get_user_by_login(&self, login: &str) -> LibraryResult<Option<User>>;

    /// Creates a user with version 1 and fresh timestamps. Fails with
    /// `LoginTaken` if another user already holds the login.
    fn create_user(&self, login: &str, password_hash: &str) -> LibraryResult<User>;

    /// Replaces the password hash, bumps the version by 1 and refreshes
    /// `updated_at`. No other field changes.
    fn update_user_password(&self, id: &str, password_hash: &str) -> LibraryResult<User>;

    /// Removes the user record only; users have no dependents.
    fn delete_user(&self, id: &str) -> LibraryResult<()>;

    // =========================================================================
    // Artists
    // =========================================================================

    fn list_artists(&self) -> LibraryResult<Vec<Artist>>;

    fn get_artist(&self, id: &str) -> LibraryResult<Artist>;

    fn create_artist(&self, new: NewArtist) -> LibraryResult<Artist>;

    /// Full replacement of the scalar fields.
    fn update_artist(&self, id: &str, new: NewArtist) -> LibraryResult<Artist>;

    /// Removes the artist, nulls `artist_id` on dependent albums and tracks
    /// and silently drops the id from favorite artists, all as one atomic
    /// unit. Fails with `NotFound` (and touches nothing) if the id is absent.
    fn delete_artist(&self, id: &str) -> LibraryResult<()>;

    // =========================================================================
    // Albums
    // =========================================================================

    fn list_albums(&self) -> LibraryResult<Vec<Album>>;

    fn get_album(&self, id: &str) -> LibraryResult<Album>;

    /// `artist_id`, when non-null, must reference an existing artist.
    fn create_album(&self, new: NewAlbum) -> LibraryResult<Album>;

    /// Full replacement; references are re-validated on every update.
    fn update_album(&self, id: &str, new: NewAlbum) -> LibraryResult<Album>;

    /// Removes the album, nulls `album_id` on dependent tracks (leaving
    /// their `artist_id` untouched) and drops the id from favorite albums.
    fn delete_album(&self, id: &str) -> LibraryResult<()>;

    // =========================================================================
    // Tracks
    // =========================================================================

    fn list_tracks(&self) -> LibraryResult<Vec<Track>>;

    fn get_track(&self, id: &str) -> LibraryResult<Track>;

    fn create_track(&self, new: NewTrack) -> LibraryResult<Track>;

    fn update_track(&self, id: &str, new: NewTrack) -> LibraryResult<Track>;

    /// Removes the track and drops the id from favorite tracks; tracks have
    /// no dependents below them.
    fn delete_track(&self, id: &str) -> LibraryResult<()>;

    // =========================================================================
    // Favorites
    // =========================================================================

    /// Fails with `FavoriteTargetMissing` if no entity of `kind` holds the
    /// id; adding an id that is already a member is a successful no-op.
    fn add_favorite(&self, kind: FavoriteKind, id: &str) -> LibraryResult<()>;

    /// Fails with `NotFound` if the id is not currently a member. This is
    /// deliberately stricter than the silent cleanup a cascade performs.
    fn remove_favorite(&self, kind: FavoriteKind, id: &str) -> LibraryResult<()>;

    /// Maps every favorite id to its full entity, preserving insertion
    /// order and silently dropping ids whose target no longer exists.
    fn resolve_favorites(&self) -> LibraryResult<FavoritesView>;
}
