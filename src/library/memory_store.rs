//! In-memory library store.
//!
//! All tables live behind a single mutex, so a delete and its cascade are
//! one atomic unit from any other caller's point of view. The cascade is
//! hand-rolled here; the SQLite adapter expresses the same contract with
//! declarative foreign-key actions.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use super::error::{LibraryError, LibraryResult};
use super::models::*;
use super::trait_def::LibraryStore;
use super::validation::{
    check_album_refs, check_track_refs, validate_album, validate_artist, validate_track,
    RefLookup,
};

/// Membership sets for favorites. Vecs keep insertion order; uniqueness is
/// enforced on insert.
#[derive(Default)]
struct Favorites {
    artists: Vec<String>,
    albums: Vec<String>,
    tracks: Vec<String>,
}

impl Favorites {
    fn set_mut(&mut self, kind: FavoriteKind) -> &mut Vec<String> {
        match kind {
            FavoriteKind::Artist => &mut self.artists,
            FavoriteKind::Album => &mut self.albums,
            FavoriteKind::Track => &mut self.tracks,
        }
    }
}

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    artists: HashMap<String, Artist>,
    albums: HashMap<String, Album>,
    tracks: HashMap<String, Track>,
    favorites: Favorites,
}

impl RefLookup for Tables {
    fn artist_exists(&self, id: &str) -> LibraryResult<bool> {
        Ok(self.artists.contains_key(id))
    }
    fn album_exists(&self, id: &str) -> LibraryResult<bool> {
        Ok(self.albums.contains_key(id))
    }
}

impl Tables {
    fn entity_exists(&self, kind: FavoriteKind, id: &str) -> bool {
        match kind {
            FavoriteKind::Artist => self.artists.contains_key(id),
            FavoriteKind::Album => self.albums.contains_key(id),
            FavoriteKind::Track => self.tracks.contains_key(id),
        }
    }

    /// Cascade step for an artist delete: clear every dependent reference
    /// and opportunistically drop the id from favorite artists. The artist
    /// record itself has already been removed by the caller.
    fn cascade_artist_removed(&mut self, id: &str) {
        for album in self.albums.values_mut() {
            if album.artist_id.as_deref() == Some(id) {
                album.artist_id = None;
            }
        }
        for track in self.tracks.values_mut() {
            if track.artist_id.as_deref() == Some(id) {
                track.artist_id = None;
            }
        }
        self.favorites.artists.retain(|fav| fav != id);
    }

    /// Cascade step for an album delete. Only `album_id` is cleared; an
    /// album deletion must never sever an artist-track link.
    fn cascade_album_removed(&mut self, id: &str) {
        for track in self.tracks.values_mut() {
            if track.album_id.as_deref() == Some(id) {
                track.album_id = None;
            }
        }
        self.favorites.albums.retain(|fav| fav != id);
    }

    /// Cascade step for a track delete: tracks have no dependents, only a
    /// possible favorites membership.
    fn cascade_track_removed(&mut self, id: &str) {
        self.favorites.tracks.retain(|fav| fav != id);
    }
}

#[derive(Default)]
pub struct MemoryLibraryStore {
    inner: Mutex<Tables>,
}

impl MemoryLibraryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl LibraryStore for MemoryLibraryStore {
    // =========================================================================
    // Users
    // =========================================================================

    fn list_users(&self) -> LibraryResult<Vec<User>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.users.values().cloned().collect())
    }

    fn get_user(&self, id: &str) -> LibraryResult<User> {
        let tables = self.inner.lock().unwrap();
        tables.users.get(id).cloned().ok_or(LibraryError::NotFound {
            what: "user",
            id: id.to_string(),
        })
    }

    fn get_user_by_login(&self, login: &str) -> LibraryResult<Option<User>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.users.values().find(|u| u.login == login).cloned())
    }

    fn create_user(&self, login: &str, password_hash: &str) -> LibraryResult<User> {
        if login.trim().is_empty() {
            return Err(LibraryError::EmptyField { field: "login" });
        }
        let mut tables = self.inner.lock().unwrap();
        if tables.users.values().any(|u| u.login == login) {
            return Err(LibraryError::LoginTaken {
                login: login.to_string(),
            });
        }
        let now = now_millis();
        let user = User {
            id: new_id(),
            login: login.to_string(),
            password_hash: password_hash.to_string(),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn update_user_password(&self, id: &str, password_hash: &str) -> LibraryResult<User> {
        let mut tables = self.inner.lock().unwrap();
        let user = tables.users.get_mut(id).ok_or(LibraryError::NotFound {
            what: "user",
            id: id.to_string(),
        })?;
        user.password_hash = password_hash.to_string();
        user.version += 1;
        user.updated_at = now_millis();
        Ok(user.clone())
    }

    fn delete_user(&self, id: &str) -> LibraryResult<()> {
        let mut tables = self.inner.lock().unwrap();
        tables.users.remove(id).ok_or(LibraryError::NotFound {
            what: "user",
            id: id.to_string(),
        })?;
        Ok(())
    }

    // =========================================================================
    // Artists
    // =========================================================================

    fn list_artists(&self) -> LibraryResult<Vec<Artist>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.artists.values().cloned().collect())
    }

    fn get_artist(&self, id: &str) -> LibraryResult<Artist> {
        let tables = self.inner.lock().unwrap();
        tables
            .artists
            .get(id)
            .cloned()
            .ok_or(LibraryError::NotFound {
                what: "artist",
                id: id.to_string(),
            })
    }

    fn create_artist(&self, new: NewArtist) -> LibraryResult<Artist> {
        validate_artist(&new)?;
        let mut tables = self.inner.lock().unwrap();
        let artist = Artist {
            id: new_id(),
            name: new.name,
            grammy: new.grammy,
        };
        tables.artists.insert(artist.id.clone(), artist.clone());
        Ok(artist)
    }

    fn update_artist(&self, id: &str, new: NewArtist) -> LibraryResult<Artist> {
        validate_artist(&new)?;
        let mut tables = self.inner.lock().unwrap();
        let artist = tables.artists.get_mut(id).ok_or(LibraryError::NotFound {
            what: "artist",
            id: id.to_string(),
        })?;
        artist.name = new.name;
        artist.grammy = new.grammy;
        Ok(artist.clone())
    }

    fn delete_artist(&self, id: &str) -> LibraryResult<()> {
        let mut tables = self.inner.lock().unwrap();
        if tables.artists.remove(id).is_none() {
            return Err(LibraryError::NotFound {
                what: "artist",
                id: id.to_string(),
            });
        }
        tables.cascade_artist_removed(id);
        Ok(())
    }

    // =========================================================================
    // Albums
    // =========================================================================

    fn list_albums(&self) -> LibraryResult<Vec<Album>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.albums.values().cloned().collect())
    }

    fn get_album(&self, id: &str) -> LibraryResult<Album> {
        let tables = self.inner.lock().unwrap();
        tables
            .albums
            .get(id)
            .cloned()
            .ok_or(LibraryError::NotFound {
                what: "album",
                id: id.to_string(),
            })
    }

    fn create_album(&self, new: NewAlbum) -> LibraryResult<Album> {
        validate_album(&new)?;
        let mut tables = self.inner.lock().unwrap();
        check_album_refs(&*tables, new.artist_id.as_deref())?;
        let album = Album {
            id: new_id(),
            name: new.name,
            year: new.year,
            artist_id: new.artist_id,
        };
        tables.albums.insert(album.id.clone(), album.clone());
        Ok(album)
    }

    fn update_album(&self, id: &str, new: NewAlbum) -> LibraryResult<Album> {
        validate_album(&new)?;
        let mut tables = self.inner.lock().unwrap();
        if !tables.albums.contains_key(id) {
            return Err(LibraryError::NotFound {
                what: "album",
                id: id.to_string(),
            });
        }
        check_album_refs(&*tables, new.artist_id.as_deref())?;
        let album = tables.albums.get_mut(id).unwrap();
        album.name = new.name;
        album.year = new.year;
        album.artist_id = new.artist_id;
        Ok(album.clone())
    }

    fn delete_album(&self, id: &str) -> LibraryResult<()> {
        let mut tables = self.inner.lock().unwrap();
        if tables.albums.remove(id).is_none() {
            return Err(LibraryError::NotFound {
                what: "album",
                id: id.to_string(),
            });
        }
        tables.cascade_album_removed(id);
        Ok(())
    }

    // =========================================================================
    // Tracks
    // =========================================================================

    fn list_tracks(&self) -> LibraryResult<Vec<Track>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.tracks.values().cloned().collect())
    }

    fn get_track(&self, id: &str) -> LibraryResult<Track> {
        let tables = self.inner.lock().unwrap();
        tables
            .tracks
            .get(id)
            .cloned()
            .ok_or(LibraryError::NotFound {
                what: "track",
                id: id.to_string(),
            })
    }

    fn create_track(&self, new: NewTrack) -> LibraryResult<Track> {
        validate_track(&new)?;
        let mut tables = self.inner.lock().unwrap();
        check_track_refs(&*tables, new.artist_id.as_deref(), new.album_id.as_deref())?;
        let track = Track {
            id: new_id(),
            name: new.name,
            duration_secs: new.duration_secs,
            artist_id: new.artist_id,
            album_id: new.album_id,
        };
        tables.tracks.insert(track.id.clone(), track.clone());
        Ok(track)
    }

    fn update_track(&self, id: &str, new: NewTrack) -> LibraryResult<Track> {
        validate_track(&new)?;
        let mut tables = self.inner.lock().unwrap();
        if !tables.tracks.contains_key(id) {
            return Err(LibraryError::NotFound {
                what: "track",
                id: id.to_string(),
            });
        }
        check_track_refs(&*tables, new.artist_id.as_deref(), new.album_id.as_deref())?;
        let track = tables.tracks.get_mut(id).unwrap();
        track.name = new.name;
        track.duration_secs = new.duration_secs;
        track.artist_id = new.artist_id;
        track.album_id = new.album_id;
        Ok(track.clone())
    }

    fn delete_track(&self, id: &str) -> LibraryResult<()> {
        let mut tables = self.inner.lock().unwrap();
        if tables.tracks.remove(id).is_none() {
            return Err(LibraryError::NotFound {
                what: "track",
                id: id.to_string(),
            });
        }
        tables.cascade_track_removed(id);
        Ok(())
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    fn add_favorite(&self, kind: FavoriteKind, id: &str) -> LibraryResult<()> {
        let mut tables = self.inner.lock().unwrap();
        if !tables.entity_exists(kind, id) {
            return Err(LibraryError::FavoriteTargetMissing {
                kind,
                id: id.to_string(),
            });
        }
        let set = tables.favorites.set_mut(kind);
        if !set.iter().any(|member| member == id) {
            set.push(id.to_string());
        }
        Ok(())
    }

    fn remove_favorite(&self, kind: FavoriteKind, id: &str) -> LibraryResult<()> {
        let mut tables = self.inner.lock().unwrap();
        let set = tables.favorites.set_mut(kind);
        let before = set.len();
        set.retain(|member| member != id);
        if set.len() == before {
            return Err(LibraryError::NotFound {
                what: "favorite",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn resolve_favorites(&self) -> LibraryResult<FavoritesView> {
        let tables = self.inner.lock().unwrap();
        Ok(FavoritesView {
            artists: tables
                .favorites
                .artists
                .iter()
                .filter_map(|id| tables.artists.get(id).cloned())
                .collect(),
            albums: tables
                .favorites
                .albums
                .iter()
                .filter_map(|id| tables.albums.get(id).cloned())
                .collect(),
            tracks: tables
                .favorites
                .tracks
                .iter()
                .filter_map(|id| tables.tracks.get(id).cloned())
                .collect(),
        })
    }
}
