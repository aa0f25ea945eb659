//! SQLite-backed library store.
//!
//! One write connection behind a mutex, a small round-robin pool of
//! read-only connections, WAL journaling. Reference validation runs against
//! the write connection before the insert or update it guards, so a write
//! can never observe a parent appearing or vanishing in between.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use super::error::{LibraryError, LibraryResult};
use super::models::*;
use super::schema::LIBRARY_VERSIONED_SCHEMAS;
use super::trait_def::LibraryStore;
use super::validation::{
    check_album_refs, check_track_refs, validate_album, validate_artist, validate_track,
    RefLookup,
};
use crate::sqlite_persistence::BASE_DB_VERSION;

pub struct SqliteLibraryStore {
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Vec<Arc<Mutex<Connection>>>,
    read_index: Arc<AtomicUsize>,
}

fn migrate_if_needed(conn: &mut Connection) -> Result<()> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    let latest_version = LIBRARY_VERSIONED_SCHEMAS.len() - 1;
    let latest_schema = &LIBRARY_VERSIONED_SCHEMAS[latest_version];

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        info!("Creating library db schema at version {}", latest_version);
        latest_schema.create(conn)?;
        return Ok(());
    }

    let mut current_version = if db_version < BASE_DB_VERSION as i64 {
        anyhow::bail!("library db has tables but no schema version, refusing to touch it");
    } else {
        (db_version - BASE_DB_VERSION as i64) as usize
    };

    if current_version >= latest_version {
        latest_schema.validate(conn)?;
        return Ok(());
    }

    let tx = conn.transaction()?;
    for schema in LIBRARY_VERSIONED_SCHEMAS.iter().skip(current_version + 1) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating library db from version {} to {}",
                current_version, schema.version
            );
            migration_fn(&tx)?;
            current_version = schema.version;
        }
    }
    tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
    tx.commit()?;
    Ok(())
}

/// Reference lookups over an open connection, for the write-side gate.
struct ConnRefs<'a>(&'a Connection);

impl ConnRefs<'_> {
    fn track_exists(&self, id: &str) -> LibraryResult<bool> {
        let found = self
            .0
            .query_row("SELECT 1 FROM tracks WHERE id = ?1", params![id], |_| {
                Ok(())
            })
            .optional()
            .map_err(LibraryError::from)?;
        Ok(found.is_some())
    }
}

impl RefLookup for ConnRefs<'_> {
    fn artist_exists(&self, id: &str) -> LibraryResult<bool> {
        let found = self
            .0
            .query_row("SELECT 1 FROM artists WHERE id = ?1", params![id], |_| {
                Ok(())
            })
            .optional()
            .map_err(LibraryError::from)?;
        Ok(found.is_some())
    }

    fn album_exists(&self, id: &str) -> LibraryResult<bool> {
        let found = self
            .0
            .query_row("SELECT 1 FROM albums WHERE id = ?1", params![id], |_| {
                Ok(())
            })
            .optional()
            .map_err(LibraryError::from)?;
        Ok(found.is_some())
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn parse_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        login: row.get(1)?,
        password_hash: row.get(2)?,
        version: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn parse_artist_row(row: &rusqlite::Row) -> rusqlite::Result<Artist> {
    Ok(Artist {
        id: row.get(0)?,
        name: row.get(1)?,
        grammy: row.get::<_, i32>(2)? != 0,
    })
}

fn parse_album_row(row: &rusqlite::Row) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        name: row.get(1)?,
        year: row.get(2)?,
        artist_id: row.get(3)?,
    })
}

fn parse_track_row(row: &rusqlite::Row) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        name: row.get(1)?,
        duration_secs: row.get(2)?,
        artist_id: row.get(3)?,
        album_id: row.get(4)?,
    })
}

const USER_COLUMNS: &str = "id, login, password_hash, version, created_at, updated_at";

impl SqliteLibraryStore {
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open library database")?;

        migrate_if_needed(&mut write_conn)?;

        write_conn.pragma_update(None, "journal_mode", "WAL")?;
        // PRAGMA foreign_keys is per-connection, it must be re-enabled on
        // every open or the SET NULL / CASCADE actions silently stop firing.
        write_conn.execute("PRAGMA foreign_keys = ON;", [])?;

        let artist_count: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM artists", [], |r| r.get(0))
            .unwrap_or(0);
        let album_count: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM albums", [], |r| r.get(0))
            .unwrap_or(0);
        let track_count: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))
            .unwrap_or(0);

        info!(
            "Opened library: {} artists, {} albums, {} tracks",
            artist_count, album_count, track_count
        );

        // The round-robin index math requires a non-empty pool.
        let read_pool_size = read_pool_size.max(1);
        let mut read_pool = Vec::with_capacity(read_pool_size);
        for _ in 0..read_pool_size {
            let read_conn = Connection::open_with_flags(
                db_path_ref,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_conn.pragma_update(None, "journal_mode", "WAL")?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        Ok(SqliteLibraryStore {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    /// Run a multi-statement write inside a single immediate transaction,
    /// rolling back on any error.
    fn in_write_tx<T>(
        &self,
        f: impl FnOnce(&Connection) -> LibraryResult<T>,
    ) -> LibraryResult<T> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute("BEGIN IMMEDIATE", [])
            .map_err(LibraryError::from)?;
        match f(&conn) {
            Ok(value) => {
                conn.execute("COMMIT", []).map_err(LibraryError::from)?;
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    fn favorite_table(kind: FavoriteKind) -> (&'static str, &'static str) {
        match kind {
            FavoriteKind::Artist => ("favorite_artists", "artist_id"),
            FavoriteKind::Album => ("favorite_albums", "album_id"),
            FavoriteKind::Track => ("favorite_tracks", "track_id"),
        }
    }
}

impl LibraryStore for SqliteLibraryStore {
    // =========================================================================
    // Users
    // =========================================================================

    fn list_users(&self) -> LibraryResult<Vec<User>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached(&format!("SELECT {} FROM users", USER_COLUMNS))
            .map_err(LibraryError::from)?;
        let users = stmt
            .query_map([], parse_user_row)
            .map_err(LibraryError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(LibraryError::from)?;
        Ok(users)
    }

    fn get_user(&self, id: &str) -> LibraryResult<User> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            parse_user_row,
        )
        .optional()
        .map_err(LibraryError::from)?
        .ok_or(LibraryError::NotFound {
            what: "user",
            id: id.to_string(),
        })
    }

    fn get_user_by_login(&self, login: &str) -> LibraryResult<Option<User>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE login = ?1", USER_COLUMNS),
            params![login],
            parse_user_row,
        )
        .optional()
        .map_err(LibraryError::from)
    }

    fn create_user(&self, login: &str, password_hash: &str) -> LibraryResult<User> {
        if login.trim().is_empty() {
            return Err(LibraryError::EmptyField { field: "login" });
        }
        self.in_write_tx(|conn| {
            let taken = conn
                .query_row(
                    "SELECT 1 FROM users WHERE login = ?1",
                    params![login],
                    |_| Ok(()),
                )
                .optional()
                .map_err(LibraryError::from)?
                .is_some();
            if taken {
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
            conn.execute(
                "INSERT INTO users (id, login, password_hash, version, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id,
                    user.login,
                    user.password_hash,
                    user.version,
                    user.created_at,
                    user.updated_at
                ],
            )?;
            Ok(user)
        })
    }

    fn update_user_password(&self, id: &str, password_hash: &str) -> LibraryResult<User> {
        self.in_write_tx(|conn| {
            let affected = conn.execute(
                "UPDATE users SET password_hash = ?1, version = version + 1, updated_at = ?2 \
                 WHERE id = ?3",
                params![password_hash, now_millis(), id],
            )?;
            if affected == 0 {
                return Err(LibraryError::NotFound {
                    what: "user",
                    id: id.to_string(),
                });
            }
            conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                parse_user_row,
            )
            .map_err(LibraryError::from)
        })
    }

    fn delete_user(&self, id: &str) -> LibraryResult<()> {
        let conn = self.write_conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(LibraryError::NotFound {
                what: "user",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Artists
    // =========================================================================

    fn list_artists(&self) -> LibraryResult<Vec<Artist>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached("SELECT id, name, grammy FROM artists")
            .map_err(LibraryError::from)?;
        let artists = stmt
            .query_map([], parse_artist_row)
            .map_err(LibraryError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(LibraryError::from)?;
        Ok(artists)
    }

    fn get_artist(&self, id: &str) -> LibraryResult<Artist> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, grammy FROM artists WHERE id = ?1",
            params![id],
            parse_artist_row,
        )
        .optional()
        .map_err(LibraryError::from)?
        .ok_or(LibraryError::NotFound {
            what: "artist",
            id: id.to_string(),
        })
    }

    fn create_artist(&self, new: NewArtist) -> LibraryResult<Artist> {
        validate_artist(&new)?;
        let conn = self.write_conn.lock().unwrap();
        let artist = Artist {
            id: new_id(),
            name: new.name,
            grammy: new.grammy,
        };
        conn.execute(
            "INSERT INTO artists (id, name, grammy) VALUES (?1, ?2, ?3)",
            params![artist.id, artist.name, artist.grammy as i32],
        )?;
        Ok(artist)
    }

    fn update_artist(&self, id: &str, new: NewArtist) -> LibraryResult<Artist> {
        validate_artist(&new)?;
        let conn = self.write_conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE artists SET name = ?1, grammy = ?2 WHERE id = ?3",
            params![new.name, new.grammy as i32, id],
        )?;
        if affected == 0 {
            return Err(LibraryError::NotFound {
                what: "artist",
                id: id.to_string(),
            });
        }
        Ok(Artist {
            id: id.to_string(),
            name: new.name,
            grammy: new.grammy,
        })
    }

    fn delete_artist(&self, id: &str) -> LibraryResult<()> {
        let conn = self.write_conn.lock().unwrap();
        // SET NULL on albums/tracks and CASCADE on favorite_artists run
        // inside this one statement.
        let affected = conn.execute("DELETE FROM artists WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(LibraryError::NotFound {
                what: "artist",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Albums
    // =========================================================================

    fn list_albums(&self) -> LibraryResult<Vec<Album>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached("SELECT id, name, year, artist_id FROM albums")
            .map_err(LibraryError::from)?;
        let albums = stmt
            .query_map([], parse_album_row)
            .map_err(LibraryError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(LibraryError::from)?;
        Ok(albums)
    }

    fn get_album(&self, id: &str) -> LibraryResult<Album> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, year, artist_id FROM albums WHERE id = ?1",
            params![id],
            parse_album_row,
        )
        .optional()
        .map_err(LibraryError::from)?
        .ok_or(LibraryError::NotFound {
            what: "album",
            id: id.to_string(),
        })
    }

    fn create_album(&self, new: NewAlbum) -> LibraryResult<Album> {
        validate_album(&new)?;
        self.in_write_tx(|conn| {
            check_album_refs(&ConnRefs(conn), new.artist_id.as_deref())?;
            let album = Album {
                id: new_id(),
                name: new.name.clone(),
                year: new.year,
                artist_id: new.artist_id.clone(),
            };
            conn.execute(
                "INSERT INTO albums (id, name, year, artist_id) VALUES (?1, ?2, ?3, ?4)",
                params![album.id, album.name, album.year, album.artist_id],
            )?;
            Ok(album)
        })
    }

    fn update_album(&self, id: &str, new: NewAlbum) -> LibraryResult<Album> {
        validate_album(&new)?;
        self.in_write_tx(|conn| {
            // Existence of the target row outranks its reference errors.
            if !ConnRefs(conn).album_exists(id)? {
                return Err(LibraryError::NotFound {
                    what: "album",
                    id: id.to_string(),
                });
            }
            check_album_refs(&ConnRefs(conn), new.artist_id.as_deref())?;
            conn.execute(
                "UPDATE albums SET name = ?1, year = ?2, artist_id = ?3 WHERE id = ?4",
                params![new.name, new.year, new.artist_id, id],
            )?;
            Ok(Album {
                id: id.to_string(),
                name: new.name.clone(),
                year: new.year,
                artist_id: new.artist_id.clone(),
            })
        })
    }

    fn delete_album(&self, id: &str) -> LibraryResult<()> {
        let conn = self.write_conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM albums WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(LibraryError::NotFound {
                what: "album",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Tracks
    // =========================================================================

    fn list_tracks(&self) -> LibraryResult<Vec<Track>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached("SELECT id, name, duration_secs, artist_id, album_id FROM tracks")
            .map_err(LibraryError::from)?;
        let tracks = stmt
            .query_map([], parse_track_row)
            .map_err(LibraryError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(LibraryError::from)?;
        Ok(tracks)
    }

    fn get_track(&self, id: &str) -> LibraryResult<Track> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, duration_secs, artist_id, album_id FROM tracks WHERE id = ?1",
            params![id],
            parse_track_row,
        )
        .optional()
        .map_err(LibraryError::from)?
        .ok_or(LibraryError::NotFound {
            what: "track",
            id: id.to_string(),
        })
    }

    fn create_track(&self, new: NewTrack) -> LibraryResult<Track> {
        validate_track(&new)?;
        self.in_write_tx(|conn| {
            check_track_refs(
                &ConnRefs(conn),
                new.artist_id.as_deref(),
                new.album_id.as_deref(),
            )?;
            let track = Track {
                id: new_id(),
                name: new.name.clone(),
                duration_secs: new.duration_secs,
                artist_id: new.artist_id.clone(),
                album_id: new.album_id.clone(),
            };
            conn.execute(
                "INSERT INTO tracks (id, name, duration_secs, artist_id, album_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    track.id,
                    track.name,
                    track.duration_secs,
                    track.artist_id,
                    track.album_id
                ],
            )?;
            Ok(track)
        })
    }

    fn update_track(&self, id: &str, new: NewTrack) -> LibraryResult<Track> {
        validate_track(&new)?;
        self.in_write_tx(|conn| {
            if !ConnRefs(conn).track_exists(id)? {
                return Err(LibraryError::NotFound {
                    what: "track",
                    id: id.to_string(),
                });
            }
            check_track_refs(
                &ConnRefs(conn),
                new.artist_id.as_deref(),
                new.album_id.as_deref(),
            )?;
            conn.execute(
                "UPDATE tracks SET name = ?1, duration_secs = ?2, artist_id = ?3, album_id = ?4 \
                 WHERE id = ?5",
                params![new.name, new.duration_secs, new.artist_id, new.album_id, id],
            )?;
            Ok(Track {
                id: id.to_string(),
                name: new.name.clone(),
                duration_secs: new.duration_secs,
                artist_id: new.artist_id.clone(),
                album_id: new.album_id.clone(),
            })
        })
    }

    fn delete_track(&self, id: &str) -> LibraryResult<()> {
        let conn = self.write_conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM tracks WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(LibraryError::NotFound {
                what: "track",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    fn add_favorite(&self, kind: FavoriteKind, id: &str) -> LibraryResult<()> {
        let (table, column) = Self::favorite_table(kind);
        self.in_write_tx(|conn| {
            let exists = match kind {
                FavoriteKind::Artist => ConnRefs(conn).artist_exists(id)?,
                FavoriteKind::Album => ConnRefs(conn).album_exists(id)?,
                FavoriteKind::Track => ConnRefs(conn).track_exists(id)?,
            };
            if !exists {
                return Err(LibraryError::FavoriteTargetMissing {
                    kind,
                    id: id.to_string(),
                });
            }
            conn.execute(
                &format!("INSERT OR IGNORE INTO {} ({}) VALUES (?1)", table, column),
                params![id],
            )?;
            Ok(())
        })
    }

    fn remove_favorite(&self, kind: FavoriteKind, id: &str) -> LibraryResult<()> {
        let (table, column) = Self::favorite_table(kind);
        let conn = self.write_conn.lock().unwrap();
        let affected = conn.execute(
            &format!("DELETE FROM {} WHERE {} = ?1", table, column),
            params![id],
        )?;
        if affected == 0 {
            return Err(LibraryError::NotFound {
                what: "favorite",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn resolve_favorites(&self) -> LibraryResult<FavoritesView> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let mut stmt = conn
            .prepare_cached(
                "SELECT a.id, a.name, a.grammy FROM favorite_artists f \
                 JOIN artists a ON a.id = f.artist_id ORDER BY f.rowid",
            )
            .map_err(LibraryError::from)?;
        let artists = stmt
            .query_map([], parse_artist_row)
            .map_err(LibraryError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(LibraryError::from)?;

        let mut stmt = conn
            .prepare_cached(
                "SELECT a.id, a.name, a.year, a.artist_id FROM favorite_albums f \
                 JOIN albums a ON a.id = f.album_id ORDER BY f.rowid",
            )
            .map_err(LibraryError::from)?;
        let albums = stmt
            .query_map([], parse_album_row)
            .map_err(LibraryError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(LibraryError::from)?;

        let mut stmt = conn
            .prepare_cached(
                "SELECT t.id, t.name, t.duration_secs, t.artist_id, t.album_id \
                 FROM favorite_tracks f \
                 JOIN tracks t ON t.id = f.track_id ORDER BY f.rowid",
            )
            .map_err(LibraryError::from)?;
        let tracks = stmt
            .query_map([], parse_track_row)
            .map_err(LibraryError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(LibraryError::from)?;

        Ok(FavoritesView {
            artists,
            albums,
            tracks,
        })
    }
}
