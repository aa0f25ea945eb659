//! Domain models for the home music library.
//!
//! Entities carry plain owned data; the storage adapters in this module's
//! siblings are the only places allowed to mutate them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unix timestamp in milliseconds, used for the user audit fields.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A library user.
///
/// `password_hash` is an opaque secret and must never leave the process;
/// everything serialized outward goes through [`PublicUser`].
#[derive(Clone, Debug)]
pub struct User {
    pub id: String,
    pub login: String,
    pub password_hash: String,
    /// Starts at 1, incremented by exactly 1 on every successful password
    /// change and never on any other write.
    pub version: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// The outward-facing projection of a [`User`], without the secret.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub login: String,
    pub version: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        PublicUser {
            id: user.id.clone(),
            login: user.login.clone(),
            version: user.version,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub grammy: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub year: i32,
    /// Nullable reference to [`Artist`]; cleared when the artist is deleted.
    pub artist_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub duration_secs: i32,
    /// Nullable reference to [`Artist`]; cleared when the artist is deleted.
    pub artist_id: Option<String>,
    /// Nullable reference to [`Album`]; cleared when the album is deleted.
    pub album_id: Option<String>,
}

// =============================================================================
// Write payloads
// =============================================================================

/// Fields accepted when creating or fully replacing an artist.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewArtist {
    pub name: String,
    pub grammy: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewAlbum {
    pub name: String,
    pub year: i32,
    #[serde(default)]
    pub artist_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewTrack {
    pub name: String,
    pub duration_secs: i32,
    #[serde(default)]
    pub artist_id: Option<String>,
    #[serde(default)]
    pub album_id: Option<String>,
}

// =============================================================================
// Favorites
// =============================================================================

/// Which of the three favorites sets an id belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteKind {
    Artist,
    Album,
    Track,
}

impl FavoriteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FavoriteKind::Artist => "artist",
            FavoriteKind::Album => "album",
            FavoriteKind::Track => "track",
        }
    }

    pub fn parse(s: &str) -> Option<FavoriteKind> {
        match s {
            "artist" => Some(FavoriteKind::Artist),
            "album" => Some(FavoriteKind::Album),
            "track" => Some(FavoriteKind::Track),
            _ => None,
        }
    }
}

impl fmt::Display for FavoriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Favorites resolved to full entities, in insertion order.
///
/// Ids whose target no longer exists are dropped during resolution rather
/// than surfaced as errors.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct FavoritesView {
    pub artists: Vec<Artist>,
    pub albums: Vec<Album>,
    pub tracks: Vec<Track>,
}
