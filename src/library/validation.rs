//! Write-side validation: payload field checks and the reference gate.
//!
//! Every create and update goes through these functions before the adapter
//! touches its tables. The reference checks are the single place where a
//! foreign-key field is allowed to be judged valid; a null reference is
//! always valid, a non-null one must name a currently existing record.

use super::error::{LibraryError, LibraryResult};
use super::models::{NewAlbum, NewArtist, NewTrack};

/// Existence lookups the reference gate needs, implemented by each storage
/// adapter over whatever view of the data is consistent with the write
/// being validated (the locked tables, or the open transaction).
pub trait RefLookup {
    fn artist_exists(&self, id: &str) -> LibraryResult<bool>;
    fn album_exists(&self, id: &str) -> LibraryResult<bool>;
}

pub fn validate_artist(new: &NewArtist) -> LibraryResult<()> {
    if new.name.trim().is_empty() {
        return Err(LibraryError::EmptyField { field: "name" });
    }
    Ok(())
}

pub fn validate_album(new: &NewAlbum) -> LibraryResult<()> {
    if new.name.trim().is_empty() {
        return Err(LibraryError::EmptyField { field: "name" });
    }
    if new.year < 1 {
        return Err(LibraryError::NonPositiveValue {
            field: "year",
            value: new.year as i64,
        });
    }
    Ok(())
}

pub fn validate_track(new: &NewTrack) -> LibraryResult<()> {
    if new.name.trim().is_empty() {
        return Err(LibraryError::EmptyField { field: "name" });
    }
    if new.duration_secs < 1 {
        return Err(LibraryError::NonPositiveValue {
            field: "duration_secs",
            value: new.duration_secs as i64,
        });
    }
    Ok(())
}

/// Gate for `Album.artist_id`, applied on every create and every update.
pub fn check_album_refs<L: RefLookup + ?Sized>(
    refs: &L,
    artist_id: Option<&str>,
) -> LibraryResult<()> {
    if let Some(id) = artist_id {
        if !refs.artist_exists(id)? {
            return Err(LibraryError::BadReference {
                field: "artist_id",
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

/// Gate for `Track.artist_id` and `Track.album_id`, applied on every create
/// and every update.
pub fn check_track_refs<L: RefLookup + ?Sized>(
    refs: &L,
    artist_id: Option<&str>,
    album_id: Option<&str>,
) -> LibraryResult<()> {
    if let Some(id) = artist_id {
        if !refs.artist_exists(id)? {
            return Err(LibraryError::BadReference {
                field: "artist_id",
                id: id.to_string(),
            });
        }
    }
    if let Some(id) = album_id {
        if !refs.album_exists(id)? {
            return Err(LibraryError::BadReference {
                field: "album_id",
                id: id.to_string(),
            });
        }
    }
    Ok(())
}
