//! Domain models for the offline library
//!
//! Records describe what has been downloaded; blobs hold the bytes. A track
//! is a shared resource: albums and playlists list track ids and never own
//! the bytes exclusively.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::catalog::{ArtistRef, AlbumRef};

// =============================================================================
// Records
// =============================================================================

/// A downloaded track. Immutable after creation except for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: String,
    pub name: String,
    pub artists: Vec<ArtistRef>,
    pub album: Option<AlbumRef>,
    pub duration_ms: u64,
    /// Length of the stored blob
    pub size_bytes: u64,
    /// Unix epoch milliseconds
    pub downloaded_at: i64,
    /// Key of the blob in the blob store
    pub storage_key: String,
}

impl TrackRecord {
    /// First artist name, or an empty string.
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(|a| a.name.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRecord {
    pub id: String,
    pub name: String,
    pub artists: Vec<ArtistRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Track ids in catalog order
    pub tracks: Vec<String>,
    /// Sum of constituent track sizes at download time
    pub size_bytes: u64,
    pub downloaded_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRecord {
    pub id: String,
    pub name: String,
    /// Display name of the playlist owner
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Track ids in catalog order
    pub tracks: Vec<String>,
    pub size_bytes: u64,
    pub downloaded_at: i64,
}

// =============================================================================
// Collections
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Album,
    Playlist,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Album => write!(f, "album"),
            CollectionKind::Playlist => write!(f, "playlist"),
        }
    }
}

/// Identifies one album or playlist in the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionRef {
    pub kind: CollectionKind,
    pub id: String,
}

impl CollectionRef {
    pub fn album(id: impl Into<String>) -> Self {
        Self {
            kind: CollectionKind::Album,
            id: id.into(),
        }
    }

    pub fn playlist(id: impl Into<String>) -> Self {
        Self {
            kind: CollectionKind::Playlist,
            id: id.into(),
        }
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A collection entry pointing at a track that is no longer in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub collection: CollectionRef,
    pub track_id: String,
}

// =============================================================================
// Library Index
// =============================================================================

/// Denormalized view of everything downloaded, persisted as one snapshot.
///
/// Every track id listed by an album or playlist is expected in `tracks`
/// while that collection exists. Direct track deletion may break this; see
/// [`LibraryIndex::dangling_references`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryIndex {
    #[serde(default)]
    pub tracks: BTreeMap<String, TrackRecord>,
    #[serde(default)]
    pub albums: BTreeMap<String, AlbumRecord>,
    #[serde(default)]
    pub playlists: BTreeMap<String, PlaylistRecord>,
}

impl LibraryIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.albums.is_empty() && self.playlists.is_empty()
    }

    /// Track ids of a collection, `None` when the collection is not indexed.
    pub fn collection_tracks(&self, collection: &CollectionRef) -> Option<&[String]> {
        match collection.kind {
            CollectionKind::Album => self.albums.get(&collection.id).map(|a| a.tracks.as_slice()),
            CollectionKind::Playlist => self
                .playlists
                .get(&collection.id)
                .map(|p| p.tracks.as_slice()),
        }
    }

    /// Whether any album or playlist other than `excluding` lists `track_id`.
    ///
    /// Scans every collection, so cost grows with the number of collections.
    pub fn is_referenced_elsewhere(&self, track_id: &str, excluding: &CollectionRef) -> bool {
        let in_albums = self.albums.iter().any(|(id, album)| {
            !(excluding.kind == CollectionKind::Album && id == &excluding.id)
                && album.tracks.iter().any(|t| t == track_id)
        });
        if in_albums {
            return true;
        }

        self.playlists.iter().any(|(id, playlist)| {
            !(excluding.kind == CollectionKind::Playlist && id == &excluding.id)
                && playlist.tracks.iter().any(|t| t == track_id)
        })
    }

    /// Collection entries whose track is missing from the track mapping.
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let albums = self.albums.iter().flat_map(|(id, album)| {
            album
                .tracks
                .iter()
                .map(move |t| (CollectionRef::album(id.clone()), t))
        });
        let playlists = self.playlists.iter().flat_map(|(id, playlist)| {
            playlist
                .tracks
                .iter()
                .map(move |t| (CollectionRef::playlist(id.clone()), t))
        });

        albums
            .chain(playlists)
            .filter(|(_, track_id)| !self.tracks.contains_key(track_id.as_str()))
            .map(|(collection, track_id)| DanglingReference {
                collection,
                track_id: track_id.clone(),
            })
            .collect()
    }

    /// Track ids that are in the index but referenced by no collection.
    pub fn standalone_tracks(&self) -> BTreeSet<&str> {
        let referenced: BTreeSet<&str> = self
            .albums
            .values()
            .flat_map(|a| a.tracks.iter())
            .chain(self.playlists.values().flat_map(|p| p.tracks.iter()))
            .map(String::as_str)
            .collect();

        self.tracks
            .keys()
            .map(String::as_str)
            .filter(|id| !referenced.contains(id))
            .collect()
    }

    /// Storage usage by category.
    ///
    /// `albums` and `playlists` overlap with `tracks`: every collection track
    /// is also in the track mapping. `total` counts the track mapping only,
    /// so each stored byte is counted once.
    pub fn cache_size(&self) -> CacheSize {
        let tracks: u64 = self.tracks.values().map(|t| t.size_bytes).sum();
        let albums: u64 = self.albums.values().map(|a| a.size_bytes).sum();
        let playlists: u64 = self.playlists.values().map(|p| p.size_bytes).sum();

        CacheSize {
            tracks,
            albums,
            playlists,
            total: tracks,
        }
    }
}

/// Byte counts per record category. See [`LibraryIndex::cache_size`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSize {
    pub tracks: u64,
    pub albums: u64,
    pub playlists: u64,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, size: u64) -> TrackRecord {
        TrackRecord {
            id: id.to_string(),
            name: format!("Track {}", id),
            artists: vec![ArtistRef::new("ar1", "Artist")],
            album: None,
            duration_ms: 180_000,
            size_bytes: size,
            downloaded_at: 0,
            storage_key: id.to_string(),
        }
    }

    fn album(id: &str, tracks: &[&str], size: u64) -> AlbumRecord {
        AlbumRecord {
            id: id.to_string(),
            name: format!("Album {}", id),
            artists: vec![],
            release_date: None,
            image_url: None,
            tracks: tracks.iter().map(|t| t.to_string()).collect(),
            size_bytes: size,
            downloaded_at: 0,
        }
    }

    fn playlist(id: &str, tracks: &[&str], size: u64) -> PlaylistRecord {
        PlaylistRecord {
            id: id.to_string(),
            name: format!("Playlist {}", id),
            owner: "me".to_string(),
            description: None,
            image_url: None,
            tracks: tracks.iter().map(|t| t.to_string()).collect(),
            size_bytes: size,
            downloaded_at: 0,
        }
    }

    fn shared_index() -> LibraryIndex {
        let mut index = LibraryIndex::empty();
        for (id, size) in [("t1", 10), ("t2", 20), ("t3", 30)] {
            index.tracks.insert(id.to_string(), track(id, size));
        }
        index.albums.insert("a1".into(), album("a1", &["t1", "t2"], 30));
        index
            .playlists
            .insert("p1".into(), playlist("p1", &["t2", "t3"], 50));
        index
    }

    #[test]
    fn test_empty_index_serializes_to_three_maps() {
        let json = serde_json::to_value(LibraryIndex::empty()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"tracks": {}, "albums": {}, "playlists": {}})
        );
    }

    #[test]
    fn test_missing_maps_deserialize_as_empty() {
        let index: LibraryIndex = serde_json::from_str(r#"{"tracks": {}}"#).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_reference_excludes_the_collection_being_deleted() {
        let index = shared_index();

        // t1 only lives in a1
        assert!(!index.is_referenced_elsewhere("t1", &CollectionRef::album("a1")));
        // t2 is also in p1
        assert!(index.is_referenced_elsewhere("t2", &CollectionRef::album("a1")));
        assert!(index.is_referenced_elsewhere("t2", &CollectionRef::playlist("p1")));
        // t3 only lives in p1
        assert!(!index.is_referenced_elsewhere("t3", &CollectionRef::playlist("p1")));
    }

    #[test]
    fn test_album_with_same_id_as_playlist_is_not_excluded() {
        let mut index = shared_index();
        index.albums.insert("p1".into(), album("p1", &["t3"], 30));

        assert!(index.is_referenced_elsewhere("t3", &CollectionRef::playlist("p1")));
    }

    #[test]
    fn test_dangling_references_after_direct_delete() {
        let mut index = shared_index();
        index.tracks.remove("t2");

        let dangling = index.dangling_references();
        assert_eq!(dangling.len(), 2);
        assert!(dangling
            .iter()
            .all(|d| d.track_id == "t2"));
        assert!(dangling
            .iter()
            .any(|d| d.collection == CollectionRef::playlist("p1")));
    }

    #[test]
    fn test_cache_size_total_counts_tracks_once() {
        let size = shared_index().cache_size();

        assert_eq!(size.tracks, 60);
        assert_eq!(size.albums, 30);
        assert_eq!(size.playlists, 50);
        assert_eq!(size.total, 60);
    }

    #[test]
    fn test_standalone_tracks() {
        let mut index = shared_index();
        index.tracks.insert("t4".into(), track("t4", 5));

        let standalone: Vec<&str> = index.standalone_tracks().into_iter().collect();
        assert_eq!(standalone, vec!["t4"]);
    }

    #[test]
    fn test_collection_ref_display() {
        assert_eq!(CollectionRef::album("x").to_string(), "album:x");
        assert_eq!(CollectionRef::playlist("y").to_string(), "playlist:y");
    }
}
