//! Catalog collaborator contracts
//!
//! The remote catalog supplies read-only metadata; the upstream fetcher
//! supplies audio bytes. Both are implemented by provider crates and mocked
//! in tests.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CatalogError, CatalogResult};

/// Default page size for catalog searches
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
}

impl ArtistRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A track as the catalog describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTrack {
    pub id: String,
    pub name: String,
    pub artists: Vec<ArtistRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<AlbumRef>,
    pub duration_ms: u64,
    /// Downloadable audio, when the catalog exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogAlbum {
    pub id: String,
    pub name: String,
    pub artists: Vec<ArtistRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Tracks in catalog order
    pub tracks: Vec<CatalogTrack>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPlaylist {
    pub id: String,
    pub name: String,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Tracks in catalog order
    pub tracks: Vec<CatalogTrack>,
}

/// Artist summary returned by searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Album or playlist summary returned by searches, without track lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub id: String,
    pub name: String,
    /// Artist names for albums, owner for playlists
    pub subtitle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub track_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub tracks: Vec<CatalogTrack>,
    #[serde(default)]
    pub albums: Vec<CollectionSummary>,
    #[serde(default)]
    pub artists: Vec<CatalogArtist>,
    #[serde(default)]
    pub playlists: Vec<CollectionSummary>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
            && self.albums.is_empty()
            && self.artists.is_empty()
            && self.playlists.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Track,
    Album,
    Artist,
    Playlist,
}

impl SearchType {
    pub const ALL: [SearchType; 4] = [
        SearchType::Track,
        SearchType::Album,
        SearchType::Artist,
        SearchType::Playlist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Track => "track",
            SearchType::Album => "album",
            SearchType::Artist => "artist",
            SearchType::Playlist => "playlist",
        }
    }

    /// Comma-joined form used in query strings.
    pub fn join(types: &[SearchType]) -> String {
        types
            .iter()
            .map(SearchType::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "track" => Ok(SearchType::Track),
            "album" => Ok(SearchType::Album),
            "artist" => Ok(SearchType::Artist),
            "playlist" => Ok(SearchType::Playlist),
            other => Err(CatalogError::InvalidResponse(format!(
                "unknown search type: {}",
                other
            ))),
        }
    }
}

/// Read-only access to the remote catalog.
///
/// Calls are idempotent; retrying is the caller's decision.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn get_track(&self, track_id: &str) -> CatalogResult<CatalogTrack>;

    async fn get_album(&self, album_id: &str) -> CatalogResult<CatalogAlbum>;

    async fn get_playlist(&self, playlist_id: &str) -> CatalogResult<CatalogPlaylist>;

    async fn search(
        &self,
        query: &str,
        types: &[SearchType],
        limit: u32,
    ) -> CatalogResult<SearchResults>;
}

/// Fetches the raw audio bytes for a catalog track.
#[async_trait]
pub trait TrackFetcher: Send + Sync {
    async fn fetch(&self, track: &CatalogTrack) -> CatalogResult<Bytes>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_type_join() {
        assert_eq!(
            SearchType::join(&[SearchType::Track, SearchType::Album]),
            "track,album"
        );
        assert_eq!(
            SearchType::join(&SearchType::ALL),
            "track,album,artist,playlist"
        );
    }

    #[test]
    fn test_search_type_parse() {
        assert_eq!("Track".parse::<SearchType>().unwrap(), SearchType::Track);
        assert_eq!(" playlist ".parse::<SearchType>().unwrap(), SearchType::Playlist);
        assert!("episode".parse::<SearchType>().is_err());
    }

    #[test]
    fn test_catalog_track_optional_fields_default() {
        let track: CatalogTrack = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "name": "Song",
            "artists": [{"id": "a", "name": "Someone"}],
            "duration_ms": 1000
        }))
        .unwrap();

        assert!(track.album.is_none());
        assert!(track.preview_url.is_none());
        assert!(!track.explicit);
    }
}
