//! Web API response types
//!
//! Data structures for deserializing catalog responses, with conversions to
//! the provider-neutral catalog types. Unknown fields are ignored.

use core_library::{
    AlbumRef, ArtistRef, CatalogAlbum, CatalogArtist, CatalogPlaylist, CatalogTrack,
    CollectionSummary, SearchResults,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

/// First image is the largest.
fn first_image(images: &[Image]) -> Option<String> {
    images.first().map(|i| i.url.clone())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

impl From<&Artist> for ArtistRef {
    fn from(artist: &Artist) -> Self {
        ArtistRef::new(artist.id.clone(), artist.name.clone())
    }
}

impl From<Artist> for CatalogArtist {
    fn from(artist: Artist) -> Self {
        CatalogArtist {
            image_url: first_image(&artist.images),
            id: artist.id,
            name: artist.name,
            genres: artist.genres,
        }
    }
}

/// Paging object wrapping list results.
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u32,
    /// URL of the next page
    #[serde(default)]
    pub next: Option<String>,
}

/// Album object. Tracks are present only on the full album endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub total_tracks: u32,
    #[serde(default)]
    pub tracks: Option<Paging<Track>>,
}

impl Album {
    pub fn to_ref(&self) -> AlbumRef {
        AlbumRef {
            id: self.id.clone(),
            name: self.name.clone(),
            release_date: self.release_date.clone(),
            image_url: first_image(&self.images),
        }
    }

    pub fn summary(&self) -> CollectionSummary {
        CollectionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            subtitle: self
                .artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            image_url: first_image(&self.images),
            track_count: self.total_tracks,
        }
    }

    /// Convert with an already collected track list. Album track objects
    /// omit the album, so it is filled in here.
    pub fn into_catalog(self, tracks: Vec<Track>) -> CatalogAlbum {
        let album_ref = self.to_ref();
        CatalogAlbum {
            artists: self.artists.iter().map(ArtistRef::from).collect(),
            release_date: self.release_date.clone(),
            image_url: first_image(&self.images),
            id: self.id,
            name: self.name,
            tracks: tracks
                .into_iter()
                .filter_map(|t| t.into_catalog())
                .map(|mut t| {
                    t.album.get_or_insert_with(|| album_ref.clone());
                    t
                })
                .collect(),
        }
    }
}

/// Track object. `id` is absent for local files, which are skipped.
#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: Option<Album>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub track_number: Option<u32>,
    #[serde(default)]
    pub popularity: Option<u32>,
}

impl Track {
    pub fn into_catalog(self) -> Option<CatalogTrack> {
        let id = self.id?;
        Some(CatalogTrack {
            id,
            name: self.name,
            artists: self.artists.iter().map(ArtistRef::from).collect(),
            album: self.album.as_ref().map(Album::to_ref),
            duration_ms: self.duration_ms,
            preview_url: self.preview_url,
            explicit: self.explicit,
            track_number: self.track_number,
            popularity: self.popularity,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Owner {
    pub fn label(&self) -> String {
        self.display_name.clone().unwrap_or_else(|| self.id.clone())
    }
}

/// Playlist entry. `track` is null for removed or unavailable items.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub track: Option<Track>,
}

/// Playlist tracks: a full paging object on the playlist endpoint, only a
/// total in search results.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistTracks {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<Image>>,
    pub owner: Owner,
    #[serde(default)]
    pub tracks: Option<PlaylistTracks>,
}

impl Playlist {
    fn image_url(&self) -> Option<String> {
        self.images.as_deref().and_then(first_image)
    }

    pub fn summary(&self) -> CollectionSummary {
        CollectionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            subtitle: self.owner.label(),
            image_url: self.image_url(),
            track_count: self.tracks.as_ref().map(|t| t.total).unwrap_or(0),
        }
    }

    pub fn into_catalog(self, items: Vec<PlaylistItem>) -> CatalogPlaylist {
        CatalogPlaylist {
            image_url: self.image_url(),
            owner: self.owner.label(),
            description: self.description.filter(|d| !d.is_empty()),
            id: self.id,
            name: self.name,
            tracks: items
                .into_iter()
                .filter_map(|item| item.track)
                .filter_map(Track::into_catalog)
                .collect(),
        }
    }
}

/// Search endpoint response. Each category is present only when requested.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub tracks: Option<Paging<Track>>,
    #[serde(default)]
    pub albums: Option<Paging<Album>>,
    #[serde(default)]
    pub artists: Option<Paging<Artist>>,
    /// Search may return null entries for playlists
    #[serde(default)]
    pub playlists: Option<Paging<Option<Playlist>>>,
}

impl From<SearchResponse> for SearchResults {
    fn from(response: SearchResponse) -> Self {
        SearchResults {
            tracks: response
                .tracks
                .map(|p| p.items.into_iter().filter_map(Track::into_catalog).collect())
                .unwrap_or_default(),
            albums: response
                .albums
                .map(|p| p.items.iter().map(Album::summary).collect())
                .unwrap_or_default(),
            artists: response
                .artists
                .map(|p| p.items.into_iter().map(CatalogArtist::from).collect())
                .unwrap_or_default(),
            playlists: response
                .playlists
                .map(|p| p.items.iter().flatten().map(Playlist::summary).collect())
                .unwrap_or_default(),
        }
    }
}

/// Error body returned by the Web API.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub status: u16,
    #[serde(default)]
    pub message: String,
}
