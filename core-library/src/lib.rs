//! # Offline Library Model
//!
//! Records, the denormalized library index and the typed store that
//! persists them, plus the catalog contracts used to resolve what to
//! download.
//!
//! ## Overview
//!
//! - [`models`]: `TrackRecord`, `AlbumRecord`, `PlaylistRecord`, `LibraryIndex`
//! - [`store`]: `LibraryStore` over a host `MetadataStore`
//! - [`catalog`]: catalog DTOs with `CatalogProvider` and `TrackFetcher`
//!
//! Tracks are shared between collections. Whether a track's bytes may be
//! removed is decided by scanning the index, see
//! [`LibraryIndex::is_referenced_elsewhere`].

pub mod catalog;
pub mod error;
pub mod models;
pub mod store;

pub use catalog::{
    AlbumRef, ArtistRef, CatalogAlbum, CatalogArtist, CatalogPlaylist, CatalogProvider,
    CatalogTrack, CollectionSummary, SearchResults, SearchType, TrackFetcher,
    DEFAULT_SEARCH_LIMIT,
};
pub use error::{CatalogError, CatalogResult, LibraryError, Result};
pub use models::{
    AlbumRecord, CacheSize, CollectionKind, CollectionRef, DanglingReference, LibraryIndex,
    PlaylistRecord, TrackRecord,
};
pub use store::{LibraryStore, LIBRARY_INDEX_KEY};
