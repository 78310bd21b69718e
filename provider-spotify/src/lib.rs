//! # Catalog Provider
//!
//! Web API client for the streaming catalog: track, album and playlist
//! lookups, search, and preview audio downloads. Implements the
//! `CatalogProvider` and `TrackFetcher` contracts from `core-library`.

pub mod connector;
pub mod error;
pub mod fetcher;
pub mod types;

pub use connector::{SpotifyConnector, API_BASE_URL};
pub use error::{Result, SpotifyError};
pub use fetcher::PreviewTrackFetcher;
