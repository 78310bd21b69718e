//! # Offline Content Module
//!
//! Downloads, indexes and deletes offline audio.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     ContentManager                     │
//! │  - download_track/album/playlist()     │
//! │  - delete_track/album/playlist()       │
//! │  - get_cache_size() / clear_all()      │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> CatalogProvider (track lists)
//!          ├──> TrackFetcher (audio bytes)
//!          ├──> BlobStore (bytes by track id)
//!          └──> LibraryStore (records + index)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::ContentManager;
//!
//! # async fn example(manager: &ContentManager) -> core_playback::Result<()> {
//! let album = manager.download_album("4aawyAB9vmqN3uQ7FjRGTy").await?;
//! println!("{} tracks, {} bytes", album.tracks.len(), album.size_bytes);
//!
//! let deletion = manager.delete_album(&album.id).await?;
//! println!("kept {} shared tracks", deletion.retained_tracks.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod manager;

pub use config::ContentManagerConfig;
pub use manager::{CollectionDeletion, ContentManager};
