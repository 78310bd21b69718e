//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux):
//! - `BlobStore` as one file per track using `tokio::fs`
//! - `MetadataStore` as a SQLite key-value table using `sqlx`
//! - `HttpClient` using `reqwest`
//! - `AudioOutput` using `cpal` (feature `cpal-output`)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileBlobStore, ReqwestHttpClient, SqliteMetadataStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let blobs = FileBlobStore::new("/tmp/offline/tracks".into());
//!     let metadata = SqliteMetadataStore::new("/tmp/offline/metadata.db".into()).await?;
//!     let http = ReqwestHttpClient::new()?;
//!     Ok(())
//! }
//! ```

mod blobs;
mod http;
mod metadata;

#[cfg(feature = "cpal-output")]
mod audio;

pub use blobs::FileBlobStore;
pub use http::ReqwestHttpClient;
pub use metadata::SqliteMetadataStore;

#[cfg(feature = "cpal-output")]
pub use audio::CpalOutput;
