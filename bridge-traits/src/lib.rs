//! # Host Bridge Traits
//!
//! Capabilities the offline library core needs from its host, expressed as
//! traits so each platform can ship its own adapter.
//!
//! ## Traits
//!
//! ### Storage
//! - [`BlobStore`](storage::BlobStore) - Raw audio payloads keyed by track id
//! - [`MetadataStore`](storage::MetadataStore) - JSON records and the library index
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP for catalog, token and audio fetches
//!
//! ### Audio
//! - [`AudioOutput`](output::AudioOutput) - Pull-based audio sink
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! In-memory stores live in [`memory`] for tests and throwaway libraries.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map host out-of-space conditions to `BridgeError::StorageFull` so the
//! core can report them distinctly.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across tasks
//! behind `Arc<dyn Trait>`.

pub mod error;
pub mod http;
pub mod memory;
pub mod output;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use memory::{MemoryBlobStore, MemoryMetadataStore};
pub use output::{AudioOutput, OutputFormat, RenderCallback};
pub use storage::{BlobStore, MetadataStore};
pub use time::{Clock, ManualClock, SystemClock};
