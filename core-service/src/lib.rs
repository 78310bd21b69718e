//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridges (blob and metadata stores, HTTP,
//! audio output, clock) into the shared Rust core and hands the host one
//! [`CoreService`] per library. Desktop apps typically enable the
//! `desktop-shims` feature, which supplies file and SQLite stores under the
//! configured data directory; `cpal-output` adds a real audio device.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder()
//!     .data_dir("/home/me/.local/share/offline-music")
//!     .http_client(http)
//!     .build()?;
//! let core = CoreService::builder(config)
//!     .token_provider(tokens)
//!     .build()
//!     .await?;
//!
//! core.download_album("4aawyAB9vmqN3uQ7FjRGTy").await?;
//! core.play_album("4aawyAB9vmqN3uQ7FjRGTy").await?;
//! ```

mod builder;
pub mod error;
mod service;

pub use builder::CoreServiceBuilder;
pub use error::{Result, ServiceError};
pub use service::CoreService;

pub use core_auth;
pub use core_library;
pub use core_playback;
pub use core_runtime;
