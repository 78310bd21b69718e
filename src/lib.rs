//! Offline music library core.
//!
//! Host applications depend on this crate and enable the documented
//! features instead of wiring each workspace crate individually:
//!
//! - `desktop-shims` (default): file and SQLite stores plus a reqwest HTTP client
//! - `cpal-output`: play through the default audio device
//!
//! Everything is re-exported from `core-service`; start from
//! [`CoreService::builder`].

pub use core_service::*;
