//! Shared runtime pieces of the offline library core: the validated
//! [`config::CoreConfig`], the [`events::EventBus`] every component
//! publishes on, and subscriber setup in [`logging`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
