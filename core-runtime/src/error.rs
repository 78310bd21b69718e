use bridge_traits::BridgeError;
use thiserror::Error;

/// Failures while assembling the core from its configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A bridge was neither injected nor derivable from a desktop default.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    /// A desktop default bridge could not be opened.
    #[error("Failed to open default {capability}: {source}")]
    DefaultBridge {
        capability: &'static str,
        #[source]
        source: BridgeError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
