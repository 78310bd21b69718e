//! Audio Output Abstraction
//!
//! Outputs are pull-based: the engine hands over a render callback and the
//! output invokes it whenever its device buffer needs filling.

use crate::error::Result;

/// Fills an interleaved `f32` buffer. Called from the output's own thread.
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// Sample layout the output consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
        }
    }
}

/// Host audio sink.
///
/// Implementations:
/// - Desktop: a cpal stream on the default device
/// - Headless: an output that never pulls
/// - Tests: an output pulled by hand
pub trait AudioOutput: Send + Sync {
    /// Format the render callback must produce.
    fn format(&self) -> OutputFormat;

    /// Begin pulling from `render`. Replaces any previously installed callback.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotAvailable`](crate::error::BridgeError::NotAvailable)
    /// when no device can be opened.
    fn start(&self, render: RenderCallback) -> Result<()>;

    /// Stop pulling and release the device. Idempotent.
    fn close(&self);
}
