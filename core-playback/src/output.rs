//! Audio outputs that need no device.
//!
//! [`NullOutput`] accepts a render callback and never calls it, so the
//! engine runs headless. [`ManualOutput`] hands control to the caller, who
//! pulls frames explicitly.

use bridge_traits::error::Result;
use bridge_traits::output::{AudioOutput, OutputFormat, RenderCallback};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Output that never pulls.
#[derive(Debug, Default)]
pub struct NullOutput {
    format: OutputFormat,
}

impl NullOutput {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl AudioOutput for NullOutput {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn start(&self, _render: RenderCallback) -> Result<()> {
        Ok(())
    }

    fn close(&self) {}
}

/// Output pulled by hand, for tests and hosts with their own audio clock.
#[derive(Default)]
pub struct ManualOutput {
    format: OutputFormat,
    render: Mutex<Option<RenderCallback>>,
    starts: AtomicUsize,
}

impl ManualOutput {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Render `frames` frames. Silence when no callback is installed.
    pub fn pull(&self, frames: usize) -> Vec<f32> {
        let mut buffer = vec![0.0; frames * self.format.channels as usize];
        if let Some(render) = self.render.lock().as_mut() {
            render(&mut buffer);
        }
        buffer
    }

    /// Pull `duration` worth of frames in blocks of `block_frames`.
    pub fn pull_for(&self, duration: std::time::Duration, block_frames: usize) {
        let total = (duration.as_secs_f64() * self.format.sample_rate as f64).ceil() as usize;
        let block = block_frames.max(1);
        let mut pulled = 0;
        while pulled < total {
            let frames = block.min(total - pulled);
            self.pull(frames);
            pulled += frames;
        }
    }

    pub fn is_started(&self) -> bool {
        self.render.lock().is_some()
    }

    /// How many times `start` was called.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl AudioOutput for ManualOutput {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn start(&self, render: RenderCallback) -> Result<()> {
        *self.render.lock() = Some(render);
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {
        self.render.lock().take();
    }
}
