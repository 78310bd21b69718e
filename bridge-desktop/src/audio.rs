//! Audio output on the default device using cpal
//!
//! `cpal::Stream` is not `Send`, so each started stream lives on a dedicated
//! thread that owns it until `close` is called.

use bridge_traits::{
    error::{BridgeError, Result},
    output::{AudioOutput, OutputFormat, RenderCallback},
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread::JoinHandle;
use tracing::{debug, error};

struct StreamThread {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct CpalOutput {
    format: OutputFormat,
    active: Mutex<Option<StreamThread>>,
}

impl CpalOutput {
    /// Probe the default output device for its preferred format.
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| BridgeError::NotAvailable("No output device available".to_string()))?;

        let config = device.default_output_config().map_err(|e| {
            BridgeError::NotAvailable(format!("Failed to get output config: {}", e))
        })?;

        let format = OutputFormat {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
        };
        debug!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate = format.sample_rate,
            channels = format.channels,
            "Probed audio device"
        );

        Ok(Self {
            format,
            active: Mutex::new(None),
        })
    }

    fn run_stream(
        format: OutputFormat,
        mut render: RenderCallback,
        ready: mpsc::Sender<Result<()>>,
        stop: mpsc::Receiver<()>,
    ) {
        let built = (|| -> Result<cpal::Stream> {
            let device = cpal::default_host().default_output_device().ok_or_else(|| {
                BridgeError::NotAvailable("No output device available".to_string())
            })?;
            let config = cpal::StreamConfig {
                channels: format.channels,
                sample_rate: cpal::SampleRate(format.sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };
            let stream = device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| render(data),
                    |err| error!("Audio stream error: {}", err),
                    None,
                )
                .map_err(|e| {
                    BridgeError::NotAvailable(format!("Failed to build output stream: {}", e))
                })?;
            stream
                .play()
                .map_err(|e| BridgeError::OperationFailed(format!("Failed to play stream: {}", e)))?;
            Ok(stream)
        })();

        match built {
            Ok(stream) => {
                let _ = ready.send(Ok(()));
                // Blocks until close() sends or drops the sender.
                let _ = stop.recv();
                drop(stream);
                debug!("Audio stream closed");
            }
            Err(e) => {
                let _ = ready.send(Err(e));
            }
        }
    }
}

impl AudioOutput for CpalOutput {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn start(&self, render: RenderCallback) -> Result<()> {
        self.close();

        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel();
        let format = self.format;

        let handle = std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || Self::run_stream(format, render, ready_tx, stop_rx))
            .map_err(BridgeError::Io)?;

        ready_rx.recv().map_err(|_| {
            BridgeError::OperationFailed("Audio thread exited during startup".to_string())
        })??;

        let mut active = self
            .active
            .lock()
            .map_err(|_| BridgeError::OperationFailed("Audio output lock poisoned".to_string()))?;
        *active = Some(StreamThread {
            stop: stop_tx,
            handle,
        });
        Ok(())
    }

    fn close(&self) {
        let thread = match self.active.lock() {
            Ok(mut active) => active.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(thread) = thread {
            let _ = thread.stop.send(());
            let _ = thread.handle.join();
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}
