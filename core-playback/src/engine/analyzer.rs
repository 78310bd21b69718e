//! Frequency analyzer for visualization.
//!
//! Keeps the most recent `fft_size` post-gain samples (channels averaged).
//! Each poll windows them with a Blackman window, runs a forward FFT,
//! smooths magnitudes against the previous poll and maps decibels in
//! `[min_db, max_db]` onto `0..=255`.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

pub struct Analyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    history: Vec<f32>,
    write_pos: usize,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_db", &self.min_db)
            .field("max_db", &self.max_db)
            .finish()
    }
}

impl Analyzer {
    /// `fft_size` must be a power of two; callers validate it up front.
    pub fn new(fft_size: usize, smoothing: f32, min_db: f32, max_db: f32) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        Self {
            fft,
            fft_size,
            window: blackman(fft_size),
            history: vec![0.0; fft_size],
            write_pos: 0,
            smoothing,
            min_db,
            max_db,
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Append interleaved frames, averaging channels to mono.
    pub fn push_interleaved(&mut self, samples: &[f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for frame in samples.chunks_exact(channels) {
            let mono = frame.iter().sum::<f32>() / channels as f32;
            self.history[self.write_pos] = mono;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// Smoothed magnitudes in dB, one per bin.
    pub fn float_frequency_data(&mut self) -> Vec<f32> {
        self.update_smoothed();
        self.smoothed
            .iter()
            .map(|&m| if m > 0.0 { 20.0 * m.log10() } else { f32::NEG_INFINITY })
            .collect()
    }

    /// Smoothed magnitudes scaled to bytes, one per bin.
    pub fn frequency_data(&mut self) -> Vec<u8> {
        let range = self.max_db - self.min_db;
        let (min_db, max_db) = (self.min_db, self.max_db);
        self.float_frequency_data()
            .into_iter()
            .map(|db| {
                if db <= min_db {
                    0
                } else if db >= max_db {
                    255
                } else {
                    (255.0 * (db - min_db) / range) as u8
                }
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
        self.write_pos = 0;
    }

    fn update_smoothed(&mut self) {
        // Oldest sample first.
        for i in 0..self.fft_size {
            let sample = self.history[(self.write_pos + i) % self.fft_size];
            self.scratch[i] = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (bin, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[bin].norm() * scale;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
        }
    }
}

fn blackman(size: usize) -> Vec<f32> {
    const ALPHA: f32 = 0.16;
    let a0 = (1.0 - ALPHA) / 2.0;
    let a1 = 0.5;
    let a2 = ALPHA / 2.0;
    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, sample_rate: f32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_silence_maps_to_zero() {
        let mut analyzer = Analyzer::new(256, 0.8, -100.0, -30.0);
        analyzer.push_interleaved(&[0.0; 512], 2);
        let data = analyzer.frequency_data();
        assert_eq!(data.len(), 128);
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let mut analyzer = Analyzer::new(256, 0.0, -100.0, -30.0);
        // 32 cycles per 256 samples lands exactly on bin 32.
        analyzer.push_interleaved(&sine(32.0 * 44_100.0 / 256.0, 44_100.0, 256), 1);
        let db = analyzer.float_frequency_data();

        let peak = db
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 32);
        assert!(db[100] < db[32] - 40.0);
    }

    #[test]
    fn test_smoothing_decays_towards_silence() {
        let mut analyzer = Analyzer::new(256, 0.8, -100.0, -30.0);
        analyzer.push_interleaved(&sine(2_000.0, 44_100.0, 256), 1);
        let loud = analyzer.float_frequency_data();

        analyzer.push_interleaved(&[0.0; 256], 1);
        let fading = analyzer.float_frequency_data();

        let bin = 12;
        assert!(fading[bin] < loud[bin]);
        assert!(fading[bin] > f32::NEG_INFINITY);
    }

    #[test]
    fn test_blackman_window_shape() {
        let window = blackman(256);
        assert!(window[0].abs() < 1e-6);
        assert!((window[128] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut analyzer = Analyzer::new(64, 0.5, -100.0, -30.0);
        analyzer.push_interleaved(&sine(1_000.0, 8_000.0, 64), 1);
        analyzer.reset();
        assert!(analyzer.frequency_data().iter().all(|&b| b == 0));
    }
}
