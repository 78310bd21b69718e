//! Three-band equalizer built from RBJ cookbook biquads.
//!
//! | band | filter | frequency |
//! |---|---|---|
//! | bass | low shelf, slope 1 | 200 Hz |
//! | mid | peaking, Q = 1 | 1000 Hz |
//! | treble | high shelf, slope 1 | 3000 Hz |
//!
//! Bands run in that order. Each keeps one filter state per channel.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub const BASS_FREQUENCY_HZ: f64 = 200.0;
pub const MID_FREQUENCY_HZ: f64 = 1000.0;
pub const MID_Q: f64 = 1.0;
pub const TREBLE_FREQUENCY_HZ: f64 = 3000.0;

/// Band gains in dB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EqBands {
    pub bass_db: f32,
    pub mid_db: f32,
    pub treble_db: f32,
}

impl EqBands {
    pub fn new(bass_db: f32, mid_db: f32, treble_db: f32) -> Self {
        Self {
            bass_db,
            mid_db,
            treble_db,
        }
    }

    pub fn flat() -> Self {
        Self::default()
    }

    /// Each band clamped to `±limit_db`. NaN becomes 0.
    pub fn clamped(self, limit_db: f32) -> Self {
        let clamp = |v: f32| {
            if v.is_nan() {
                0.0
            } else {
                v.clamp(-limit_db, limit_db)
            }
        };
        Self::new(clamp(self.bass_db), clamp(self.mid_db), clamp(self.treble_db))
    }

    pub fn get(&self, band: EqBand) -> f32 {
        match band {
            EqBand::Bass => self.bass_db,
            EqBand::Mid => self.mid_db,
            EqBand::Treble => self.treble_db,
        }
    }

    pub fn with(mut self, band: EqBand, gain_db: f32) -> Self {
        match band {
            EqBand::Bass => self.bass_db = gain_db,
            EqBand::Mid => self.mid_db = gain_db,
            EqBand::Treble => self.treble_db = gain_db,
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqBand {
    Bass,
    Mid,
    Treble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterKind {
    LowShelf,
    Peaking,
    HighShelf,
}

/// Normalized coefficients, `a0 == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Coefficients {
    const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn design(kind: FilterKind, frequency: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        if sample_rate <= 0.0 || frequency <= 0.0 || frequency >= sample_rate / 2.0 {
            return Self::IDENTITY;
        }

        let a = 10f64.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * frequency / sample_rate;
        let (sin, cos) = w0.sin_cos();

        let (b0, b1, b2, a0, a1, a2) = match kind {
            FilterKind::Peaking => {
                let alpha = sin / (2.0 * q);
                (
                    1.0 + alpha * a,
                    -2.0 * cos,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos,
                    1.0 - alpha / a,
                )
            }
            FilterKind::LowShelf => {
                // Shelf slope S = 1
                let alpha = sin / 2.0 * 2f64.sqrt();
                let k = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos + k),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
                    a * ((a + 1.0) - (a - 1.0) * cos - k),
                    (a + 1.0) + (a - 1.0) * cos + k,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos),
                    (a + 1.0) + (a - 1.0) * cos - k,
                )
            }
            FilterKind::HighShelf => {
                let alpha = sin / 2.0 * 2f64.sqrt();
                let k = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos + k),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
                    a * ((a + 1.0) + (a - 1.0) * cos - k),
                    (a + 1.0) - (a - 1.0) * cos + k,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos),
                    (a + 1.0) - (a - 1.0) * cos - k,
                )
            }
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// One biquad stage in transposed direct form II.
#[derive(Debug, Clone)]
struct Biquad {
    kind: FilterKind,
    frequency: f64,
    q: f64,
    gain_db: f64,
    sample_rate: f64,
    coefficients: Coefficients,
    state: Vec<[f64; 2]>,
}

impl Biquad {
    fn new(kind: FilterKind, frequency: f64, q: f64) -> Self {
        Self {
            kind,
            frequency,
            q,
            gain_db: 0.0,
            sample_rate: 0.0,
            coefficients: Coefficients::IDENTITY,
            state: Vec::new(),
        }
    }

    fn redesign(&mut self) {
        self.coefficients =
            Coefficients::design(self.kind, self.frequency, self.q, self.gain_db, self.sample_rate);
    }

    fn set_gain(&mut self, gain_db: f32) {
        self.gain_db = gain_db as f64;
        self.redesign();
    }

    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        if self.sample_rate != sample_rate as f64 {
            self.sample_rate = sample_rate as f64;
            self.redesign();
        }
        if self.state.len() != channels {
            self.state = vec![[0.0; 2]; channels];
        }
    }

    fn reset(&mut self) {
        self.state.iter_mut().for_each(|s| *s = [0.0; 2]);
    }

    fn process(&mut self, input: f32, channel: usize) -> f32 {
        let Some(z) = self.state.get_mut(channel) else {
            return input;
        };
        let c = &self.coefficients;
        let x = input as f64;
        let y = c.b0 * x + z[0];
        z[0] = c.b1 * x - c.a1 * y + z[1];
        z[1] = c.b2 * x - c.a2 * y;
        y as f32
    }

    #[cfg(test)]
    fn response_db(&self, frequency: f64) -> f64 {
        let c = &self.coefficients;
        let w = 2.0 * PI * frequency / self.sample_rate;
        let (s1, c1) = w.sin_cos();
        let (s2, c2) = (2.0 * w).sin_cos();
        let num_re = c.b0 + c.b1 * c1 + c.b2 * c2;
        let num_im = -(c.b1 * s1 + c.b2 * s2);
        let den_re = 1.0 + c.a1 * c1 + c.a2 * c2;
        let den_im = -(c.a1 * s1 + c.a2 * s2);
        let magnitude = ((num_re * num_re + num_im * num_im)
            / (den_re * den_re + den_im * den_im))
            .sqrt();
        20.0 * magnitude.log10()
    }
}

/// Bass, mid and treble stages with a symmetric gain limit.
#[derive(Debug, Clone)]
pub struct Equalizer {
    bass: Biquad,
    mid: Biquad,
    treble: Biquad,
    bands: EqBands,
    limit_db: f32,
}

impl Equalizer {
    pub fn new(limit_db: f32) -> Self {
        Self {
            bass: Biquad::new(FilterKind::LowShelf, BASS_FREQUENCY_HZ, std::f64::consts::FRAC_1_SQRT_2),
            mid: Biquad::new(FilterKind::Peaking, MID_FREQUENCY_HZ, MID_Q),
            treble: Biquad::new(
                FilterKind::HighShelf,
                TREBLE_FREQUENCY_HZ,
                std::f64::consts::FRAC_1_SQRT_2,
            ),
            bands: EqBands::flat(),
            limit_db,
        }
    }

    pub fn bands(&self) -> EqBands {
        self.bands
    }

    /// Apply `bands` after clamping. Returns what was applied.
    pub fn set_bands(&mut self, bands: EqBands) -> EqBands {
        let bands = bands.clamped(self.limit_db);
        self.bass.set_gain(bands.bass_db);
        self.mid.set_gain(bands.mid_db);
        self.treble.set_gain(bands.treble_db);
        self.bands = bands;
        bands
    }

    /// Match filter state to the render format. Cheap when unchanged.
    pub fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.bass.prepare(sample_rate, channels);
        self.mid.prepare(sample_rate, channels);
        self.treble.prepare(sample_rate, channels);
    }

    /// Clear filter memory, e.g. when a new source starts.
    pub fn reset(&mut self) {
        self.bass.reset();
        self.mid.reset();
        self.treble.reset();
    }

    /// bass → mid → treble
    pub fn process(&mut self, sample: f32, channel: usize) -> f32 {
        let s = self.bass.process(sample, channel);
        let s = self.mid.process(s, channel);
        self.treble.process(s, channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(bands: EqBands) -> Equalizer {
        let mut eq = Equalizer::new(12.0);
        eq.prepare(48_000, 2);
        eq.set_bands(bands);
        eq
    }

    #[test]
    fn test_flat_eq_is_transparent() {
        let mut eq = prepared(EqBands::flat());
        for i in 0..64 {
            let x = (i as f32 * 0.37).sin();
            assert!((eq.process(x, 0) - x).abs() < 1e-6);
        }
    }

    #[test]
    fn test_band_gains_hit_their_frequencies() {
        let eq = prepared(EqBands::new(6.0, -4.0, 3.0));

        assert!((eq.mid.response_db(MID_FREQUENCY_HZ) + 4.0).abs() < 0.01);
        // Shelves reach full gain well past the corner
        assert!((eq.bass.response_db(20.0) - 6.0).abs() < 0.2);
        assert!((eq.treble.response_db(20_000.0) - 3.0).abs() < 0.2);
        // and half gain at it
        assert!((eq.bass.response_db(BASS_FREQUENCY_HZ) - 3.0).abs() < 0.2);
    }

    #[test]
    fn test_bands_are_clamped_to_limit() {
        let mut eq = Equalizer::new(12.0);
        let applied = eq.set_bands(EqBands::new(20.0, -15.0, f32::NAN));
        assert_eq!(applied, EqBands::new(12.0, -12.0, 0.0));
        assert_eq!(eq.bands(), applied);
    }

    #[test]
    fn test_band_order_of_setting_does_not_matter() {
        let bands = EqBands::flat()
            .with(EqBand::Treble, -2.0)
            .with(EqBand::Bass, 6.0)
            .with(EqBand::Mid, 0.0);
        assert_eq!(bands, EqBands::new(6.0, 0.0, -2.0));
        assert_eq!(bands.get(EqBand::Bass), 6.0);
    }

    #[test]
    fn test_channels_keep_separate_state() {
        let mut eq = prepared(EqBands::new(8.0, 0.0, 0.0));
        let left: Vec<f32> = (0..32).map(|_| eq.process(1.0, 0)).collect();
        let first_right = eq.process(1.0, 1);
        assert_eq!(first_right, left[0]);
    }

    #[test]
    fn test_unprepared_channel_passes_through() {
        let mut eq = Equalizer::new(12.0);
        eq.set_bands(EqBands::new(6.0, 6.0, 6.0));
        assert_eq!(eq.process(0.5, 3), 0.5);
    }
}
