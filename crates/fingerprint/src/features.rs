//! Feature extraction for acoustic event fingerprints.
//!
//! Computes a Hann-windowed magnitude spectrum of one block and summarizes it
//! as centroid, rolloff, zero-crossing rate, energy bands and log-energy
//! (cepstral) coefficients.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::{FingerprintError, Result};

pub const DEFAULT_WINDOW_SIZE: usize = 2048;
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Number of equal-width spectrum partitions summed into energy bands.
pub const ENERGY_BANDS: usize = 10;

/// Number of equal-width spectrum partitions turned into log energies.
pub const CEPSTRAL_COEFFS: usize = 13;

/// Label given to fingerprints of live audio.
pub const LIVE_LABEL: &str = "live";

const DEFAULT_ROLLOFF_FRACTION: f64 = 0.85;

/// Floor applied before taking the log of a partition sum.
const CEPSTRAL_FLOOR: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Analysis window length in samples (W).
    pub window_size: usize,
    /// Nominal sample rate of the incoming PCM, in Hz.
    pub sample_rate: u32,
    /// Fraction of total magnitude that defines the rolloff bin.
    pub rolloff_fraction: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            rolloff_fraction: DEFAULT_ROLLOFF_FRACTION,
        }
    }
}

/// Fingerprint of one analysis window. Never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    label: String,
    spectral_centroid: f64,
    spectral_rolloff: f64,
    zero_crossing_rate: f64,
    energy_bands: [f64; ENERGY_BANDS],
    cepstral_coeffs: [f64; CEPSTRAL_COEFFS],
}

impl FeatureVector {
    pub fn new(
        label: impl Into<String>,
        spectral_centroid: f64,
        spectral_rolloff: f64,
        zero_crossing_rate: f64,
        energy_bands: [f64; ENERGY_BANDS],
        cepstral_coeffs: [f64; CEPSTRAL_COEFFS],
    ) -> Self {
        Self {
            label: label.into(),
            spectral_centroid,
            spectral_rolloff,
            zero_crossing_rate,
            energy_bands,
            cepstral_coeffs,
        }
    }

    /// All-zero fingerprint, produced for empty input.
    pub fn zeroed(label: impl Into<String>) -> Self {
        Self::new(label, 0.0, 0.0, 0.0, [0.0; ENERGY_BANDS], [0.0; CEPSTRAL_COEFFS])
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Magnitude-weighted mean frequency in Hz.
    pub fn spectral_centroid(&self) -> f64 {
        self.spectral_centroid
    }

    /// Frequency in Hz below which the rolloff fraction of magnitude lies.
    pub fn spectral_rolloff(&self) -> f64 {
        self.spectral_rolloff
    }

    pub fn zero_crossing_rate(&self) -> f64 {
        self.zero_crossing_rate
    }

    pub fn energy_bands(&self) -> &[f64; ENERGY_BANDS] {
        &self.energy_bands
    }

    pub fn cepstral_coeffs(&self) -> &[f64; CEPSTRAL_COEFFS] {
        &self.cepstral_coeffs
    }

    /// Same features under a different label.
    pub fn relabeled(&self, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..self.clone()
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.spectral_centroid,
            self.spectral_rolloff,
            self.zero_crossing_rate,
        ]
        .iter()
        .chain(self.energy_bands.iter())
        .chain(self.cepstral_coeffs.iter())
        .all(|v| v.is_finite())
    }
}

/// Computes fingerprints for windows of a fixed size.
///
/// The FFT plan and Hann window are built once and reused for every call.
pub struct FeatureExtractor {
    config: ExtractorConfig,
    hann_window: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        if config.window_size < 2 {
            return Err(FingerprintError::InvalidConfig(format!(
                "window size must be at least 2, got {}",
                config.window_size
            )));
        }
        if config.sample_rate == 0 {
            return Err(FingerprintError::InvalidConfig(
                "sample rate must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.rolloff_fraction) {
            return Err(FingerprintError::InvalidConfig(format!(
                "rolloff fraction must be within [0, 1], got {}",
                config.rolloff_fraction
            )));
        }

        tracing::debug!(
            window_size = config.window_size,
            sample_rate = config.sample_rate,
            "planning feature extractor fft"
        );
        let mut planner = FftPlanner::<f64>::new();
        Ok(Self {
            config,
            hann_window: hann_window(config.window_size),
            fft: planner.plan_fft_forward(config.window_size),
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn window_size(&self) -> usize {
        self.config.window_size
    }

    /// Fingerprint a live window.
    pub fn extract(&self, samples: &[i16]) -> FeatureVector {
        self.extract_labeled(LIVE_LABEL, samples)
    }

    /// Fingerprint a block under the given label.
    ///
    /// Input beyond the window size is ignored; shorter input is zero-padded
    /// at the end. Empty input yields an all-zero vector.
    pub fn extract_labeled(&self, label: impl Into<String>, samples: &[i16]) -> FeatureVector {
        if samples.is_empty() {
            return FeatureVector::zeroed(label);
        }

        let n = self.config.window_size;
        let block = &samples[..samples.len().min(n)];
        let magnitudes = self.magnitude_spectrum(block);

        let bin_hz = self.config.sample_rate as f64 / n as f64;
        let nyquist = self.config.sample_rate as f64 / 2.0;
        let total: f64 = magnitudes.iter().sum();

        FeatureVector {
            label: label.into(),
            spectral_centroid: spectral_centroid(&magnitudes, bin_hz, total),
            spectral_rolloff: spectral_rolloff(
                &magnitudes,
                bin_hz,
                nyquist,
                total,
                self.config.rolloff_fraction,
            ),
            zero_crossing_rate: zero_crossing_rate(block),
            energy_bands: partition_sums::<ENERGY_BANDS>(&magnitudes),
            cepstral_coeffs: partition_sums::<CEPSTRAL_COEFFS>(&magnitudes)
                .map(|sum| sum.max(CEPSTRAL_FLOOR).ln()),
        }
    }

    /// Magnitudes of bins `0..W/2` of the windowed, zero-padded block.
    fn magnitude_spectrum(&self, block: &[i16]) -> Vec<f64> {
        let n = self.config.window_size;
        let mut frame: Vec<Complex<f64>> = vec![Complex { re: 0.0, im: 0.0 }; n];
        for (out, (sample, win)) in frame
            .iter_mut()
            .zip(block.iter().zip(self.hann_window.iter()))
        {
            out.re = f64::from(*sample) * win;
        }

        self.fft.process(&mut frame);

        frame.iter().take(n / 2).map(|c| c.norm()).collect()
    }
}

fn hann_window(n: usize) -> Vec<f64> {
    let n_f = n as f64;
    (0..n)
        .map(|i| 0.5 - 0.5 * ((2.0 * std::f64::consts::PI * i as f64) / n_f).cos())
        .collect()
}

fn spectral_centroid(magnitudes: &[f64], bin_hz: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = magnitudes
        .iter()
        .enumerate()
        .map(|(k, mag)| k as f64 * bin_hz * mag)
        .sum();
    weighted / total
}

fn spectral_rolloff(
    magnitudes: &[f64],
    bin_hz: f64,
    nyquist: f64,
    total: f64,
    fraction: f64,
) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let target = fraction * total;
    let mut cumulative = 0.0;
    for (k, mag) in magnitudes.iter().enumerate() {
        cumulative += mag;
        if cumulative >= target {
            return k as f64 * bin_hz;
        }
    }
    nyquist
}

/// Sign changes per sample. Zero counts as non-negative.
fn zero_crossing_rate(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] < 0) != (pair[1] < 0))
        .count();
    crossings as f64 / samples.len() as f64
}

/// Sums magnitudes over `P` equal-width index partitions.
fn partition_sums<const P: usize>(magnitudes: &[f64]) -> [f64; P] {
    let mut sums = [0.0; P];
    let n_bins = magnitudes.len();
    if n_bins == 0 {
        return sums;
    }
    for (k, mag) in magnitudes.iter().enumerate() {
        sums[k * P / n_bins] += mag;
    }
    sums
}
