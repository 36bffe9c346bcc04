//! Decoding of bundled reference audio into mono PCM.

use std::borrow::Cow;
use std::path::Path;

use crate::{CorpusError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// Turns a reference file into mono samples at a known rate.
///
/// Implemented by whatever codec the host platform provides.
pub trait ReferenceDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedAudio>;
}

/// Decodes WAV files, mixes to mono and resamples to `target_sample_rate`.
#[derive(Debug, Clone, Copy)]
pub struct WavDecoder {
    target_sample_rate: u32,
}

impl WavDecoder {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }
}

impl ReferenceDecoder for WavDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio> {
        let decode_err = |reason: String| CorpusError::Decode {
            path: path.to_path_buf(),
            reason,
        };

        let mut reader = hound::WavReader::open(path).map_err(|e| decode_err(e.to_string()))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let raw: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, bits) if bits <= 16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v << (16 - bits)))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| decode_err(e.to_string()))?,
            (hound::SampleFormat::Int, bits) => reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v >> (bits - 16)) as i16))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| decode_err(e.to_string()))?,
            (hound::SampleFormat::Float, _) => reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| decode_err(e.to_string()))?,
        };

        let mono: Vec<i16> = raw
            .chunks(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|s| i32::from(*s)).sum();
                (sum / frame.len() as i32) as i16
            })
            .collect();

        let samples = resample_linear(&mono, spec.sample_rate, self.target_sample_rate).into_owned();
        Ok(DecodedAudio {
            samples,
            sample_rate: self.target_sample_rate,
        })
    }
}

/// Resample using linear interpolation.
fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Cow<'_, [i16]> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return Cow::Borrowed(samples);
    }
    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let mut output = Vec::with_capacity(new_len);
    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = src_idx.fract();
        let sample = if idx + 1 < samples.len() {
            f64::from(samples[idx]) * (1.0 - frac) + f64::from(samples[idx + 1]) * frac
        } else if idx < samples.len() {
            f64::from(samples[idx])
        } else {
            0.0
        };
        output.push(sample.round() as i16);
    }
    Cow::Owned(output)
}
