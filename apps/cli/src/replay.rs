use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use earshot_corpus::{ReferenceDecoder, WavDecoder};
use earshot_detector::constants::FULL_SCALE;
use earshot_detector::DetectorService;

/// Decode a recording to mono samples at `sample_rate`.
pub fn load_recording(path: &Path, sample_rate: u32) -> anyhow::Result<Vec<i16>> {
    let audio = WavDecoder::new(sample_rate)
        .decode(path)
        .with_context(|| format!("failed to read recording {}", path.display()))?;
    Ok(audio.samples)
}

/// RMS of a chunk relative to full scale, multiplied by `scale`.
pub fn rms_level(chunk: &[i16], scale: f64) -> f64 {
    if chunk.is_empty() {
        return 0.0;
    }
    let sum: f64 = chunk
        .iter()
        .map(|&s| {
            let x = s as f64 / FULL_SCALE;
            x * x
        })
        .sum();
    (sum / chunk.len() as f64).sqrt() * scale
}

pub struct Pacing {
    pub chunk_ms: u64,
    pub speed: f64,
    pub level_scale: f64,
    pub sample_rate: u32,
}

/// Feed `samples` to the service chunk by chunk, the way a capture device
/// would. Returns the replayed duration in milliseconds.
pub async fn replay(service: &DetectorService, samples: &[i16], pacing: &Pacing) -> u64 {
    let rate = u64::from(pacing.sample_rate.max(1));
    let chunk_len = (rate * pacing.chunk_ms.max(1) / 1000).max(1) as usize;
    let pause = if pacing.speed > 0.0 {
        Duration::from_secs_f64(pacing.chunk_ms as f64 / 1000.0 / pacing.speed)
    } else {
        Duration::ZERO
    };

    let mut pushed = 0u64;
    for chunk in samples.chunks(chunk_len) {
        service.on_samples(chunk);
        pushed += chunk.len() as u64;
        service.on_level(rms_level(chunk, pacing.level_scale), pushed * 1000 / rate);
        tokio::time::sleep(pause).await;
    }
    pushed * 1000 / rate
}
