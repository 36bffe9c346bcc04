//! Builds a reference corpus from decoded recordings.

use std::path::PathBuf;
use std::sync::Arc;

use earshot_fingerprint::{CorpusBuilder, FeatureExtractor, ReferenceCorpus};
use serde::{Deserialize, Serialize};

use crate::{CorpusError, ReferenceDecoder, Result};

/// A bundled recording and the event category it demonstrates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSource {
    pub path: PathBuf,
    pub category: String,
}

impl ReferenceSource {
    pub fn new(path: impl Into<PathBuf>, category: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            category: category.into(),
        }
    }

    /// Fingerprint label: category plus file stem, unique per recording.
    fn label(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("reference");
        format!("{}/{}", self.category, stem)
    }
}

pub struct CorpusLoader {
    decoder: Box<dyn ReferenceDecoder>,
    extractor: Arc<FeatureExtractor>,
}

impl std::fmt::Debug for CorpusLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusLoader")
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}

impl CorpusLoader {
    pub fn new(decoder: impl ReferenceDecoder + 'static, extractor: Arc<FeatureExtractor>) -> Self {
        Self {
            decoder: Box::new(decoder),
            extractor,
        }
    }

    /// Decode and fingerprint every source.
    ///
    /// A source that fails to decode is logged and skipped. Fails only when
    /// nothing at all could be loaded.
    pub fn load(&self, sources: &[ReferenceSource]) -> Result<ReferenceCorpus> {
        let mut builder = CorpusBuilder::new();

        for source in sources {
            match self.load_one(source) {
                Ok(fingerprint) => {
                    if !builder.insert(source.path.clone(), source.category.clone(), fingerprint) {
                        tracing::debug!(path = %source.path.display(), "duplicate reference skipped");
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %source.path.display(), error = %e, "skipping reference");
                }
            }
        }

        if builder.is_empty() {
            return Err(CorpusError::Empty);
        }

        tracing::info!(
            loaded = builder.len(),
            requested = sources.len(),
            "reference corpus built"
        );
        Ok(builder.build())
    }

    fn load_one(&self, source: &ReferenceSource) -> Result<earshot_fingerprint::FeatureVector> {
        let audio = self.decoder.decode(&source.path)?;
        if audio.samples.is_empty() {
            return Err(CorpusError::EmptyAudio(source.path.clone()));
        }
        let block = loudest_block(&audio.samples, self.extractor.window_size());
        Ok(self.extractor.extract_labeled(source.label(), block))
    }
}

/// The window-sized block with the most energy, scanned at half-window hops.
fn loudest_block(samples: &[i16], window: usize) -> &[i16] {
    if samples.len() <= window {
        return samples;
    }
    let hop = (window / 2).max(1);
    let last_start = samples.len() - window;

    let mut starts: Vec<usize> = (0..=last_start).step_by(hop).collect();
    if starts.last() != Some(&last_start) {
        starts.push(last_start);
    }

    let energy = |start: usize| -> f64 {
        samples[start..start + window]
            .iter()
            .map(|s| {
                let v = f64::from(*s);
                v * v
            })
            .sum()
    };

    let mut best_start = 0;
    let mut best_energy = f64::MIN;
    for start in starts {
        let e = energy(start);
        if e > best_energy {
            best_energy = e;
            best_start = start;
        }
    }
    &samples[best_start..best_start + window]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_combines_category_and_stem() {
        let source = ReferenceSource::new("assets/refs/sneeze_02.wav", "sneeze");
        assert_eq!(source.label(), "sneeze/sneeze_02");
    }

    #[test]
    fn test_loudest_block_short_input_is_whole() {
        let samples = [1i16, 2, 3];
        assert_eq!(loudest_block(&samples, 8), &samples);
    }

    #[test]
    fn test_loudest_block_finds_burst() {
        let mut samples = vec![10i16; 100];
        samples[70..78].fill(5000);
        let block = loudest_block(&samples, 8);
        assert_eq!(block.len(), 8);
        assert!(block.iter().filter(|s| **s == 5000).count() >= 4);
    }

    #[test]
    fn test_loudest_block_considers_tail() {
        let mut samples = vec![0i16; 21];
        samples[20] = 9000;
        let block = loudest_block(&samples, 8);
        assert_eq!(block.last(), Some(&9000));
    }
}
