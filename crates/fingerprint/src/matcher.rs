//! Weighted similarity between fingerprints and best-match search.

use crate::{FeatureVector, Reference, ReferenceCorpus};

const WEIGHT_CENTROID: f64 = 0.2;
const WEIGHT_ROLLOFF: f64 = 0.2;
const WEIGHT_ZCR: f64 = 0.1;
const WEIGHT_ENERGY: f64 = 0.3;
const WEIGHT_CEPSTRAL: f64 = 0.2;

/// Best corpus entry for a live fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct MatchResult<'a> {
    pub best: Option<&'a Reference>,
    pub confidence: f64,
}

impl<'a> MatchResult<'a> {
    pub fn none() -> Self {
        Self {
            best: None,
            confidence: 0.0,
        }
    }

    /// True when a match exists and its confidence reaches `threshold`.
    pub fn is_positive(&self, threshold: f64) -> bool {
        self.best.is_some() && self.confidence >= threshold
    }

    pub fn category(&self) -> Option<&'a str> {
        self.best.map(Reference::category)
    }
}

/// Similarity in `[0, 1]` for typical inputs; 1.0 for identical non-silent
/// fingerprints.
pub fn similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    let centroid = relative_similarity(a.spectral_centroid(), b.spectral_centroid());
    let rolloff = relative_similarity(a.spectral_rolloff(), b.spectral_rolloff());
    let zcr = 1.0 - (a.zero_crossing_rate() - b.zero_crossing_rate()).abs();
    let energy = cosine_similarity(a.energy_bands(), b.energy_bands());
    let cepstral = cosine_similarity(a.cepstral_coeffs(), b.cepstral_coeffs());

    WEIGHT_CENTROID * centroid
        + WEIGHT_ROLLOFF * rolloff
        + WEIGHT_ZCR * zcr
        + WEIGHT_ENERGY * energy
        + WEIGHT_CEPSTRAL * cepstral
}

/// Cosine similarity; 0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn relative_similarity(a: f64, b: f64) -> f64 {
    1.0 - (a - b).abs() / a.max(b).max(1.0)
}

/// Scores `live` against every reference and returns the highest.
///
/// Ties keep the earliest entry. An empty corpus yields no match and 0.0.
pub fn match_fingerprint<'a>(live: &FeatureVector, corpus: &'a ReferenceCorpus) -> MatchResult<'a> {
    let mut result = MatchResult::none();
    for reference in corpus.iter() {
        let score = similarity(live, reference.fingerprint());
        if result.best.is_none() || score > result.confidence {
            result = MatchResult {
                best: Some(reference),
                confidence: score,
            };
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CorpusBuilder, CEPSTRAL_COEFFS, ENERGY_BANDS};

    fn fv(label: &str, centroid: f64, bands_scale: f64) -> FeatureVector {
        let mut bands = [0.0; ENERGY_BANDS];
        for (i, b) in bands.iter_mut().enumerate() {
            *b = bands_scale * (i + 1) as f64;
        }
        let mut cep = [0.0; CEPSTRAL_COEFFS];
        for (i, c) in cep.iter_mut().enumerate() {
            *c = (CEPSTRAL_COEFFS - i) as f64;
        }
        FeatureVector::new(label, centroid, centroid * 2.0, 0.1, bands, cep)
    }

    #[test]
    fn test_empty_corpus_has_no_match() {
        let corpus = CorpusBuilder::new().build();
        let result = match_fingerprint(&fv("live", 1000.0, 1.0), &corpus);
        assert!(result.best.is_none());
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_positive(0.0));
    }

    #[test]
    fn test_self_similarity_is_one() {
        let a = fv("a", 1200.0, 3.0);
        assert!((similarity(&a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = fv("a", 1200.0, 3.0);
        let b = fv("b", 400.0, 1.0);
        assert!((similarity(&a, &b) - similarity(&b, &a)).abs() < 1e-12);
        assert!(similarity(&a, &b) < 1.0);
    }

    #[test]
    fn test_cosine_zero_norm() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_relative_similarity_floor_of_one() {
        // max(a, b, 1) keeps tiny values from blowing up
        assert!((relative_similarity(0.0, 0.5) - 0.5).abs() < 1e-12);
        assert_eq!(relative_similarity(0.0, 0.0), 1.0);
    }

    #[test]
    fn test_best_match_picks_closest() {
        let mut builder = CorpusBuilder::new();
        builder.insert("refs/low.wav", "blow", fv("low", 300.0, 1.0));
        builder.insert("refs/high.wav", "sneeze", fv("high", 4000.0, 5.0));
        let corpus = builder.build();

        let result = match_fingerprint(&fv("live", 3900.0, 5.0), &corpus);
        assert_eq!(result.category(), Some("sneeze"));
        assert!(result.confidence > 0.9);
        assert!(result.is_positive(0.55));
    }

    #[test]
    fn test_ties_keep_first_entry() {
        let mut builder = CorpusBuilder::new();
        builder.insert("a.wav", "blow", fv("a", 1000.0, 1.0));
        builder.insert("b.wav", "sneeze", fv("b", 1000.0, 1.0));
        let corpus = builder.build();

        let result = match_fingerprint(&fv("live", 1000.0, 1.0), &corpus);
        assert_eq!(result.category(), Some("blow"));
    }
}
