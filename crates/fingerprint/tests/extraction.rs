//! End-to-end checks over extracted fingerprints.

use earshot_fingerprint::{
    match_fingerprint, similarity, CorpusBuilder, ExtractorConfig, FeatureExtractor,
    DEFAULT_SAMPLE_RATE, DEFAULT_WINDOW_SIZE,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn extractor() -> FeatureExtractor {
    FeatureExtractor::new(ExtractorConfig::default()).expect("default config is valid")
}

fn tone(freq_hz: f64, amplitude: f64, len: usize) -> Vec<i16> {
    let sr = DEFAULT_SAMPLE_RATE as f64;
    (0..len)
        .map(|i| {
            (amplitude * (2.0 * std::f64::consts::PI * freq_hz * i as f64 / sr).sin()).round()
                as i16
        })
        .collect()
}

fn noise(len: usize, amplitude: i16) -> Vec<i16> {
    let mut rng = StdRng::seed_from_u64(0x9E37_79B9);
    (0..len)
        .map(|_| rng.random_range(-amplitude..=amplitude))
        .collect()
}

#[test]
fn non_empty_windows_yield_finite_non_negative_features() {
    let ex = extractor();
    let inputs: Vec<Vec<i16>> = vec![
        vec![0; DEFAULT_WINDOW_SIZE],
        vec![i16::MAX; DEFAULT_WINDOW_SIZE],
        vec![i16::MIN; 17],
        vec![-1200; 1],
        tone(440.0, 12000.0, DEFAULT_WINDOW_SIZE),
        tone(9000.0, 30000.0, 700),
        noise(DEFAULT_WINDOW_SIZE, 20000),
    ];

    for input in &inputs {
        let fv = ex.extract(input);
        assert!(fv.is_finite(), "non-finite features for len {}", input.len());
        assert!(fv.energy_bands().iter().all(|v| *v >= 0.0));
        assert!(fv.cepstral_coeffs().iter().all(|v| *v >= 0.0));
        assert!(fv.spectral_centroid() >= 0.0);
        assert!(fv.spectral_rolloff() <= DEFAULT_SAMPLE_RATE as f64 / 2.0);
        assert!((0.0..=1.0).contains(&fv.zero_crossing_rate()));
    }
}

#[test]
fn extracted_fingerprint_matches_itself_with_confidence_one() {
    let ex = extractor();
    let fv = ex.extract_labeled("sneeze_01", &noise(DEFAULT_WINDOW_SIZE, 9000));
    assert!((similarity(&fv, &fv) - 1.0).abs() < 1e-9);

    let mut builder = CorpusBuilder::new();
    builder.insert("refs/sneeze_01.wav", "sneeze", fv.clone());
    let corpus = builder.build();

    let result = match_fingerprint(&fv, &corpus);
    assert!((result.confidence - 1.0).abs() < 1e-9);
    assert_eq!(result.category(), Some("sneeze"));
}

#[test]
fn tone_prefers_tone_reference_over_noise_reference() {
    let ex = extractor();
    let mut builder = CorpusBuilder::new();
    builder.insert(
        "refs/hum.wav",
        "urination",
        ex.extract_labeled("hum", &tone(300.0, 10000.0, DEFAULT_WINDOW_SIZE)),
    );
    builder.insert(
        "refs/hiss.wav",
        "sneeze",
        ex.extract_labeled("hiss", &noise(DEFAULT_WINDOW_SIZE, 10000)),
    );
    let corpus = builder.build();

    let live = ex.extract(&tone(310.0, 6000.0, DEFAULT_WINDOW_SIZE));
    let result = match_fingerprint(&live, &corpus);
    assert_eq!(result.category(), Some("urination"));
}
