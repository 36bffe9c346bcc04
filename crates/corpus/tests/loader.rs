//! Loader and background publishing against real WAV files on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use earshot_corpus::{
    load_corpus, spawn_corpus_load, CorpusError, CorpusHandle, CorpusLoader, ReferenceDecoder,
    ReferenceSource, WavDecoder,
};
use earshot_fingerprint::{ExtractorConfig, FeatureExtractor, DEFAULT_SAMPLE_RATE};
use tempfile::TempDir;

fn write_tone(dir: &Path, name: &str, freq_hz: f64, sample_rate: u32, channels: u16) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).expect("create wav");
    for i in 0..sample_rate / 2 {
        let t = i as f64 / sample_rate as f64;
        let v = (12000.0 * (2.0 * std::f64::consts::PI * freq_hz * t).sin()) as i16;
        for _ in 0..channels {
            writer.write_sample(v).expect("write sample");
        }
    }
    writer.finalize().expect("finalize wav");
    path
}

fn loader() -> Arc<CorpusLoader> {
    let extractor = Arc::new(FeatureExtractor::new(ExtractorConfig::default()).unwrap());
    Arc::new(CorpusLoader::new(
        WavDecoder::new(DEFAULT_SAMPLE_RATE),
        extractor,
    ))
}

#[test]
fn wav_decoder_mixes_to_mono_and_resamples() {
    let dir = TempDir::new().unwrap();
    let path = write_tone(dir.path(), "stereo.wav", 440.0, 22_050, 2);

    let audio = WavDecoder::new(44_100).decode(&path).unwrap();
    assert_eq!(audio.sample_rate, 44_100);
    // half a second at the target rate
    assert!(audio.samples.len().abs_diff(22_050) <= 1);
    assert!(audio.samples.iter().any(|s| *s > 10_000));
}

#[test]
fn undecodable_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    let good = write_tone(dir.path(), "blow_01.wav", 300.0, DEFAULT_SAMPLE_RATE, 1);
    let corrupt = dir.path().join("sneeze_01.wav");
    std::fs::write(&corrupt, b"definitely not a wav file").unwrap();
    let missing = dir.path().join("missing.wav");

    let sources = vec![
        ReferenceSource::new(&good, "blow"),
        ReferenceSource::new(&corrupt, "sneeze"),
        ReferenceSource::new(&missing, "sneeze"),
    ];
    let corpus = loader().load(&sources).unwrap();

    assert_eq!(corpus.len(), 1);
    let reference = corpus.get(&good).expect("good reference loaded");
    assert_eq!(reference.category(), "blow");
    assert_eq!(reference.fingerprint().label(), "blow/blow_01");
}

#[test]
fn total_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let sources = vec![ReferenceSource::new(dir.path().join("nope.wav"), "blow")];
    assert!(matches!(loader().load(&sources), Err(CorpusError::Empty)));
}

#[tokio::test]
async fn load_corpus_runs_off_the_caller() {
    let dir = TempDir::new().unwrap();
    let sources = vec![
        ReferenceSource::new(write_tone(dir.path(), "a.wav", 200.0, DEFAULT_SAMPLE_RATE, 1), "urination"),
        ReferenceSource::new(write_tone(dir.path(), "b.wav", 3000.0, DEFAULT_SAMPLE_RATE, 1), "sneeze"),
    ];
    let corpus = load_corpus(loader(), sources).await.unwrap();
    assert_eq!(corpus.count_category("urination"), 1);
    assert_eq!(corpus.count_category("sneeze"), 1);
}

#[tokio::test]
async fn background_load_publishes_into_handle() {
    let dir = TempDir::new().unwrap();
    let sources = vec![ReferenceSource::new(
        write_tone(dir.path(), "blow_01.wav", 250.0, DEFAULT_SAMPLE_RATE, 1),
        "blow",
    )];
    let handle = Arc::new(CorpusHandle::new());
    assert!(!handle.is_ready());

    spawn_corpus_load(Arc::clone(&handle), loader(), sources)
        .await
        .unwrap();

    assert!(handle.is_ready());
    assert_eq!(handle.current().map(|c| c.len()), Some(1));
}

#[tokio::test]
async fn failed_background_load_leaves_handle_unpublished() {
    let handle = Arc::new(CorpusHandle::new());
    spawn_corpus_load(
        Arc::clone(&handle),
        loader(),
        vec![ReferenceSource::new("/nonexistent/ref.wav", "blow")],
    )
    .await
    .unwrap();

    assert!(!handle.is_ready());
    assert!(handle.current().is_none());
}
