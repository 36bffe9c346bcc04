//! Command line interface for replaying recordings through the detector.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use earshot_detector::{ReferenceSource, SessionConfig};

/// Replay a recording through the acoustic event detector
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// WAV recording to replay
    pub input: PathBuf,

    /// JSON session config; defaults are used for missing fields
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Reference recording as CATEGORY=PATH (repeatable)
    #[arg(short, long = "reference", value_parser = parse_reference)]
    pub references: Vec<ReferenceSource>,

    /// Capture chunk length in milliseconds
    #[arg(long, default_value_t = 10)]
    pub chunk_ms: u64,

    /// Replay speed relative to real time
    #[arg(long, default_value_t = 1.0)]
    pub speed: f64,

    /// Level units per unit of full-scale RMS
    #[arg(long, default_value_t = 100.0)]
    pub level_scale: f64,

    /// Analysis window size in samples
    #[arg(long)]
    pub window_size: Option<usize>,

    /// Seconds to wait for the reference corpus before replaying
    #[arg(long, default_value_t = 10)]
    pub corpus_wait_secs: u64,
}

fn parse_reference(value: &str) -> Result<ReferenceSource, String> {
    let (category, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected CATEGORY=PATH, got '{value}'"))?;
    if category.is_empty() || path.is_empty() {
        return Err(format!("expected CATEGORY=PATH, got '{value}'"));
    }
    Ok(ReferenceSource::new(path, category))
}

impl Cli {
    /// Config file (or defaults) with command line overrides applied.
    pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => SessionConfig::default(),
        };

        if let Some(window_size) = self.window_size {
            config.extractor.window_size = window_size;
            config.analysis_hop = (window_size / 2).max(1);
        }
        config.references.extend(self.references.iter().cloned());
        config.validate().context("invalid session config")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use earshot_detector::EventKind;

    #[test]
    fn test_parse_reference() {
        let source = parse_reference("sneeze=refs/sneeze_01.wav").unwrap();
        assert_eq!(source.category, "sneeze");
        assert_eq!(source.path, PathBuf::from("refs/sneeze_01.wav"));
        assert!(parse_reference("refs/sneeze_01.wav").is_err());
        assert!(parse_reference("=refs/a.wav").is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "earshot",
            "take.wav",
            "--window-size",
            "1024",
            "-r",
            "blow=b.wav",
        ]);
        let config = cli.session_config().unwrap();
        assert_eq!(config.extractor.window_size, 1024);
        assert_eq!(config.analysis_hop, 512);
        assert_eq!(config.references, vec![ReferenceSource::new("b.wav", "blow")]);
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(
            &path,
            r#"{ "profiles": [ { "kind": "sneeze", "trigger": { "mode": "level", "event": { "onset_threshold": 9.5 } } } ] }"#,
        )
        .unwrap();

        let cli = Cli::parse_from(["earshot", "take.wav", "--config", path.to_str().unwrap()]);
        let config = cli.session_config().unwrap();
        assert_eq!(config.kinds().collect::<Vec<_>>(), vec![EventKind::Sneeze]);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(cli.session_config().is_err());
    }
}
