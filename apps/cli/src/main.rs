mod cli;
mod replay;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use earshot_detector::{new_callback, DetectorService};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::replay::Pacing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,earshot=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.session_config()?;
    let sample_rate = config.extractor.sample_rate;
    let samples = replay::load_recording(&cli.input, sample_rate)?;
    tracing::info!(
        input = %cli.input.display(),
        samples = samples.len(),
        "replaying recording"
    );

    let detections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&detections);
    let callback = new_callback(move |detection| {
        counter.fetch_add(1, Ordering::Relaxed);
        let confidence = detection
            .confidence
            .map(|c| format!("{c:.3}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>8} ms  {:<10} {:<12} {}",
            detection.at_ms,
            detection.kind,
            format!("{:?}", detection.source),
            confidence
        );
    });

    let mut service = DetectorService::start(config, callback)?;
    service.initialize()?;

    if !service.config().references.is_empty() {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(cli.corpus_wait_secs);
        while !service.corpus_ready() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        if !service.corpus_ready() {
            tracing::warn!("reference corpus not ready, replaying on energy heuristic");
        }
    }

    let pacing = Pacing {
        chunk_ms: cli.chunk_ms,
        speed: cli.speed,
        level_scale: cli.level_scale,
        sample_rate,
    };
    let duration_ms = replay::replay(&service, &samples, &pacing).await;

    // let the worker finish the last windows
    tokio::time::sleep(Duration::from_millis(200)).await;
    for line in service.diagnostics(duration_ms) {
        tracing::info!("{line}");
    }
    tokio::task::block_in_place(|| service.shutdown());

    tracing::info!(
        detections = detections.load(Ordering::Relaxed),
        duration_ms,
        "replay finished"
    );
    Ok(())
}
