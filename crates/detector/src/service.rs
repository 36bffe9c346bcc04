//! Channel-based analysis worker.
//!
//! The capture path only appends to the ring buffer and posts requests; all
//! window analysis runs on a dedicated thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use earshot_corpus::{spawn_corpus_load, CorpusHandle, CorpusLoader, ReferenceDecoder, WavDecoder};
use earshot_fingerprint::FeatureExtractor;

use crate::{
    DetectionCallback, DetectionHistory, DetectionSession, DetectorError, Result, SessionConfig,
    StreamingRingBuffer,
};

enum WorkerRequest {
    /// Analyze the most recent window.
    Analyze,
    Level { level: f64, at_ms: u64 },
    Reset,
    Shutdown,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything the worker thread shares with the service.
struct WorkerContext {
    buffer: Arc<StreamingRingBuffer>,
    running: Arc<AtomicBool>,
    analysis_pending: Arc<AtomicBool>,
    history: Arc<Mutex<DetectionHistory>>,
    callback: DetectionCallback,
    sample_rate: u32,
}

/// A running detector: ring buffer, analysis worker and corpus loading.
///
/// `on_samples` and `on_level` never block on analysis. Detections are
/// delivered to the callback on the worker thread.
pub struct DetectorService {
    config: SessionConfig,
    buffer: Arc<StreamingRingBuffer>,
    corpus: Arc<CorpusHandle>,
    loader: Arc<CorpusLoader>,
    request_tx: Sender<WorkerRequest>,
    running: Arc<AtomicBool>,
    analysis_pending: Arc<AtomicBool>,
    unanalyzed: AtomicUsize,
    analyze_windows: bool,
    history: Arc<Mutex<DetectionHistory>>,
    worker_handle: Option<JoinHandle<()>>,
    load_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl DetectorService {
    /// Start a detector that decodes references as WAV files.
    pub fn start(config: SessionConfig, callback: DetectionCallback) -> Result<Self> {
        let decoder = WavDecoder::new(config.extractor.sample_rate);
        Self::with_decoder(config, decoder, callback)
    }

    pub fn with_decoder(
        config: SessionConfig,
        decoder: impl ReferenceDecoder + 'static,
        callback: DetectionCallback,
    ) -> Result<Self> {
        config.validate()?;

        let extractor = Arc::new(FeatureExtractor::new(config.extractor)?);
        let corpus = Arc::new(CorpusHandle::new());
        let session = DetectionSession::new(&config, Arc::clone(&extractor), Arc::clone(&corpus))?;
        let loader = Arc::new(CorpusLoader::new(decoder, extractor));
        let buffer = Arc::new(StreamingRingBuffer::new(config.extractor.window_size));

        let running = Arc::new(AtomicBool::new(true));
        let analysis_pending = Arc::new(AtomicBool::new(false));
        let history = Arc::new(Mutex::new(DetectionHistory::default()));
        let analyze_windows = session.uses_windows();

        let context = WorkerContext {
            buffer: Arc::clone(&buffer),
            running: Arc::clone(&running),
            analysis_pending: Arc::clone(&analysis_pending),
            history: Arc::clone(&history),
            callback,
            sample_rate: config.extractor.sample_rate,
        };

        let (request_tx, request_rx) = crossbeam_channel::unbounded::<WorkerRequest>();
        let worker_handle = thread::Builder::new()
            .name("earshot-analysis".to_string())
            .spawn(move || analysis_loop(session, request_rx, context))?;

        tracing::info!(
            window_size = config.extractor.window_size,
            sample_rate = config.extractor.sample_rate,
            profiles = config.profiles.len(),
            "detector service started"
        );

        Ok(Self {
            config,
            buffer,
            corpus,
            loader,
            request_tx,
            running,
            analysis_pending,
            unanalyzed: AtomicUsize::new(0),
            analyze_windows,
            history,
            worker_handle: Some(worker_handle),
            load_task: Mutex::new(None),
        })
    }

    /// Start loading the reference corpus in the background.
    ///
    /// Detection keeps running on the energy heuristic until the corpus is
    /// published. Fails only when called outside a tokio runtime.
    pub fn initialize(&self) -> Result<()> {
        if self.config.references.is_empty() {
            tracing::info!("no reference recordings configured, using energy heuristic");
            return Ok(());
        }
        if self.corpus.is_ready() {
            return Ok(());
        }

        let mut task = lock(&self.load_task);
        if task.is_some() {
            tracing::debug!("reference corpus already loading");
            return Ok(());
        }
        tokio::runtime::Handle::try_current().map_err(|_| DetectorError::NoRuntime)?;

        tracing::info!(references = self.config.references.len(), "loading reference corpus");
        *task = Some(spawn_corpus_load(
            Arc::clone(&self.corpus),
            Arc::clone(&self.loader),
            self.config.references.clone(),
        ));
        Ok(())
    }

    pub fn corpus_ready(&self) -> bool {
        self.corpus.is_ready()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Milliseconds of audio received since start or the last reset.
    pub fn sample_clock_ms(&self) -> u64 {
        self.buffer.total_pushed() * 1000 / u64::from(self.config.extractor.sample_rate.max(1))
    }

    /// Capture callback for raw samples.
    pub fn on_samples(&self, samples: &[i16]) {
        if samples.is_empty() || !self.running.load(Ordering::Acquire) {
            return;
        }
        self.buffer.push(samples);
        if !self.analyze_windows {
            return;
        }

        let unanalyzed = self.unanalyzed.fetch_add(samples.len(), Ordering::AcqRel) + samples.len();
        if unanalyzed < self.config.analysis_hop {
            return;
        }
        self.unanalyzed.store(0, Ordering::Release);

        // One outstanding request at a time; a busy worker analyzes the
        // newest window when it gets to it.
        if !self.analysis_pending.swap(true, Ordering::AcqRel) {
            let _ = self.request_tx.send(WorkerRequest::Analyze);
        }
    }

    /// Capture callback for amplitude levels.
    pub fn on_level(&self, level: f64, at_ms: u64) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        let _ = self.request_tx.send(WorkerRequest::Level { level, at_ms });
    }

    /// Recalibrate all detectors and drop buffered audio.
    pub fn reset(&self) {
        self.buffer.clear();
        self.unanalyzed.store(0, Ordering::Release);
        lock(&self.history).clear();
        let _ = self.request_tx.send(WorkerRequest::Reset);
    }

    /// One line per configured event kind.
    pub fn diagnostics(&self, now_ms: u64) -> Vec<String> {
        let history = lock(&self.history);
        self.config
            .kinds()
            .map(|kind| history.describe(kind, now_ms))
            .collect()
    }

    /// Stop the worker and any corpus loading. Results still in flight are
    /// discarded. Called automatically on drop.
    pub fn shutdown(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = lock(&self.load_task).take() {
            task.abort();
        }
        let _ = self.request_tx.send(WorkerRequest::Shutdown);
        if let Some(handle) = self.worker_handle.take() {
            if handle.join().is_err() {
                tracing::warn!("analysis worker panicked");
            }
        }
        self.buffer.clear();
        tracing::info!("detector service stopped");
    }
}

impl Drop for DetectorService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn analysis_loop(
    mut session: DetectionSession,
    request_rx: Receiver<WorkerRequest>,
    context: WorkerContext,
) {
    let sample_rate = u64::from(context.sample_rate.max(1));
    let window_ms = context.buffer.window_size() as u64 * 1000 / sample_rate;

    while let Ok(request) = request_rx.recv() {
        let detections = match request {
            WorkerRequest::Analyze => {
                context.analysis_pending.store(false, Ordering::Release);
                let snapshot = context.buffer.snapshot();
                let at_ms = snapshot.total_pushed * 1000 / sample_rate;

                let started = Instant::now();
                let detections = session.on_window(&snapshot.samples, at_ms);
                let analysis_ms = started.elapsed().as_millis() as u64;
                if analysis_ms > window_ms {
                    tracing::debug!(analysis_ms, window_ms, "analysis slower than real-time");
                }
                detections
            }
            WorkerRequest::Level { level, at_ms } => session.on_level(level, at_ms),
            WorkerRequest::Reset => {
                session.reset();
                tracing::debug!("detectors reset");
                continue;
            }
            WorkerRequest::Shutdown => break,
        };

        for detection in detections {
            if !context.running.load(Ordering::Acquire) {
                tracing::debug!(kind = %detection.kind, "discarding detection after shutdown");
                continue;
            }
            lock(&context.history).record(&detection);
            let callback = &context.callback;
            if panic::catch_unwind(AssertUnwindSafe(|| callback(detection))).is_err() {
                tracing::warn!("detection callback panicked");
            }
        }
    }
    tracing::debug!("analysis worker stopped");
}
