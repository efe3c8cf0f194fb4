//! Serving coordinator: answers predictions and recovers from a missing model.
//!
//! # State machine
//!
//! ```text
//!              ┌──────────► Ready(bool)
//!  Predicting ─┤
//!              └─ not found ─► trigger retrain ─► RetryLater
//! ```
//!
//! A prediction never waits for a retrain. When the pipeline artifact is
//! missing the coordinator starts one background retrain per artifact path
//! and answers [`PredictOutcome::RetryLater`] right away. Requests that miss
//! while that retrain runs attach to it instead of starting another.
//!
//! Retrains run on the blocking thread pool. On success the cached pipeline
//! for the path is invalidated so the next prediction reads the new file.
//! The in-flight entry is removed on every outcome, panics included, so a
//! failed retrain is retried by the next request that misses.
//!
//! A request that missed just before a retrain finished can start another
//! one after it. That run finds every stage cached and only reloads.

use crate::error::ServeError;
use italiclas_learning::Predictor;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Rebuilds the pipeline artifact at a path. Blocking.
pub trait Retrainer: Send + Sync + 'static {
    fn retrain(&self, pipeline_path: &Path) -> Result<(), ServeError>;
}

/// Progress of one retrain, as seen by its observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrainStatus {
    Running,
    Succeeded,
    Failed(String),
}

impl RetrainStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Handle returned by [`ServingCoordinator::trigger_retrain`].
#[derive(Debug)]
pub enum RetrainTicket {
    /// This call started the retrain.
    Started(watch::Receiver<RetrainStatus>),
    /// A retrain for the same path was already running.
    Attached(watch::Receiver<RetrainStatus>),
}

impl RetrainTicket {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }

    /// Current status without waiting.
    pub fn status(&self) -> RetrainStatus {
        self.receiver().borrow().clone()
    }

    /// Wait until the retrain finishes.
    pub async fn wait(self) -> RetrainStatus {
        let mut rx = match self {
            Self::Started(rx) | Self::Attached(rx) => rx,
        };
        match rx.wait_for(RetrainStatus::is_finished).await {
            Ok(status) => status.clone(),
            Err(_) => RetrainStatus::Failed("retrain task ended without reporting".to_string()),
        }
    }

    fn receiver(&self) -> &watch::Receiver<RetrainStatus> {
        match self {
            Self::Started(rx) | Self::Attached(rx) => rx,
        }
    }
}

/// Result of a prediction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictOutcome {
    Ready(bool),
    /// No model yet; a retrain is running.
    RetryLater,
}

type InFlight = Arc<Mutex<HashMap<PathBuf, watch::Receiver<RetrainStatus>>>>;

/// Shared by all request handlers; cheap to clone.
#[derive(Clone)]
pub struct ServingCoordinator {
    predictor: Predictor,
    retrainer: Arc<dyn Retrainer>,
    pipeline_path: PathBuf,
    in_flight: InFlight,
}

impl ServingCoordinator {
    pub fn new(predictor: Predictor, retrainer: Arc<dyn Retrainer>, pipeline_path: impl Into<PathBuf>) -> Self {
        Self {
            predictor,
            retrainer,
            pipeline_path: pipeline_path.into(),
            in_flight: Arc::default(),
        }
    }

    pub fn pipeline_path(&self) -> &Path {
        &self.pipeline_path
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    /// Classify `text`, starting a retrain if the pipeline is missing.
    ///
    /// # Errors
    ///
    /// Any failure other than a missing artifact, e.g. a corrupt pipeline
    /// file, is returned as is and does not trigger a retrain.
    pub async fn predict(&self, text: &str) -> Result<PredictOutcome, ServeError> {
        let predictor = self.predictor.clone();
        let path = self.pipeline_path.clone();
        let text = text.to_owned();
        let result = tokio::task::spawn_blocking(move || predictor.predict(&text, &path)).await?;

        match result {
            Ok(is_positive) => Ok(PredictOutcome::Ready(is_positive)),
            Err(e) if e.is_artifact_not_found() => {
                warn!("[API] {}", e);
                self.trigger_retrain(&self.pipeline_path);
                Ok(PredictOutcome::RetryLater)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Start a background retrain for `pipeline_path`, or attach to the one
    /// already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn trigger_retrain(&self, pipeline_path: &Path) -> RetrainTicket {
        let mut in_flight = self.in_flight.lock();
        if let Some(rx) = in_flight.get(pipeline_path) {
            return RetrainTicket::Attached(rx.clone());
        }
        let (tx, rx) = watch::channel(RetrainStatus::Running);
        in_flight.insert(pipeline_path.to_path_buf(), rx.clone());
        drop(in_flight);

        info!("[API] Retraining '{}' in the background", pipeline_path.display());
        let retrainer = Arc::clone(&self.retrainer);
        let cache = Arc::clone(self.predictor.cache());
        let in_flight = Arc::clone(&self.in_flight);
        let path = pipeline_path.to_path_buf();

        tokio::spawn(async move {
            let start = Instant::now();
            let job_path = path.clone();
            let result = tokio::task::spawn_blocking(move || retrainer.retrain(&job_path)).await;

            let status = match result {
                Ok(Ok(())) => {
                    cache.invalidate(&path);
                    info!(
                        "[API] Retrained '{}' in {:.2?}",
                        path.display(),
                        start.elapsed()
                    );
                    RetrainStatus::Succeeded
                }
                Ok(Err(e)) => {
                    error!("[API] Retrain of '{}' failed: {}", path.display(), e);
                    RetrainStatus::Failed(e.to_string())
                }
                Err(e) => {
                    error!("[API] Retrain of '{}' panicked: {}", path.display(), e);
                    RetrainStatus::Failed(e.to_string())
                }
            };

            in_flight.lock().remove(&path);
            // Nobody may be waiting
            let _ = tx.send(status);
        });

        RetrainTicket::Started(rx)
    }

    pub fn is_retraining(&self, pipeline_path: &Path) -> bool {
        self.in_flight.lock().contains_key(pipeline_path)
    }

    pub fn retrains_in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}
