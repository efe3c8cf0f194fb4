//! The end-to-end job that produces a servable pipeline: fetch → clean → train.

use crate::config::Settings;
use crate::coordinator::Retrainer;
use crate::error::ServeError;
use italiclas_data::{ArtifactStore, Cleaner, FetchOutcome, Fetcher};
use italiclas_learning::{TrainOptions, Trainer, TrainerConfig};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Every location and setting the job needs, resolved from [`Settings`].
#[derive(Debug, Clone)]
pub struct ArtifactPipeline {
    store: ArtifactStore,
    source_url: String,
    entry_name: String,
    timeout_secs: u64,
    raw_path: PathBuf,
    clean_path: PathBuf,
    params_path: PathBuf,
    trainer: TrainerConfig,
}

impl ArtifactPipeline {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            store: settings.store(),
            source_url: settings.raw_data_source.clone(),
            entry_name: settings.raw_data_source_filename.clone(),
            timeout_secs: settings.fetch_timeout_secs,
            raw_path: settings.raw_path(),
            clean_path: settings.clean_path(),
            params_path: settings.params_path(),
            trainer: TrainerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_trainer_config(mut self, trainer: TrainerConfig) -> Self {
        self.trainer = trainer;
        self
    }

    /// Run every stage without forcing, so cached outputs are reused and
    /// only missing ones are rebuilt. Blocking.
    ///
    /// # Errors
    ///
    /// [`ServeError::SourceUnavailable`] if the raw data is neither cached
    /// nor downloadable; any stage failure otherwise.
    pub fn run(&self, pipeline_path: &Path) -> Result<(), ServeError> {
        let start = Instant::now();

        // The blocking HTTP client must live on this (blocking) thread
        let fetcher = Fetcher::with_timeout(self.entry_name.as_str(), self.timeout_secs)?;
        if let FetchOutcome::Unavailable { status } = fetcher.fetch(&self.source_url, &self.raw_path, false)? {
            return Err(ServeError::SourceUnavailable { status });
        }

        Cleaner::new(self.store).clean(&self.raw_path, &self.clean_path, false)?;

        Trainer::new(self.store, self.trainer.clone()).train(
            &self.clean_path,
            pipeline_path,
            &self.params_path,
            TrainOptions::default(),
        )?;

        info!("[API] Artifacts ready in {:.2?}", start.elapsed());
        Ok(())
    }
}

impl Retrainer for ArtifactPipeline {
    fn retrain(&self, pipeline_path: &Path) -> Result<(), ServeError> {
        self.run(pipeline_path)
    }
}
