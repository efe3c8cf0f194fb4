//! Shared application state handed to every request handler.

use crate::config::Settings;
use crate::coordinator::{Retrainer, ServingCoordinator};
use italiclas_learning::Predictor;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub coordinator: ServingCoordinator,
}

impl AppState {
    /// Wire a predictor over the configured store and pipeline path.
    pub fn new(settings: Settings, retrainer: Arc<dyn Retrainer>) -> Self {
        let predictor = Predictor::new(settings.store());
        let coordinator = ServingCoordinator::new(predictor, retrainer, settings.pipeline_path());
        Self {
            settings: Arc::new(settings),
            coordinator,
        }
    }
}
