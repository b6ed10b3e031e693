use std::sync::Arc;

use admission::AdmissionController;
use advisory::AdvisoryService;
use config::Config;
use generator::AdviceGenerator;
use scoring::RiskScorer;

pub mod admission;
pub mod advisory;
pub mod cache;
mod clock;
pub mod config;
pub mod error;
pub mod generator;
pub mod middleware;
pub mod models;
pub mod scoring;

pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub admission: AdmissionController,
    pub advisory: Arc<AdvisoryService>,
    pub scorer: Arc<dyn RiskScorer>,
}

impl AppState {
    pub fn new(
        config: Config,
        generator: Arc<dyn AdviceGenerator>,
        scorer: Arc<dyn RiskScorer>,
    ) -> Self {
        Self {
            admission: AdmissionController::new(config.rate_limit()),
            advisory: Arc::new(AdvisoryService::new(generator, config.advisory())),
            scorer,
            config,
        }
    }
}
