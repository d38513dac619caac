use std::sync::Arc;

use crate::analysis::AnalysisOrchestrator;
use crate::cache::CacheStore;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
    /// Same store the orchestrator reads through; held here for health and admin routes.
    pub cache: Arc<dyn CacheStore>,
    pub config: Config,
}
