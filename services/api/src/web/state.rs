//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use medstudy_core::generation::GenerationCoordinator;
use medstudy_core::ports::{ContentStore, EmbeddingService, QuestionGenerator};
use medstudy_core::sampler::DailyMixService;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
    pub config: Arc<Config>,
    pub generator: Arc<dyn QuestionGenerator>,
    pub embedder: Arc<dyn EmbeddingService>,
    pub daily_mix: Arc<DailyMixService>,
    pub coordinator: Arc<GenerationCoordinator>,
}
