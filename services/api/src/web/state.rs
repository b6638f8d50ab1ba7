//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use quiz_forge_core::{AttemptService, QuizPipeline};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<QuizPipeline>,
    pub attempts: Arc<AttemptService>,
    pub config: Arc<Config>,
}
