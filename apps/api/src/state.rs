use std::sync::Arc;

use crate::assistant::service::ResumeAssistant;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the session registry; every route goes through it.
    pub assistant: Arc<ResumeAssistant>,
    pub config: Config,
}
