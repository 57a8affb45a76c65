use std::sync::Arc;
use std::time::Duration;

use crate::render::Exporter;
use crate::resumes::ResumeStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL when `DATABASE_URL` is set, in-memory otherwise.
    pub store: Arc<dyn ResumeStore>,
    /// Owns the host document every export mounts into.
    pub exporter: Arc<Exporter>,
    /// HTTP exports still running after this are cancelled.
    pub export_timeout: Duration,
}
