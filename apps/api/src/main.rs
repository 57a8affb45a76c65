mod config;
mod db;
mod errors;
mod models;
mod render;
mod resumes;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::render::glyphs::FontBook;
use crate::render::{Exporter, HostDocument, TinySkiaRasterizer};
use crate::resumes::{MemoryResumeStore, PgResumeStore, ResumeStore};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Folio API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize résumé storage
    let store: Arc<dyn ResumeStore> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            ensure_schema(&pool).await?;
            Arc::new(PgResumeStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; résumés are kept in memory and lost on restart");
            Arc::new(MemoryResumeStore::new())
        }
    };

    // Scanning system fonts is slow; do it once before the first export
    let fonts = tokio::task::spawn_blocking(FontBook::system).await?;
    if fonts.is_empty() {
        warn!("No usable system fonts; exported PDFs will carry boxes and the text layer only");
    }

    // Initialize the export pipeline
    let host = Arc::new(HostDocument::new(config.settle));
    let exporter = Exporter::new(host, config.export, Arc::new(TinySkiaRasterizer::with_fonts(fonts)));
    info!(
        "Export settings: {:?}, settle {}ms, timeout {}ms",
        exporter.settings(),
        config.settle.as_millis(),
        config.export_timeout.as_millis()
    );

    // Build app state
    let state = AppState {
        store,
        exporter: Arc::new(exporter),
        export_timeout: config.export_timeout,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
