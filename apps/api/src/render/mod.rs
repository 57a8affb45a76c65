// Export core: résumé document → laid-out visual tree → sRGB-normalized snapshot →
// bitmap + links + text → paginated PDF.
// CPU-bound capture and composition run inside tokio::task::spawn_blocking.

pub mod color;
pub mod compose;
pub mod export;
pub mod extract;
pub mod font_metrics;
pub mod glyphs;
pub mod host;
pub mod layout;
pub mod naming;
pub mod raster;
pub mod style;
pub mod tree;

// Re-export the API consumed by the HTTP layer.
pub use export::{
    CancellationFlag, ExportError, ExportOutcome, ExportRequest, ExportSettings, Exporter,
    PdfArtifact, Platform, PrintJob,
};
pub use host::{HostDocument, Placement};
pub use layout::render_preview;
pub use raster::TinySkiaRasterizer;
