//! Export orchestrator — one call takes a résumé document to a delivered PDF.
//!
//! # States
//! `Idle → Preparing → Capturing → Composing → Done`, with `Failed` reachable from every
//! step. `PlatformPrint` requests leave from `Preparing` straight to `Done` by handing
//! the realized tree to the platform's print mechanism instead of composing a PDF.
//!
//! # Cleanup
//! An off-screen tree mounted during `Preparing` is owned by a `MountGuard` local to the
//! run, so it is detached on success, on every error, on cancellation and when the
//! export future itself is dropped.
//!
//! # Concurrency
//! Each run mounts its own uniquely named tree and shares nothing mutable with other
//! runs apart from the host document registry, so concurrent exports are independent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::resume::ResumeData;
use crate::render::color::{self, ColorStrategy, NormalizeReport};
use crate::render::compose::{self, ComposeError, ComposeInput, PaginationMode};
use crate::render::extract;
use crate::render::font_metrics::FontFamily;
use crate::render::host::{HostDocument, HostError, MountGuard, Placement, RealizedTree};
use crate::render::layout::{render_preview, LayoutConfig};
use crate::render::naming::pdf_file_name;
use crate::render::raster::{resolve_device_scale, RasterError, RasterOptions, Rasterizer};
use crate::render::tree::VisualTree;

// ────────────────────────────────────────────────────────────────────────────
// Settings, requests, outcomes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSettings {
    /// Ambient device-pixel ratio; clamped to `[2, 3]` at capture time.
    pub device_scale: f32,
    pub color_strategy: ColorStrategy,
    pub pagination: PaginationMode,
    pub text_layer: bool,
    pub font: FontFamily,
}

impl Default for ExportSettings {
    fn default() -> Self {
        ExportSettings {
            device_scale: 2.0,
            color_strategy: ColorStrategy::Normalize,
            pagination: PaginationMode::Slice,
            text_layer: true,
            font: FontFamily::Sans,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    Idle,
    Preparing,
    Capturing,
    Composing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Terminal {
    /// Compose a PDF and hand it to the platform's save-file mechanism.
    #[default]
    Download,
    /// Hand the realized document to the platform's print dialog.
    PlatformPrint,
}

/// External cancellation signal, checked at phase boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self, phase: ExportState) -> Result<(), ExportError> {
        if self.is_cancelled() {
            Err(ExportError::Cancelled { phase })
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    /// Id of an already mounted, visible preview to capture instead of mounting a copy.
    pub preview: Option<String>,
    pub terminal: Terminal,
    pub cancel: CancellationFlag,
}

/// The finished file. Ownership passes to the platform on delivery.
#[derive(Debug)]
pub struct PdfArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct PrintJob {
    pub title: String,
    pub tree: Arc<VisualTree>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub file_name: String,
    pub bytes: usize,
    pub pages: usize,
    pub links: usize,
    pub text_lines: usize,
    pub reused_preview: bool,
    pub normalization: Option<NormalizeCounts>,
    pub transitions: Vec<ExportState>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct NormalizeCounts {
    pub colors_rewritten: usize,
    pub backgrounds_dropped: usize,
}

impl From<NormalizeReport> for NormalizeCounts {
    fn from(report: NormalizeReport) -> Self {
        NormalizeCounts {
            colors_rewritten: report.colors_rewritten + report.gradients_rewritten,
            backgrounds_dropped: report.backgrounds_dropped,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("document is not ready for capture (measured {width}x{height})")]
    NotReady { width: f32, height: f32 },

    #[error("rasterization failed: {0}")]
    RasterizationFailure(#[from] RasterError),

    #[error("composition failed: {0}")]
    CompositionFailure(#[from] ComposeError),

    #[error("export cancelled during {phase:?}")]
    Cancelled { phase: ExportState },

    #[error("platform refused the export: {0}")]
    Delivery(#[source] anyhow::Error),

    #[error("host document error: {0}")]
    Host(#[from] HostError),
}

// ────────────────────────────────────────────────────────────────────────────
// Platform seam
// ────────────────────────────────────────────────────────────────────────────

/// The host's terminal mechanisms.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn save_file(&self, artifact: PdfArtifact) -> anyhow::Result<()>;

    async fn print(&self, job: PrintJob) -> anyhow::Result<()>;
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

pub struct Exporter {
    host: Arc<HostDocument>,
    settings: ExportSettings,
    rasterizer: Arc<dyn Rasterizer>,
}

struct Transitions(Vec<ExportState>);

impl Transitions {
    fn enter(&mut self, state: ExportState) {
        let from = self.0.last().copied().unwrap_or(ExportState::Idle);
        debug!(?from, to = ?state, "Export state transition");
        self.0.push(state);
    }
}

impl Exporter {
    pub fn new(host: Arc<HostDocument>, settings: ExportSettings, rasterizer: Arc<dyn Rasterizer>) -> Self {
        Exporter {
            host,
            settings,
            rasterizer,
        }
    }

    pub fn host(&self) -> &Arc<HostDocument> {
        &self.host
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn layout_config(&self) -> LayoutConfig {
        LayoutConfig {
            font: self.settings.font,
        }
    }

    /// Runs one export of `document` and delivers the result through `platform`.
    pub async fn export(
        &self,
        document: &ResumeData,
        request: ExportRequest,
        platform: &dyn Platform,
    ) -> Result<ExportOutcome, ExportError> {
        let mut transitions = Transitions(vec![ExportState::Idle]);
        let result = self.run(document, &request, platform, &mut transitions).await;
        match &result {
            Ok(outcome) => info!(
                file_name = %outcome.file_name,
                bytes = outcome.bytes,
                pages = outcome.pages,
                links = outcome.links,
                "Export finished"
            ),
            Err(e) => {
                transitions.enter(ExportState::Failed);
                warn!(error = %e, "Export failed");
            }
        }
        result
    }

    async fn run(
        &self,
        document: &ResumeData,
        request: &ExportRequest,
        platform: &dyn Platform,
        transitions: &mut Transitions,
    ) -> Result<ExportOutcome, ExportError> {
        let file_name = pdf_file_name(Some(&document.personal_info.name));

        // ── Preparing ───────────────────────────────────────────────────────
        transitions.enter(ExportState::Preparing);
        let (target, mount_guard) = self.prepare(document, request.preview.as_deref())?;
        self.host.settle().await;

        // A reused preview belongs to the caller: its colors are normalized on a private
        // copy, never on the mounted tree.
        let mut detached: Option<RealizedTree> = None;
        let normalization = match self.settings.color_strategy {
            ColorStrategy::Normalize => {
                let report = if mount_guard.is_some() {
                    let mut report = NormalizeReport::default();
                    self.host.update(&target, |tree| report = color::normalize_tree(tree))?;
                    report
                } else {
                    let mut copy = self.snapshot_ready(&target)?;
                    let report = color::normalize_tree(Arc::make_mut(&mut copy.tree));
                    detached = Some(copy);
                    report
                };
                if report.changed() {
                    debug!(?report, "Normalized colors");
                }
                self.host.settle().await;
                Some(NormalizeCounts::from(report))
            }
            ColorStrategy::Native => None,
        };
        request.cancel.check(ExportState::Preparing)?;

        if request.terminal == Terminal::PlatformPrint {
            let realized = match detached {
                Some(copy) => copy,
                None => self.snapshot_ready(&target)?,
            };
            platform
                .print(PrintJob {
                    title: file_name.clone(),
                    tree: realized.tree,
                })
                .await
                .map_err(ExportError::Delivery)?;
            transitions.enter(ExportState::Done);
            return Ok(ExportOutcome {
                file_name,
                bytes: 0,
                pages: 0,
                links: 0,
                text_lines: 0,
                reused_preview: mount_guard.is_none(),
                normalization,
                transitions: transitions.0.clone(),
            });
        }

        // ── Capturing ───────────────────────────────────────────────────────
        transitions.enter(ExportState::Capturing);
        let realized = match detached {
            Some(copy) => copy,
            None => self.snapshot_ready(&target)?,
        };
        let opts = RasterOptions {
            scale: resolve_device_scale(self.settings.device_scale),
            color_strategy: self.settings.color_strategy,
            font: self.settings.font,
        };
        let rasterizer = Arc::clone(&self.rasterizer);
        let raster_target = realized.clone();
        let raster = tokio::task::spawn_blocking(move || rasterizer.rasterize(&raster_target, &opts));
        let extraction = extract::extract(&realized);
        let bitmap = raster
            .await
            .map_err(|e| RasterError::Interrupted(e.to_string()))??;
        self.host.settle().await;
        if bitmap.epoch != extraction.epoch {
            return Err(RasterError::LayoutMoved {
                bitmap: bitmap.epoch,
                extraction: extraction.epoch,
            }
            .into());
        }
        debug!(
            width = bitmap.width,
            height = bitmap.height,
            links = extraction.links.len(),
            lines = extraction.lines.len(),
            "Captured visual tree"
        );
        request.cancel.check(ExportState::Capturing)?;

        // ── Composing ───────────────────────────────────────────────────────
        transitions.enter(ExportState::Composing);
        let content_size = realized.measured_size();
        let pagination = self.settings.pagination;
        let text_layer = self.settings.text_layer;
        let title = document.personal_info.name.trim().to_string();
        let composed = tokio::task::spawn_blocking(move || {
            compose::compose(&ComposeInput {
                bitmap: &bitmap,
                content_size,
                links: &extraction.links,
                lines: text_layer.then_some(extraction.lines.as_slice()),
                pagination,
                title: &title,
            })
        })
        .await
        .map_err(|e| ComposeError::Interrupted(e.to_string()))??;
        request.cancel.check(ExportState::Composing)?;

        // ── Done ────────────────────────────────────────────────────────────
        let bytes = composed.bytes.len();
        platform
            .save_file(PdfArtifact {
                file_name: file_name.clone(),
                bytes: composed.bytes,
            })
            .await
            .map_err(ExportError::Delivery)?;
        transitions.enter(ExportState::Done);

        Ok(ExportOutcome {
            file_name,
            bytes,
            pages: composed.pages,
            links: composed.links.len(),
            text_lines: composed.text_lines,
            reused_preview: mount_guard.is_none(),
            normalization,
            transitions: transitions.0.clone(),
        })
    }

    /// Picks the capture target: a visible, non-empty preview, or a fresh off-screen tree.
    fn prepare(
        &self,
        document: &ResumeData,
        preview: Option<&str>,
    ) -> Result<(String, Option<MountGuard>), ExportError> {
        if let Some(id) = preview {
            match self.host.measured_size(id) {
                Some((w, h)) if w > 0.0 && h > 0.0 => {
                    debug!(id, "Reusing mounted preview");
                    return Ok((id.to_string(), None));
                }
                Some(_) => debug!(id, "Preview has zero size; mounting off-screen copy"),
                None => debug!(id, "Preview not mounted; mounting off-screen copy"),
            }
        }
        let tree = render_preview(document, &self.layout_config());
        let id = format!("export-{}", Uuid::new_v4());
        let guard = self.host.mount_scoped(&id, tree, Placement::OffScreen)?;
        Ok((id, Some(guard)))
    }

    fn snapshot_ready(&self, id: &str) -> Result<RealizedTree, ExportError> {
        let realized = self.host.snapshot(id).ok_or(ExportError::NotReady {
            width: 0.0,
            height: 0.0,
        })?;
        let (width, height) = realized.measured_size();
        if !(width > 0.0 && height > 0.0) {
            return Err(ExportError::NotReady { width, height });
        }
        Ok(realized)
    }
}
