use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{ResumeData, ResumeRecord};
use crate::models::user::CallerId;
use crate::render::{
    render_preview, CancellationFlag, ExportOutcome, ExportRequest, PdfArtifact, Placement,
    Platform, PrintJob,
};
use crate::render::tree::VisualTree;
use crate::resumes::merge::{apply_patch, ResumePatch};
use crate::resumes::store::ResumeChanges;
use crate::resumes::validation::{ensure_valid, validate_name, validate_resume_data};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateResumeRequest {
    pub name: String,
    pub data: ResumeData,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateResumeRequest {
    pub name: Option<String>,
    pub data: Option<ResumeData>,
}

/// Host-document id of the on-screen preview of résumé `id`.
fn preview_element_id(id: Uuid) -> String {
    format!("preview-{id}")
}

/// Collapses a preview whose document has changed so exports stop capturing it.
fn retire_preview(state: &AppState, id: Uuid) {
    if state.exporter.host().set_placement(&preview_element_id(id), Placement::Hidden) {
        debug!(%id, "Preview retired after edit");
    }
}

async fn load(state: &AppState, caller: CallerId, id: Uuid) -> Result<ResumeRecord, AppError> {
    state
        .store
        .get(caller.0, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

/// GET /api/v1/resumes
pub async fn handle_list(
    State(state): State<AppState>,
    caller: CallerId,
) -> Result<Json<Vec<ResumeRecord>>, AppError> {
    Ok(Json(state.store.list(caller.0).await?))
}

/// POST /api/v1/resumes
pub async fn handle_create(
    State(state): State<AppState>,
    caller: CallerId,
    Json(req): Json<CreateResumeRequest>,
) -> Result<(StatusCode, Json<ResumeRecord>), AppError> {
    let mut issues = validate_name(&req.name);
    issues.extend(validate_resume_data(&req.data));
    ensure_valid(issues)?;

    let record = state.store.create(caller.0, &req.name, &req.data).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeRecord>, AppError> {
    Ok(Json(load(&state, caller, id).await?))
}

/// PATCH /api/v1/resumes/:id
pub async fn handle_update(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateResumeRequest>,
) -> Result<Json<ResumeRecord>, AppError> {
    let mut issues = Vec::new();
    if let Some(name) = &req.name {
        issues.extend(validate_name(name));
    }
    if let Some(data) = &req.data {
        issues.extend(validate_resume_data(data));
    }
    ensure_valid(issues)?;

    let data_changed = req.data.is_some();
    let changes = ResumeChanges {
        name: req.name,
        data: req.data,
    };
    let record = state
        .store
        .update(caller.0, id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
    if data_changed {
        retire_preview(&state, id);
    }
    Ok(Json(record))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.store.delete(caller.0, id).await? {
        state.exporter.host().unmount(&preview_element_id(id));
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Resume {id} not found")))
    }
}

/// POST /api/v1/resumes/:id/duplicate
pub async fn handle_duplicate(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ResumeRecord>), AppError> {
    let copy = state
        .store
        .duplicate(caller.0, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// POST /api/v1/resumes/:id/assistant-patch
/// Merges an assistant edit over the stored document, validates the result, persists it.
pub async fn handle_assistant_patch(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
    Json(patch): Json<ResumePatch>,
) -> Result<Json<ResumeRecord>, AppError> {
    if patch.is_empty() {
        return Err(AppError::UnprocessableEntity("Patch contains no changes".to_string()));
    }
    let current = load(&state, caller, id).await?;
    let merged = apply_patch(&current.data.0, patch);
    ensure_valid(validate_resume_data(&merged))?;

    let changes = ResumeChanges {
        name: None,
        data: Some(merged),
    };
    let record = state
        .store
        .update(caller.0, id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
    retire_preview(&state, id);
    Ok(Json(record))
}

/// GET /api/v1/resumes/:id/preview
/// Lays the résumé out, keeps the tree mounted as its on-screen preview and returns it.
/// A later export of the same résumé captures this tree instead of laying it out again.
pub async fn handle_preview(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<VisualTree>, AppError> {
    let record = load(&state, caller, id).await?;
    let tree = render_preview(&record.data.0, &state.exporter.layout_config());
    state
        .exporter
        .host()
        .remount(&preview_element_id(id), tree.clone(), Placement::Visible);
    Ok(Json(tree))
}

// ────────────────────────────────────────────────────────────────────────────
// Export
// ────────────────────────────────────────────────────────────────────────────

/// Platform for HTTP callers: the artifact becomes the response body. There is no
/// print dialog on the far side of a socket.
#[derive(Default)]
struct ResponseSink {
    artifact: Mutex<Option<PdfArtifact>>,
}

impl ResponseSink {
    fn take(&self) -> Option<PdfArtifact> {
        self.artifact.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[async_trait]
impl Platform for ResponseSink {
    async fn save_file(&self, artifact: PdfArtifact) -> anyhow::Result<()> {
        *self.artifact.lock().unwrap_or_else(PoisonError::into_inner) = Some(artifact);
        Ok(())
    }

    async fn print(&self, job: PrintJob) -> anyhow::Result<()> {
        Err(anyhow!(
            "printing '{}' ({} nodes) is not available over HTTP",
            job.title,
            job.tree.len()
        ))
    }
}

/// Raises `flag` once `after` has elapsed. Abort the handle to disarm it.
fn cancel_after(flag: CancellationFlag, after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        flag.cancel();
    })
}

async fn export_response(
    state: &AppState,
    data: &ResumeData,
    preview: Option<String>,
) -> Result<Response, AppError> {
    let sink = ResponseSink::default();
    let cancel = CancellationFlag::new();
    let deadline = cancel_after(cancel.clone(), state.export_timeout);
    let request = ExportRequest {
        preview,
        cancel,
        ..ExportRequest::default()
    };
    let result = state.exporter.export(data, request, &sink).await;
    deadline.abort();
    let outcome: ExportOutcome = result?;
    let artifact = sink
        .take()
        .ok_or_else(|| AppError::Internal(anyhow!("export finished without delivering a file")))?;

    info!(
        file = %artifact.file_name,
        bytes = outcome.bytes,
        pages = outcome.pages,
        "Serving exported PDF"
    );

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name),
        ),
        (HeaderName::from_static("x-export-pages"), outcome.pages.to_string()),
        (HeaderName::from_static("x-export-links"), outcome.links.to_string()),
        (
            HeaderName::from_static("x-export-reused-preview"),
            outcome.reused_preview.to_string(),
        ),
    ];
    Ok((headers, Bytes::from(artifact.bytes)).into_response())
}

/// GET /api/v1/resumes/:id/export
pub async fn handle_export_saved(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let record = load(&state, caller, id).await?;
    export_response(&state, &record.data.0, Some(preview_element_id(id))).await
}

/// POST /api/v1/export
/// Exports an unsaved draft exactly as sent; drafts are not validated.
pub async fn handle_export_draft(
    State(state): State<AppState>,
    _caller: CallerId,
    Json(data): Json<ResumeData>,
) -> Result<Response, AppError> {
    export_response(&state, &data, None).await
}
