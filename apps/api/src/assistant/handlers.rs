use std::collections::BTreeMap;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::assistant::sections::Section;
use crate::assistant::service::{
    AttachmentReceipt, ChatSummary, ReviewKind, ReviewReport, TurnOutcome, TurnRequest,
};
use crate::assistant::store::SectionContent;
use crate::errors::AppError;
use crate::models::chat::{ChatRow, MessageRow};
use crate::models::resume::ResumeVersionRow;
use crate::state::AppState;

const UPLOAD_FIELD: &str = "file";

#[derive(Deserialize)]
pub struct TurnBody {
    #[serde(default)]
    pub text: String,
    /// Stored attachment name, used when the chat holds several uploads.
    pub attachment: Option<String>,
}

#[derive(Deserialize)]
pub struct PolishBody {
    pub text: String,
}

#[derive(Deserialize)]
pub struct SectionBody {
    pub content: String,
}

#[derive(Deserialize, Default)]
pub struct SaveVersionBody {
    pub name: Option<String>,
    pub content: Option<String>,
}

/// Both fields are optional on the wire; `resume_text` defaults to the current
/// render and the job description is checked per review kind.
#[derive(Deserialize, Default)]
pub struct ReviewBody {
    pub resume_text: Option<String>,
    pub job_description: Option<String>,
}

#[derive(Serialize)]
pub struct ResumeResponse {
    pub session_id: String,
    pub resume: String,
}

#[derive(Serialize)]
pub struct SectionsResponse {
    pub session_id: String,
    pub sections: BTreeMap<Section, SectionContent>,
}

/// POST /api/v1/chats
pub async fn handle_create_chat(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ChatRow>), AppError> {
    let chat = state.assistant.create_session().await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

/// GET /api/v1/chats
pub async fn handle_list_chats(
    State(state): State<AppState>,
) -> Result<Json<Vec<ChatSummary>>, AppError> {
    Ok(Json(state.assistant.list_chats().await?))
}

/// GET /api/v1/chats/:session_id
pub async fn handle_get_chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ChatSummary>, AppError> {
    Ok(Json(state.assistant.chat(&session_id).await?))
}

/// DELETE /api/v1/chats/:session_id
pub async fn handle_delete_chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.assistant.delete_session(&session_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Chat {session_id} not found")))
    }
}

/// GET /api/v1/chats/:session_id/history
pub async fn handle_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<MessageRow>>, AppError> {
    Ok(Json(state.assistant.history(&session_id).await?))
}

/// POST /api/v1/chats/:session_id/turns
pub async fn handle_turn(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<TurnBody>,
) -> Result<Json<TurnOutcome>, AppError> {
    let outcome = state
        .assistant
        .process_turn(TurnRequest {
            session_id,
            text: body.text,
            instruction: None,
            attachment: body.attachment.filter(|a| !a.trim().is_empty()),
        })
        .await?;
    Ok(Json(outcome))
}

/// POST /api/v1/chats/:session_id/polish
pub async fn handle_polish(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<PolishBody>,
) -> Result<Json<TurnOutcome>, AppError> {
    Ok(Json(state.assistant.polish(&session_id, &body.text).await?))
}

async fn review(
    state: &AppState,
    session_id: &str,
    kind: ReviewKind,
    body: Option<Json<ReviewBody>>,
) -> Result<Json<ReviewReport>, AppError> {
    let Json(body) = body.unwrap_or_default();
    let report = state
        .assistant
        .review(
            session_id,
            kind,
            body.resume_text.as_deref(),
            body.job_description.as_deref(),
        )
        .await?;
    Ok(Json(report))
}

/// POST /api/v1/chats/:session_id/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Option<Json<ReviewBody>>,
) -> Result<Json<ReviewReport>, AppError> {
    review(&state, &session_id, ReviewKind::GapAnalysis, body).await
}

/// POST /api/v1/chats/:session_id/ats_score
pub async fn handle_ats_score(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Option<Json<ReviewBody>>,
) -> Result<Json<ReviewReport>, AppError> {
    review(&state, &session_id, ReviewKind::AtsReport, body).await
}

/// POST /api/v1/chats/:session_id/tailor
pub async fn handle_tailor(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Option<Json<ReviewBody>>,
) -> Result<Json<ReviewReport>, AppError> {
    review(&state, &session_id, ReviewKind::TailoredResume, body).await
}

/// POST /api/v1/chats/:session_id/upload (multipart, field `file`)
pub async fn handle_upload(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AttachmentReceipt>), AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("Uploaded file has no name".to_string()))?;
        let body = field.bytes().await?;

        let receipt = state
            .assistant
            .attach_document(&session_id, &file_name, body)
            .await?;
        return Ok((StatusCode::CREATED, Json(receipt)));
    }

    Err(AppError::Validation(format!(
        "Multipart body must contain a '{UPLOAD_FIELD}' field"
    )))
}

/// GET /api/v1/chats/:session_id/resume
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ResumeResponse>, AppError> {
    let resume = state.assistant.render_current(&session_id).await?;
    Ok(Json(ResumeResponse { session_id, resume }))
}

/// GET /api/v1/chats/:session_id/resume/sections
pub async fn handle_get_sections(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SectionsResponse>, AppError> {
    let sections = state.assistant.sections(&session_id).await?;
    Ok(Json(SectionsResponse {
        session_id,
        sections,
    }))
}

/// GET /api/v1/chats/:session_id/resume/preview
pub async fn handle_preview(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ResumeResponse>, AppError> {
    let resume = state.assistant.preview(&session_id).await?;
    Ok(Json(ResumeResponse { session_id, resume }))
}

/// PUT /api/v1/chats/:session_id/sections/:section
pub async fn handle_update_section(
    State(state): State<AppState>,
    Path((session_id, section)): Path<(String, String)>,
    Json(body): Json<SectionBody>,
) -> Result<Json<ResumeResponse>, AppError> {
    let resume = state
        .assistant
        .update_section(&session_id, &section, &body.content)
        .await?;
    Ok(Json(ResumeResponse { session_id, resume }))
}

/// POST /api/v1/chats/:session_id/versions
pub async fn handle_save_version(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Option<Json<SaveVersionBody>>,
) -> Result<(StatusCode, Json<ResumeVersionRow>), AppError> {
    let Json(body) = body.unwrap_or_default();
    let version = state
        .assistant
        .save_version(&session_id, body.name.as_deref(), body.content.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// GET /api/v1/chats/:session_id/versions
pub async fn handle_list_versions(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ResumeVersionRow>>, AppError> {
    Ok(Json(state.assistant.list_versions(&session_id).await?))
}

/// GET /api/v1/chats/:session_id/versions/:version
pub async fn handle_get_version(
    State(state): State<AppState>,
    Path((session_id, version)): Path<(String, i32)>,
) -> Result<Json<ResumeVersionRow>, AppError> {
    Ok(Json(state.assistant.get_version(&session_id, version).await?))
}
