//! ResumeAssistant: orchestrates one conversational turn end-to-end.
//!
//! Flow: lock session → locate attachments → (disambiguate) → extract document →
//!       resolve intent → update section → re-render → snapshot → log reply.
//!
//! Every operation on a session holds that session's mutex for its whole
//! duration. Delegate failures degrade inside the turn; only client errors and
//! storage failures reach the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assistant::conversation::{
    attachment_marker, attachments, derive_title, extract_resume_content, ConversationLog,
};
use crate::assistant::extract::{extract_document, DocumentKind, Extraction};
use crate::assistant::intent::{resolve_intent, Resolution, TurnText};
use crate::assistant::prompts::{
    chat_system_prompt, disambiguation_prompt, polish_prompt, review_prompt, with_document,
    CHAT_UNAVAILABLE_REPLY, EMPTY_QUERY_REPLY, NO_RESUME_DATA,
};
use crate::assistant::render::{render_resume, SectionFormatter};
use crate::assistant::sections::{Section, SectionLayout};
use crate::assistant::session::{SessionHandle, SessionRegistry, SessionState};
use crate::assistant::store::{SectionContent, SectionStore};
use crate::errors::AppError;
use crate::llm_client::Completion;
use crate::models::chat::{ChatRow, MessageRow, Role};
use crate::models::resume::ResumeVersionRow;
use crate::persistence::{attachment_key, BlobStore, ResumeRepository};

const AUTO_SAVE_NAME: &str = "Auto-save";
const DEFAULT_VERSION_NAME: &str = "Untitled Resume";

// ────────────────────────────────────────────────────────────────────────────
// Request / outcome types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session_id: String,
    /// The user's own words: logged, keyword-matched and stored.
    pub text: String,
    /// Model-facing text to send in place of `text`.
    pub instruction: Option<String>,
    /// Stored name of the attachment to use when the session has several.
    pub attachment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// A section changed; `output` is the freshly rendered resume.
    Resume { section: Section, output: String },
    /// Several attachments are present and none was named.
    Disambiguation { output: String, attachments: Vec<String> },
    /// Conversational reply; the resume is unchanged.
    Reply { output: String },
}

impl TurnOutcome {
    pub fn output(&self) -> &str {
        match self {
            TurnOutcome::Resume { output, .. }
            | TurnOutcome::Disambiguation { output, .. }
            | TurnOutcome::Reply { output } => output,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    /// Gaps, weak sections and vague bullets rewritten as measurable ones.
    GapAnalysis,
    /// Health score, missing skills and keyword density against a job description.
    AtsReport,
    /// The resume tailored to a job description.
    TailoredResume,
}

impl ReviewKind {
    pub fn needs_job_description(self) -> bool {
        !matches!(self, ReviewKind::GapAnalysis)
    }
}

impl fmt::Display for ReviewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReviewKind::GapAnalysis => "gap analysis",
            ReviewKind::AtsReport => "ATS report",
            ReviewKind::TailoredResume => "tailored resume",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewReport {
    pub kind: ReviewKind,
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentReceipt {
    pub session_id: String,
    pub chat_id: i64,
    pub stored_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatSummary {
    pub session_id: String,
    pub chat_id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<MessageRow>,
}

pub struct AssistantSettings {
    pub layout: SectionLayout,
    pub extraction_timeout: Duration,
}

// ────────────────────────────────────────────────────────────────────────────
// Service
// ────────────────────────────────────────────────────────────────────────────

pub struct ResumeAssistant {
    model: Arc<dyn Completion>,
    formatter: Arc<dyn SectionFormatter>,
    repo: Arc<dyn ResumeRepository>,
    blobs: Arc<dyn BlobStore>,
    log: ConversationLog,
    sessions: SessionRegistry,
    settings: AssistantSettings,
}

impl ResumeAssistant {
    pub fn new(
        model: Arc<dyn Completion>,
        formatter: Arc<dyn SectionFormatter>,
        repo: Arc<dyn ResumeRepository>,
        blobs: Arc<dyn BlobStore>,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            model,
            formatter,
            log: ConversationLog::new(repo.clone()),
            repo,
            blobs,
            sessions: SessionRegistry::default(),
            settings,
        }
    }

    /// Returns the session's handle, rebuilding its store from the recorded
    /// section updates the first time the session is seen by this process.
    async fn session(&self, session_id: &str) -> Result<SessionHandle, AppError> {
        if let Some(handle) = self.sessions.get(session_id) {
            return Ok(handle);
        }

        let mut store = SectionStore::new(self.settings.layout.clone());
        let updates = self.repo.section_updates(session_id).await?;
        for update in &updates {
            match update.section.parse::<Section>() {
                Ok(section) => {
                    store.update(section, &update.content);
                }
                Err(e) => warn!("Skipping recorded update for session {session_id}: {e}"),
            }
        }

        let handle = self
            .sessions
            .get_or_insert(session_id, SessionState::new(store));
        info!(
            "Session {session_id} loaded with {} recorded updates ({} active sessions)",
            updates.len(),
            self.sessions.len()
        );
        Ok(handle)
    }

    /// Locks the session's state. A handle deleted while this caller waited
    /// is dropped and the session is looked up afresh.
    async fn lock_session(
        &self,
        session_id: &str,
    ) -> Result<OwnedMutexGuard<SessionState>, AppError> {
        loop {
            let state = self.session(session_id).await?.lock_owned().await;
            if !state.deleted {
                return Ok(state);
            }
        }
    }

    pub async fn create_session(&self) -> Result<ChatRow, AppError> {
        let session_id = Uuid::new_v4().to_string();
        let chat = self.repo.ensure_chat(&session_id).await?;
        info!("Created session {session_id}");
        Ok(chat)
    }

    /// Processes one user message end-to-end.
    pub async fn process_turn(&self, request: TurnRequest) -> Result<TurnOutcome, AppError> {
        let TurnRequest {
            session_id,
            text,
            instruction,
            attachment,
        } = request;

        let mut state = self.lock_session(&session_id).await?;

        let available = attachments(&self.log.history(&session_id).await?);
        let query = text.trim();

        let document = match attachment {
            Some(name) => {
                if !available.contains(&name) {
                    return Err(AppError::Validation(format!(
                        "Attachment '{name}' was not uploaded to this chat"
                    )));
                }
                Some(name)
            }
            None if available.len() > 1 => {
                self.log_user_text(&session_id, query).await?;
                let output = disambiguation_prompt(&available);
                self.log.append(&session_id, Role::Assistant, &output).await?;
                info!(
                    "Session {session_id} has {} attachments; asked the user to choose",
                    available.len()
                );
                return Ok(TurnOutcome::Disambiguation {
                    output,
                    attachments: available,
                });
            }
            None => available.into_iter().next(),
        };

        self.log_user_text(&session_id, query).await?;

        if query.is_empty() && document.is_none() {
            return self.reply(&session_id, EMPTY_QUERY_REPLY.to_string()).await;
        }

        let asked = instruction.as_deref().unwrap_or(query);
        let extraction = match &document {
            Some(name) => Some((name.as_str(), self.read_attachment(&session_id, name).await)),
            None => None,
        };
        let prompt = match &extraction {
            Some((name, extraction)) => {
                let inlined = extraction.clone().into_text();
                with_document(asked, Some((*name, inlined.as_str())))
            }
            None => asked.to_string(),
        };
        let turn = TurnText {
            query,
            prompt: &prompt,
            document: extraction.as_ref().and_then(|(_, e)| e.text()),
        };

        match resolve_intent(self.model.as_ref(), &turn).await {
            Resolution::UpdateSection { section, content }
            | Resolution::UseTool {
                section,
                input: content,
            } => {
                if let Some(output) = self
                    .apply_update(&session_id, &mut state, section, &content)
                    .await?
                {
                    self.log.append(&session_id, Role::Assistant, &output).await?;
                    return Ok(TurnOutcome::Resume { section, output });
                }
                let reply = self.chat_reply(&session_id, &prompt).await;
                self.reply(&session_id, reply).await
            }
            Resolution::Fallback { reply } => {
                let reply = match reply {
                    Some(reply) => reply,
                    None => self.chat_reply(&session_id, &prompt).await,
                };
                self.reply(&session_id, reply).await
            }
        }
    }

    /// Manual-editor polish: a turn whose model prompt wraps the text in a
    /// polishing instruction. Keyword routing and storage see the text alone.
    pub async fn polish(&self, session_id: &str, text: &str) -> Result<TurnOutcome, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("No text provided".to_string()));
        }
        self.process_turn(TurnRequest {
            session_id: session_id.to_string(),
            text: text.to_string(),
            instruction: Some(polish_prompt(text)),
            attachment: None,
        })
        .await
    }

    /// Gap analysis, ATS scoring or tailoring of a resume.
    ///
    /// `resume_text` defaults to the current render. The report is logged as a
    /// turn but never stored in a section. A model failure yields the
    /// unavailable reply rather than an error.
    pub async fn review(
        &self,
        session_id: &str,
        kind: ReviewKind,
        resume_text: Option<&str>,
        job_description: Option<&str>,
    ) -> Result<ReviewReport, AppError> {
        let job_description = job_description.map(str::trim).filter(|jd| !jd.is_empty());
        if kind.needs_job_description() && job_description.is_none() {
            return Err(AppError::Validation("Job description missing".to_string()));
        }

        let mut state = self.lock_session(session_id).await?;
        let resume = match resume_text.map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => text.to_string(),
            None => {
                let SessionState {
                    store,
                    render_cache,
                    ..
                } = &mut *state;
                render_resume(store, self.formatter.as_ref(), render_cache).await
            }
        };
        if resume.is_empty() {
            return Err(AppError::Validation("No resume text provided".to_string()));
        }

        let prompt = review_prompt(kind, &resume, job_description.unwrap_or_default());
        self.log.append(session_id, Role::User, &prompt).await?;
        let output = self.chat_reply(session_id, &prompt).await;
        self.log.append(session_id, Role::Assistant, &output).await?;
        info!("Produced {kind} for session {session_id}");

        Ok(ReviewReport { kind, output })
    }

    /// Direct, non-conversational edit of one section. Returns the re-rendered resume.
    ///
    /// An unknown section name or blank content is rejected before anything is
    /// touched. A session that does not exist yet is created.
    pub async fn update_section(
        &self,
        session_id: &str,
        section: &str,
        content: &str,
    ) -> Result<String, AppError> {
        let section = section
            .parse::<Section>()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        if content.trim().is_empty() {
            return Err(AppError::Validation("content cannot be empty".to_string()));
        }

        let mut state = self.lock_session(session_id).await?;
        self.repo.ensure_chat(session_id).await?;

        self.apply_update(session_id, &mut state, section, content)
            .await?
            .ok_or_else(|| AppError::Validation("content cannot be empty".to_string()))
    }

    /// Renders the current resume without changing anything.
    pub async fn render_current(&self, session_id: &str) -> Result<String, AppError> {
        let mut state = self.lock_session(session_id).await?;
        let SessionState {
            store,
            render_cache,
            ..
        } = &mut *state;
        Ok(render_resume(store, self.formatter.as_ref(), render_cache).await)
    }

    pub async fn sections(
        &self,
        session_id: &str,
    ) -> Result<BTreeMap<Section, SectionContent>, AppError> {
        let state = self.lock_session(session_id).await?;
        Ok(state.store.get_all().clone())
    }

    /// Stores an uploaded document and records it as an attachment turn.
    pub async fn attach_document(
        &self,
        session_id: &str,
        file_name: &str,
        body: Bytes,
    ) -> Result<AttachmentReceipt, AppError> {
        if body.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }

        let stored_name = stored_file_name(file_name);
        let content_type = match DocumentKind::from_file_name(&stored_name) {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentKind::Unsupported(_) => "application/octet-stream",
        };

        self.blobs
            .put(&attachment_key(session_id, &stored_name), body, content_type)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let message = self
            .log
            .append(session_id, Role::User, &attachment_marker(&stored_name))
            .await?;

        info!("Attached {stored_name} to session {session_id}");
        Ok(AttachmentReceipt {
            session_id: session_id.to_string(),
            chat_id: message.chat_id,
            message: format!("File '{file_name}' uploaded successfully."),
            stored_name,
        })
    }

    pub async fn save_version(
        &self,
        session_id: &str,
        name: Option<&str>,
        content: Option<&str>,
    ) -> Result<ResumeVersionRow, AppError> {
        let mut state = self.lock_session(session_id).await?;

        let content = match content.map(str::trim).filter(|c| !c.is_empty()) {
            Some(content) => content.to_string(),
            None => {
                if state.store.is_empty() {
                    return Err(AppError::Validation(
                        "Nothing to save: the resume is empty".to_string(),
                    ));
                }
                let SessionState {
                    store,
                    render_cache,
                    ..
                } = &mut *state;
                render_resume(store, self.formatter.as_ref(), render_cache).await
            }
        };

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_VERSION_NAME);
        Ok(self.repo.save_version(session_id, name, &content).await?)
    }

    pub async fn list_versions(&self, session_id: &str) -> Result<Vec<ResumeVersionRow>, AppError> {
        Ok(self.repo.list_versions(session_id).await?)
    }

    pub async fn get_version(
        &self,
        session_id: &str,
        version: i32,
    ) -> Result<ResumeVersionRow, AppError> {
        self.repo
            .get_version(session_id, version)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Version {version} of session {session_id} not found"))
            })
    }

    pub async fn history(&self, session_id: &str) -> Result<Vec<MessageRow>, AppError> {
        Ok(self.log.history(session_id).await?)
    }

    pub async fn chat(&self, session_id: &str) -> Result<ChatSummary, AppError> {
        let chat = self
            .repo
            .find_chat(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Chat {session_id} not found")))?;
        let messages = self.log.history(&chat.session_id).await?;
        Ok(summarize(chat, messages))
    }

    pub async fn list_chats(&self) -> Result<Vec<ChatSummary>, AppError> {
        Ok(self
            .repo
            .list_chats_with_messages()
            .await?
            .into_iter()
            .map(|(chat, messages)| summarize(chat, messages))
            .collect())
    }

    /// The resume part of the latest assistant message.
    pub async fn preview(&self, session_id: &str) -> Result<String, AppError> {
        let history = self.log.history(session_id).await?;
        let preview = history
            .iter()
            .rev()
            .find(|m| m.is_role(Role::Assistant))
            .map(|m| extract_resume_content(&m.content))
            .filter(|text| !text.is_empty())
            .unwrap_or(NO_RESUME_DATA);
        Ok(preview.to_string())
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool, AppError> {
        // Waits out any in-flight operation; later waiters see `deleted`.
        let mut state = self.lock_session(session_id).await?;

        let deleted = self.repo.delete_chat(session_id).await?;
        state.deleted = true;
        self.sessions.evict(session_id);
        Ok(deleted)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Turn helpers
    // ────────────────────────────────────────────────────────────────────────

    /// Records and applies one update, re-renders, and commits an auto-save
    /// version. Returns `None` when the content is blank.
    async fn apply_update(
        &self,
        session_id: &str,
        state: &mut SessionState,
        section: Section,
        content: &str,
    ) -> Result<Option<String>, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        self.repo
            .record_section_update(session_id, section, content)
            .await?;
        state.store.update(section, content);
        info!(
            "Updated section {section} for session {session_id}: {}",
            preview_text(content)
        );

        let SessionState {
            store,
            render_cache,
            ..
        } = state;
        let rendered = render_resume(store, self.formatter.as_ref(), render_cache).await;
        self.repo
            .save_version(session_id, AUTO_SAVE_NAME, &rendered)
            .await?;
        Ok(Some(rendered))
    }

    async fn log_user_text(&self, session_id: &str, text: &str) -> Result<(), AppError> {
        if text.is_empty() {
            self.repo.ensure_chat(session_id).await?;
        } else {
            self.log.append(session_id, Role::User, text).await?;
        }
        Ok(())
    }

    async fn reply(&self, session_id: &str, output: String) -> Result<TurnOutcome, AppError> {
        self.log.append(session_id, Role::Assistant, &output).await?;
        Ok(TurnOutcome::Reply { output })
    }

    async fn chat_reply(&self, session_id: &str, input: &str) -> String {
        match self.model.complete(chat_system_prompt(), input).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Conversational reply failed for session {session_id}: {e}");
                CHAT_UNAVAILABLE_REPLY.to_string()
            }
        }
    }

    async fn read_attachment(&self, session_id: &str, stored_name: &str) -> Extraction {
        match self.blobs.get(&attachment_key(session_id, stored_name)).await {
            Ok(body) => {
                extract_document(stored_name, body, self.settings.extraction_timeout).await
            }
            Err(e) => {
                warn!("Attachment {stored_name} of session {session_id} unavailable: {e}");
                Extraction::Failed {
                    reason: "the stored file could not be retrieved".to_string(),
                }
            }
        }
    }
}

fn summarize(chat: ChatRow, messages: Vec<MessageRow>) -> ChatSummary {
    let title = chat
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| derive_title(&messages));
    ChatSummary {
        session_id: chat.session_id,
        chat_id: chat.id,
        title,
        created_at: chat.created_at,
        messages,
    }
}

/// `<uuid>_<basename>` with anything outside `[A-Za-z0-9._-]` replaced.
fn stored_file_name(original: &str) -> String {
    let base = Path::new(original.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("upload");
    let safe: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", Uuid::new_v4().simple(), safe)
}

fn preview_text(text: &str) -> String {
    text.chars().take(100).collect()
}
