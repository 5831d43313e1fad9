//! In-memory stand-ins for the language model, formatter, repository and blob
//! store. Test-only.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;

use crate::assistant::render::{FormatterKind, SectionFormatter};
use crate::assistant::sections::{Section, SectionLayout};
use crate::config::Config;
use crate::llm_client::{Completion, LlmError};
use crate::models::chat::{ChatRow, MessageRow, Role};
use crate::models::resume::{ResumeVersionRow, SectionUpdateRow};
use crate::persistence::{BlobStore, ResumeRepository};

// ────────────────────────────────────────────────────────────────────────────
// Language model
// ────────────────────────────────────────────────────────────────────────────

/// Replays canned replies in order. Once the script runs out (or when built
/// with `failing`) every call times out.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    pub fn replying<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            prompts: Mutex::default(),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    /// Every `(system, prompt)` pair received, oldest first.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Completion for ScriptedModel {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(LlmError::Timeout(Duration::from_secs(30)))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Formatters
// ────────────────────────────────────────────────────────────────────────────

/// Tags every output with its call number, so a re-format is visible in the text.
#[derive(Default)]
pub struct CountingFormatter {
    calls: AtomicUsize,
}

impl CountingFormatter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SectionFormatter for CountingFormatter {
    async fn format(&self, section: Section, content: &str) -> Result<String, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{content} [{section} #{n}]"))
    }
}

pub struct FailingFormatter;

#[async_trait]
impl SectionFormatter for FailingFormatter {
    async fn format(&self, _section: Section, _content: &str) -> Result<String, LlmError> {
        Err(LlmError::EmptyContent)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Storage
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Tables {
    next_id: i64,
    chats: Vec<ChatRow>,
    messages: Vec<MessageRow>,
    updates: Vec<SectionUpdateRow>,
    versions: Vec<ResumeVersionRow>,
}

impl Tables {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

#[async_trait]
impl ResumeRepository for MemoryRepository {
    async fn ensure_chat(&self, session_id: &str) -> Result<ChatRow> {
        let mut t = self.tables.lock().unwrap();
        if let Some(chat) = t.chats.iter().find(|c| c.session_id == session_id) {
            return Ok(chat.clone());
        }
        let chat = ChatRow {
            id: t.id(),
            session_id: session_id.to_string(),
            title: None,
            created_at: Utc::now(),
        };
        t.chats.push(chat.clone());
        Ok(chat)
    }

    async fn find_chat(&self, session_id: &str) -> Result<Option<ChatRow>> {
        let t = self.tables.lock().unwrap();
        Ok(t.chats.iter().find(|c| c.session_id == session_id).cloned())
    }

    async fn list_chats_with_messages(&self) -> Result<Vec<(ChatRow, Vec<MessageRow>)>> {
        let t = self.tables.lock().unwrap();
        Ok(t.chats
            .iter()
            .rev()
            .map(|chat| {
                let messages = t
                    .messages
                    .iter()
                    .filter(|m| m.chat_id == chat.id)
                    .cloned()
                    .collect();
                (chat.clone(), messages)
            })
            .collect())
    }

    async fn delete_chat(&self, session_id: &str) -> Result<bool> {
        let mut t = self.tables.lock().unwrap();
        let Some(chat_id) = t
            .chats
            .iter()
            .find(|c| c.session_id == session_id)
            .map(|c| c.id)
        else {
            return Ok(false);
        };
        t.chats.retain(|c| c.id != chat_id);
        t.messages.retain(|m| m.chat_id != chat_id);
        t.updates.retain(|u| u.session_id != session_id);
        t.versions.retain(|v| v.session_id != session_id);
        Ok(true)
    }

    async fn append_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<MessageRow> {
        let mut t = self.tables.lock().unwrap();
        let chat_id = t
            .chats
            .iter()
            .find(|c| c.session_id == session_id)
            .map(|c| c.id)
            .ok_or_else(|| anyhow!("No chat exists for session {session_id}"))?;
        let message = MessageRow {
            id: t.id(),
            chat_id,
            role: role.as_str().to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        t.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRow>> {
        let t = self.tables.lock().unwrap();
        let Some(chat_id) = t
            .chats
            .iter()
            .find(|c| c.session_id == session_id)
            .map(|c| c.id)
        else {
            return Ok(Vec::new());
        };
        Ok(t.messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect())
    }

    async fn record_section_update(
        &self,
        session_id: &str,
        section: Section,
        content: &str,
    ) -> Result<SectionUpdateRow> {
        let mut t = self.tables.lock().unwrap();
        let row = SectionUpdateRow {
            id: t.id(),
            session_id: session_id.to_string(),
            section: section.as_str().to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        t.updates.push(row.clone());
        Ok(row)
    }

    async fn section_updates(&self, session_id: &str) -> Result<Vec<SectionUpdateRow>> {
        let t = self.tables.lock().unwrap();
        Ok(t.updates
            .iter()
            .filter(|u| u.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn save_version(
        &self,
        session_id: &str,
        name: &str,
        content: &str,
    ) -> Result<ResumeVersionRow> {
        let mut t = self.tables.lock().unwrap();
        let latest = t
            .versions
            .iter()
            .filter(|v| v.session_id == session_id)
            .map(|v| v.version)
            .max()
            .unwrap_or(0);
        let row = ResumeVersionRow {
            id: t.id(),
            session_id: session_id.to_string(),
            version: latest + 1,
            name: name.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        t.versions.push(row.clone());
        Ok(row)
    }

    async fn list_versions(&self, session_id: &str) -> Result<Vec<ResumeVersionRow>> {
        let t = self.tables.lock().unwrap();
        Ok(t.versions
            .iter()
            .filter(|v| v.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn get_version(&self, session_id: &str, version: i32) -> Result<Option<ResumeVersionRow>> {
        let t = self.tables.lock().unwrap();
        Ok(t.versions
            .iter()
            .find(|v| v.session_id == session_id && v.version == version)
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn remove(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().remove(key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> Result<()> {
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("no object at {key}"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Config
// ────────────────────────────────────────────────────────────────────────────

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/cvbuilder_test".to_string(),
        s3_bucket: "cvbuilder-test".to_string(),
        s3_endpoint: "http://localhost:9000".to_string(),
        aws_access_key_id: "test".to_string(),
        aws_secret_access_key: "test".to_string(),
        anthropic_api_key: "test".to_string(),
        port: 8080,
        rust_log: "info".to_string(),
        llm_timeout: Duration::from_secs(30),
        extraction_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(30),
        max_upload_bytes: 1024 * 1024,
        section_layout: SectionLayout::default(),
        section_formatter: FormatterKind::Plain,
    }
}
