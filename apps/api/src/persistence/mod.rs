//! Durable storage seams.
//!
//! `ResumeRepository` holds chats, conversation turns, section-update history
//! and resume versions. `BlobStore` holds uploaded documents. Both are carried
//! as trait objects so the assistant never names a concrete backend.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::assistant::sections::Section;
use crate::models::chat::{ChatRow, MessageRow, Role};
use crate::models::resume::{ResumeVersionRow, SectionUpdateRow};

pub mod blob;
pub mod postgres;

#[async_trait]
pub trait ResumeRepository: Send + Sync {
    /// Returns the chat for `session_id`, creating it on first reference.
    async fn ensure_chat(&self, session_id: &str) -> Result<ChatRow>;
    async fn find_chat(&self, session_id: &str) -> Result<Option<ChatRow>>;
    /// Every chat, newest first, each with its turns in insertion order.
    async fn list_chats_with_messages(&self) -> Result<Vec<(ChatRow, Vec<MessageRow>)>>;
    /// Removes the chat and everything recorded for the session.
    /// Returns `false` when there was no such chat.
    async fn delete_chat(&self, session_id: &str) -> Result<bool>;

    /// Appends a turn. The chat must already exist.
    async fn append_message(&self, session_id: &str, role: Role, content: &str)
        -> Result<MessageRow>;
    /// Turns in insertion order.
    async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRow>>;

    async fn record_section_update(
        &self,
        session_id: &str,
        section: Section,
        content: &str,
    ) -> Result<SectionUpdateRow>;
    /// Updates in insertion order.
    async fn section_updates(&self, session_id: &str) -> Result<Vec<SectionUpdateRow>>;

    /// Stores a new version numbered one past the session's latest.
    async fn save_version(&self, session_id: &str, name: &str, content: &str)
        -> Result<ResumeVersionRow>;
    async fn list_versions(&self, session_id: &str) -> Result<Vec<ResumeVersionRow>>;
    async fn get_version(&self, session_id: &str, version: i32)
        -> Result<Option<ResumeVersionRow>>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Bytes>;
}

/// Object key for a stored upload.
pub fn attachment_key(session_id: &str, stored_name: &str) -> String {
    format!("uploads/{session_id}/{stored_name}")
}
