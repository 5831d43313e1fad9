use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::info;

use crate::assistant::sections::Section;
use crate::models::chat::{ChatRow, MessageRow, Role};
use crate::models::resume::{ResumeVersionRow, SectionUpdateRow};
use crate::persistence::ResumeRepository;

/// One row of the chats/messages left join. Message columns are NULL for a
/// chat without turns.
#[derive(FromRow)]
struct ChatMessageRow {
    chat_id: i64,
    session_id: String,
    title: Option<String>,
    chat_created_at: DateTime<Utc>,
    message_id: Option<i64>,
    role: Option<String>,
    content: Option<String>,
    message_created_at: Option<DateTime<Utc>>,
}

impl ChatMessageRow {
    fn chat(&self) -> ChatRow {
        ChatRow {
            id: self.chat_id,
            session_id: self.session_id.clone(),
            title: self.title.clone(),
            created_at: self.chat_created_at,
        }
    }

    fn message(self) -> Option<MessageRow> {
        Some(MessageRow {
            id: self.message_id?,
            chat_id: self.chat_id,
            role: self.role?,
            content: self.content?,
            created_at: self.message_created_at?,
        })
    }
}

/// PostgreSQL-backed repository. Messages, section updates and versions are
/// append-only: rows are inserted, never updated.
#[derive(Clone)]
pub struct PgResumeRepository {
    pool: PgPool,
}

impl PgResumeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeRepository for PgResumeRepository {
    async fn ensure_chat(&self, session_id: &str) -> Result<ChatRow> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        Ok(sqlx::query_as::<_, ChatRow>(
            r#"
            INSERT INTO chats (session_id) VALUES ($1)
            ON CONFLICT (session_id) DO UPDATE SET session_id = EXCLUDED.session_id
            RETURNING *
            "#,
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_chat(&self, session_id: &str) -> Result<Option<ChatRow>> {
        Ok(
            sqlx::query_as::<_, ChatRow>("SELECT * FROM chats WHERE session_id = $1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_chats_with_messages(&self) -> Result<Vec<(ChatRow, Vec<MessageRow>)>> {
        let rows = sqlx::query_as::<_, ChatMessageRow>(
            r#"
            SELECT c.id AS chat_id, c.session_id, c.title, c.created_at AS chat_created_at,
                   m.id AS message_id, m.role, m.content, m.created_at AS message_created_at
            FROM chats c
            LEFT JOIN messages m ON m.chat_id = c.id
            ORDER BY c.created_at DESC, c.id DESC, m.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut chats: Vec<(ChatRow, Vec<MessageRow>)> = Vec::new();
        for row in rows {
            if chats.last().map(|(chat, _)| chat.id) != Some(row.chat_id) {
                chats.push((row.chat(), Vec::new()));
            }
            if let (Some(message), Some((_, messages))) = (row.message(), chats.last_mut()) {
                messages.push(message);
            }
        }
        Ok(chats)
    }

    async fn delete_chat(&self, session_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM section_updates WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM resume_versions WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        // messages go with the chat via ON DELETE CASCADE
        let deleted = sqlx::query("DELETE FROM chats WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if deleted > 0 {
            info!("Deleted chat and history for session {session_id}");
        }
        Ok(deleted > 0)
    }

    async fn append_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<MessageRow> {
        sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (chat_id, role, content)
            SELECT id, $2, $3 FROM chats WHERE session_id = $1
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .fetch_optional(&self.pool)
        .await?
        .with_context(|| format!("No chat exists for session {session_id}"))
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRow>> {
        Ok(sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.* FROM messages m
            JOIN chats c ON c.id = m.chat_id
            WHERE c.session_id = $1
            ORDER BY m.id ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn record_section_update(
        &self,
        session_id: &str,
        section: Section,
        content: &str,
    ) -> Result<SectionUpdateRow> {
        Ok(sqlx::query_as::<_, SectionUpdateRow>(
            r#"
            INSERT INTO section_updates (session_id, section, content)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(section.as_str())
        .bind(content)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn section_updates(&self, session_id: &str) -> Result<Vec<SectionUpdateRow>> {
        Ok(sqlx::query_as::<_, SectionUpdateRow>(
            "SELECT * FROM section_updates WHERE session_id = $1 ORDER BY id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn save_version(
        &self,
        session_id: &str,
        name: &str,
        content: &str,
    ) -> Result<ResumeVersionRow> {
        let current_max: Option<i32> =
            sqlx::query_scalar("SELECT MAX(version) FROM resume_versions WHERE session_id = $1")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;
        let new_version = current_max.unwrap_or(0) + 1;

        let row = sqlx::query_as::<_, ResumeVersionRow>(
            r#"
            INSERT INTO resume_versions (session_id, version, name, content)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(new_version)
        .bind(name)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        info!("Saved resume version {new_version} ('{name}') for session {session_id}");
        Ok(row)
    }

    async fn list_versions(&self, session_id: &str) -> Result<Vec<ResumeVersionRow>> {
        Ok(sqlx::query_as::<_, ResumeVersionRow>(
            "SELECT * FROM resume_versions WHERE session_id = $1 ORDER BY version ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_version(&self, session_id: &str, version: i32) -> Result<Option<ResumeVersionRow>> {
        Ok(sqlx::query_as::<_, ResumeVersionRow>(
            "SELECT * FROM resume_versions WHERE session_id = $1 AND version = $2",
        )
        .bind(session_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?)
    }
}
