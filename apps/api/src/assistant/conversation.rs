//! Conversation Log: append-only user/assistant turns per session.
//!
//! Uploaded documents are recorded as user turns tagged `[Attachment] <name>`;
//! the log is therefore also where a session's attachments are discovered.

use std::sync::Arc;

use anyhow::Result;

use crate::models::chat::{MessageRow, Role};
use crate::persistence::ResumeRepository;

pub const ATTACHMENT_TAG: &str = "[Attachment]";

const TITLE_MAX_WORDS: usize = 7;
const TITLE_SOURCE_TURNS: usize = 5;
const DEFAULT_TITLE: &str = "New Chat";

#[derive(Clone)]
pub struct ConversationLog {
    repo: Arc<dyn ResumeRepository>,
}

impl ConversationLog {
    pub fn new(repo: Arc<dyn ResumeRepository>) -> Self {
        Self { repo }
    }

    /// Appends a turn, creating the session's chat if this is its first.
    pub async fn append(&self, session_id: &str, role: Role, content: &str) -> Result<MessageRow> {
        self.repo.ensure_chat(session_id).await?;
        self.repo.append_message(session_id, role, content).await
    }

    pub async fn history(&self, session_id: &str) -> Result<Vec<MessageRow>> {
        self.repo.list_messages(session_id).await
    }
}

pub fn attachment_marker(stored_name: &str) -> String {
    format!("{ATTACHMENT_TAG} {stored_name}")
}

fn attachment_name(turn: &MessageRow) -> Option<&str> {
    if !turn.is_role(Role::User) {
        return None;
    }
    turn.content
        .strip_prefix(ATTACHMENT_TAG)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Stored names of every attachment in the session, oldest first.
pub fn attachments(turns: &[MessageRow]) -> Vec<String> {
    turns
        .iter()
        .filter_map(attachment_name)
        .map(str::to_string)
        .collect()
}

/// A short title from the opening user messages, ignoring attachment turns.
pub fn derive_title(turns: &[MessageRow]) -> String {
    let opening: Vec<&str> = turns
        .iter()
        .take(TITLE_SOURCE_TURNS)
        .filter(|t| t.is_role(Role::User) && attachment_name(t).is_none())
        .map(|t| t.content.trim())
        .filter(|c| !c.is_empty())
        .collect();

    let words: Vec<&str> = opening.iter().flat_map(|c| c.split_whitespace()).collect();
    if words.is_empty() {
        return DEFAULT_TITLE.to_string();
    }

    let title = words
        .iter()
        .take(TITLE_MAX_WORDS)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if words.len() > TITLE_MAX_WORDS {
        format!("{title}...")
    } else {
        title
    }
}

/// Trims an assistant message down to where the resume itself starts.
pub fn extract_resume_content(text: &str) -> &str {
    let start = ["##", "1."]
        .iter()
        .filter_map(|marker| text.find(marker))
        .min();
    match start {
        Some(idx) => text[idx..].trim(),
        None => text.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn turn(role: Role, content: &str) -> MessageRow {
        MessageRow {
            id: 0,
            chat_id: 1,
            role: role.as_str().to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_attachments_only_from_tagged_user_turns() {
        let turns = vec![
            turn(Role::User, "hello"),
            turn(Role::User, "[Attachment] 1f_cv.pdf"),
            turn(Role::Assistant, "[Attachment] not-a-file"),
            turn(Role::User, "[Attachment]   "),
            turn(Role::User, "[Attachment] 2a_cover.docx"),
        ];
        assert_eq!(attachments(&turns), vec!["1f_cv.pdf", "2a_cover.docx"]);
    }

    #[test]
    fn test_marker_round_trips_through_attachments() {
        let turns = vec![turn(Role::User, &attachment_marker("abc_resume.pdf"))];
        assert_eq!(attachments(&turns), vec!["abc_resume.pdf"]);
    }

    #[test]
    fn test_title_truncates_after_seven_words() {
        let turns = vec![
            turn(Role::User, "[Attachment] cv.pdf"),
            turn(Role::User, "I am a backend engineer with"),
            turn(Role::Assistant, "Great!"),
            turn(Role::User, "eight years of Rust"),
        ];
        assert_eq!(derive_title(&turns), "I am a backend engineer with eight...");
    }

    #[test]
    fn test_title_defaults_without_user_text() {
        assert_eq!(derive_title(&[]), "New Chat");
        assert_eq!(derive_title(&[turn(Role::Assistant, "Hi")]), "New Chat");
        assert_eq!(derive_title(&[turn(Role::User, "Short one")]), "Short one");
    }

    #[test]
    fn test_extract_resume_content() {
        assert_eq!(
            extract_resume_content("Here you go!\n\n## Skills\n- Rust\n"),
            "## Skills\n- Rust"
        );
        assert_eq!(extract_resume_content("1. First\n## Later"), "1. First\n## Later");
        assert_eq!(extract_resume_content("  plain reply "), "plain reply");
    }
}
