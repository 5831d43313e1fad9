use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One accepted section update. Append-only; replayed to rebuild a session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SectionUpdateRow {
    pub id: i64,
    pub session_id: String,
    pub section: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A rendered resume at a point in time. Versions are numbered per session from 1.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeVersionRow {
    pub id: i64,
    pub session_id: String,
    pub version: i32,
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
