use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::assistant::render::FormatterKind;
use crate::assistant::sections::SectionLayout;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Per-request bound for language model calls.
    pub llm_timeout: Duration,
    /// Bound for PDF/DOCX text extraction of a single attachment.
    pub extraction_timeout: Duration,
    /// Whole-request bound applied by the HTTP layer.
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
    /// Which sections replace their content on update; all others accumulate.
    pub section_layout: SectionLayout,
    pub section_formatter: FormatterKind,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            llm_timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", 30)?),
            extraction_timeout: Duration::from_secs(parse_env("EXTRACTION_TIMEOUT_SECS", 20)?),
            request_timeout: Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", 180)?),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            section_layout: match std::env::var("SINGLETON_SECTIONS") {
                Ok(raw) => SectionLayout::parse(&raw)
                    .context("SINGLETON_SECTIONS must list known section names")?,
                Err(_) => SectionLayout::default(),
            },
            section_formatter: parse_env("SECTION_FORMATTER", FormatterKind::Llm)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}
