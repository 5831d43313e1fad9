//! Section Renderer: turns a Section Store into the final resume document.
//!
//! Sections are visited in canonical order, empty ones are skipped, each
//! piece of content goes through a `SectionFormatter`, and the labeled blocks
//! are joined with a blank line.
//!
//! Formatter output is memoised per `(section, content)` in a `RenderCache`
//! owned by the session, so rendering an unchanged store twice yields the same
//! bytes even when the formatter is a language model.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::assistant::prompts::formatter_system_prompt;
use crate::assistant::sections::Section;
use crate::assistant::store::SectionStore;
use crate::llm_client::{Completion, LlmError};

/// Prefix of the output substituted for content the formatter failed on.
pub const TOOL_ERROR_TAG: &str = "[tool_error]";

/// Formats one piece of section content for the final document.
///
/// Carried in `ResumeAssistant` as `Arc<dyn SectionFormatter>`, swapped at startup
/// via `SECTION_FORMATTER`.
#[async_trait]
pub trait SectionFormatter: Send + Sync {
    async fn format(&self, section: Section, content: &str) -> Result<String, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Backends
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatterKind {
    Llm,
    Plain,
}

impl FromStr for FormatterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llm" => Ok(FormatterKind::Llm),
            "plain" => Ok(FormatterKind::Plain),
            other => Err(format!("expected 'llm' or 'plain', got '{other}'")),
        }
    }
}

impl fmt::Display for FormatterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatterKind::Llm => f.write_str("llm"),
            FormatterKind::Plain => f.write_str("plain"),
        }
    }
}

/// Language-model formatter with one system prompt per section.
pub struct LlmSectionFormatter {
    model: Arc<dyn Completion>,
}

impl LlmSectionFormatter {
    pub fn new(model: Arc<dyn Completion>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl SectionFormatter for LlmSectionFormatter {
    async fn format(&self, section: Section, content: &str) -> Result<String, LlmError> {
        self.model
            .complete(formatter_system_prompt(section), content)
            .await
    }
}

/// Deterministic markdown formatter. No network; never fails.
///
/// Summary stays a paragraph. Everything else becomes one bullet per line,
/// with skills additionally split on commas.
pub struct PlainSectionFormatter;

#[async_trait]
impl SectionFormatter for PlainSectionFormatter {
    async fn format(&self, section: Section, content: &str) -> Result<String, LlmError> {
        Ok(plain_format(section, content))
    }
}

fn plain_format(section: Section, content: &str) -> String {
    let lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
    match section {
        Section::Summary => lines.collect::<Vec<_>>().join(" "),
        Section::Skills => lines
            .flat_map(|l| l.split(','))
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(bullet)
            .collect::<Vec<_>>()
            .join("\n"),
        _ => lines.map(bullet).collect::<Vec<_>>().join("\n"),
    }
}

fn bullet(line: &str) -> String {
    let text = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .unwrap_or(line);
    format!("- {text}")
}

// ────────────────────────────────────────────────────────────────────────────
// Rendering
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RenderCache {
    formatted: HashMap<(Section, String), String>,
}

impl RenderCache {
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.formatted.len()
    }
}

/// Renders the whole store. Formatter failures are logged and replaced by a
/// `[tool_error]` line; they never abort the render.
pub async fn render_resume(
    store: &SectionStore,
    formatter: &dyn SectionFormatter,
    cache: &mut RenderCache,
) -> String {
    let mut blocks = Vec::new();
    let mut used = HashMap::new();

    for section in Section::CANONICAL_ORDER {
        let content = store.get(section);
        if content.is_empty() {
            continue;
        }

        let mut parts = Vec::new();
        for item in content.items() {
            let key = (section, item.to_string());
            let cached = used
                .get(&key)
                .cloned()
                .or_else(|| cache.formatted.remove(&key));
            let formatted = match cached {
                Some(hit) => hit,
                None => match formatter.format(section, item).await {
                    Ok(text) => text.trim().to_string(),
                    Err(e) => {
                        warn!("Formatting {section} failed: {e}");
                        parts.push(format!("{TOOL_ERROR_TAG} {e}"));
                        continue;
                    }
                },
            };
            parts.push(formatted.clone());
            used.insert(key, formatted);
        }

        blocks.push(format!("## {}\n\n{}", section.title(), parts.join("\n\n")));
    }

    // Keep only what this render needed so the cache tracks the store.
    cache.formatted = used;

    blocks.join("\n\n").trim_end().to_string()
}
