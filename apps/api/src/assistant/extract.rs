//! Document extraction for uploaded attachments (PDF via `pdf-extract`, DOCX via `docx-rs`).
//!
//! Parsing is blocking and runs on the blocking pool under a timeout. Nothing
//! here returns an error: an unsupported type or a failed parse becomes a
//! marker string that is inlined in place of the document text.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    /// Lowercased extension including the dot, or empty when there is none.
    Unsupported(String),
}

impl DocumentKind {
    pub fn from_file_name(name: &str) -> Self {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("pdf") => DocumentKind::Pdf,
            Some("docx") => DocumentKind::Docx,
            Some(other) => DocumentKind::Unsupported(format!(".{other}")),
            None => DocumentKind::Unsupported(String::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Text(String),
    Unsupported { extension: String },
    Failed { reason: String },
}

impl Extraction {
    /// The extracted text; `None` when the result is a marker.
    pub fn text(&self) -> Option<&str> {
        match self {
            Extraction::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The text to inline in the turn: extracted content or a marker.
    pub fn into_text(self) -> String {
        match self {
            Extraction::Text(text) => text,
            Extraction::Unsupported { extension } => {
                format!("[Cannot parse this file type: {extension}]")
            }
            Extraction::Failed { reason } => format!("[Could not read this file: {reason}]"),
        }
    }
}

pub async fn extract_document(file_name: &str, body: Bytes, timeout: Duration) -> Extraction {
    let parse: fn(&[u8]) -> Result<String, String> = match DocumentKind::from_file_name(file_name) {
        DocumentKind::Pdf => pdf_text,
        DocumentKind::Docx => docx_text,
        DocumentKind::Unsupported(extension) => return Extraction::Unsupported { extension },
    };

    let task = tokio::task::spawn_blocking(move || parse(&body));

    let reason = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(text))) => return Extraction::Text(text),
        Ok(Ok(Err(reason))) => reason,
        Ok(Err(join_error)) => format!("parser crashed: {join_error}"),
        Err(_) => format!("timed out after {}s", timeout.as_secs()),
    };

    warn!("Extraction of {file_name} failed: {reason}");
    Extraction::Failed { reason }
}

fn pdf_text(body: &[u8]) -> Result<String, String> {
    pdf_extract::extract_text_from_mem(body)
        .map(|text| text.trim().to_string())
        .map_err(|e| format!("invalid PDF: {e}"))
}

fn docx_text(body: &[u8]) -> Result<String, String> {
    let docx = docx_rs::read_docx(body).map_err(|e| format!("invalid DOCX: {e}"))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(paragraph) => Some(
                paragraph
                    .children
                    .iter()
                    .filter_map(|pc| match pc {
                        ParagraphChild::Run(run) => Some(run),
                        _ => None,
                    })
                    .flat_map(|run| run.children.iter())
                    .filter_map(|rc| match rc {
                        RunChild::Text(t) => Some(t.text.as_str()),
                        _ => None,
                    })
                    .collect::<String>(),
            ),
            _ => None,
        })
        .collect();

    Ok(paragraphs.join("\n").trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_file_name() {
        assert_eq!(DocumentKind::from_file_name("cv.PDF"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_file_name("a_b.docx"), DocumentKind::Docx);
        assert_eq!(
            DocumentKind::from_file_name("notes.txt"),
            DocumentKind::Unsupported(".txt".to_string())
        );
        assert_eq!(
            DocumentKind::from_file_name("README"),
            DocumentKind::Unsupported(String::new())
        );
    }

    #[tokio::test]
    async fn test_unsupported_extension_yields_fixed_marker() {
        let out = extract_document("notes.txt", Bytes::from_static(b"hi"), Duration::from_secs(1)).await;
        assert_eq!(out.into_text(), "[Cannot parse this file type: .txt]");
    }

    #[tokio::test]
    async fn test_garbage_pdf_fails_softly() {
        let out = extract_document(
            "cv.pdf",
            Bytes::from_static(b"definitely not a pdf"),
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(out, Extraction::Failed { .. }));
        assert!(out.into_text().starts_with("[Could not read this file:"));
    }

    #[tokio::test]
    async fn test_garbage_docx_fails_softly() {
        let out = extract_document(
            "cv.docx",
            Bytes::from_static(b"PK not really a zip"),
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(out, Extraction::Failed { .. }));
    }
}
