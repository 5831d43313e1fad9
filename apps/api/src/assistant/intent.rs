//! Intent Resolver: maps one user message to an action on the resume.
//!
//! Resolution order:
//! 1. ask the language model for a structured decision and decode it strictly,
//!    then from the outermost `{...}` substring;
//! 2. if nothing decodable came back, match the message against a fixed
//!    keyword table;
//! 3. otherwise fall back to an open-ended conversational reply.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::assistant::prompts::intent_system_prompt;
use crate::assistant::sections::Section;
use crate::llm_client::{strip_json_fences, Completion};

/// The decision schema the model is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    UpdateSection {
        section: Section,
        #[serde(default)]
        content: String,
    },
    UseTool {
        #[serde(alias = "section")]
        tool: Section,
        #[serde(default)]
        tool_input: Option<String>,
    },
    Fallback {
        #[serde(default)]
        response: Option<String>,
    },
}

/// Result of decoding raw model output. Never coerced: a malformed or missing
/// decision is reported as such and the caller picks the fallback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Decoded(Decision),
    Malformed(String),
    Absent,
}

/// What the turn should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Store `content` in `section` as given.
    UpdateSection { section: Section, content: String },
    /// Route `input` to the section's generator.
    UseTool { section: Section, input: String },
    /// Reply conversationally; `reply` is set when the model already wrote one.
    Fallback { reply: Option<String> },
}

pub fn decode_decision(raw: &str) -> DecodeOutcome {
    let text = strip_json_fences(raw);
    if text.is_empty() {
        return DecodeOutcome::Absent;
    }

    if let Ok(decision) = serde_json::from_str::<Decision>(text) {
        return DecodeOutcome::Decoded(decision);
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => {
            match serde_json::from_str::<Decision>(&text[start..=end]) {
                Ok(decision) => DecodeOutcome::Decoded(decision),
                Err(e) => DecodeOutcome::Malformed(e.to_string()),
            }
        }
        _ => DecodeOutcome::Absent,
    }
}

/// The text of one turn as seen by the resolver.
#[derive(Debug, Clone, Copy)]
pub struct TurnText<'a> {
    /// The user's own words. Keywords match against this only.
    pub query: &'a str,
    /// What the model is asked about: the query or an instruction wrapping it,
    /// with any document inlined.
    pub prompt: &'a str,
    /// Text extracted from the attached document; `None` without a document
    /// or when extraction only produced a marker.
    pub document: Option<&'a str>,
}

impl TurnText<'_> {
    /// Content stored when a section is chosen without content of its own:
    /// the user's words, else the extracted document text.
    fn payload(&self) -> Option<String> {
        [Some(self.query), self.document]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|t| !t.is_empty())
            .map(str::to_string)
    }
}

fn into_resolution(decision: Decision, text: &TurnText<'_>) -> Resolution {
    match decision {
        Decision::UpdateSection { section, content } => {
            match non_blank(Some(content)).or_else(|| text.payload()) {
                Some(content) => Resolution::UpdateSection { section, content },
                None => Resolution::Fallback { reply: None },
            }
        }
        Decision::UseTool { tool, tool_input } => {
            match non_blank(tool_input).or_else(|| text.payload()) {
                Some(input) => Resolution::UseTool {
                    section: tool,
                    input,
                },
                None => Resolution::Fallback { reply: None },
            }
        }
        Decision::Fallback { response } => Resolution::Fallback {
            reply: non_blank(response),
        },
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

/// Resolves one turn.
///
/// Never fails: model errors and undecodable output degrade to the keyword
/// table and then to `Fallback`. The keyword route stores the user's own
/// words, never the inlined document block or an extraction marker.
pub async fn resolve_intent(model: &dyn Completion, text: &TurnText<'_>) -> Resolution {
    let outcome = match model.complete(&intent_system_prompt(), text.prompt).await {
        Ok(raw) => decode_decision(&raw),
        Err(e) => {
            warn!("Intent classification failed, using keyword routing: {e}");
            DecodeOutcome::Absent
        }
    };

    match outcome {
        DecodeOutcome::Decoded(decision) => {
            debug!("Model routing decision: {decision:?}");
            return into_resolution(decision, text);
        }
        DecodeOutcome::Malformed(reason) => {
            warn!("Malformed routing decision, using keyword routing: {reason}");
        }
        DecodeOutcome::Absent => debug!("No routing decision returned"),
    }

    match keyword_section(text.query) {
        Some(section) => Resolution::UseTool {
            section,
            input: text.query.trim().to_string(),
        },
        None => Resolution::Fallback { reply: None },
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Keyword routing
// ────────────────────────────────────────────────────────────────────────────

/// Checked in order; the first section with a matching keyword wins.
const KEYWORD_TABLE: &[(Section, &[&str])] = &[
    (Section::PersonalInfo, &["name", "phone", "email", "contact"]),
    (Section::Summary, &["summary", "career objective", "about me"]),
    (Section::Experience, &["experience", "worked", "company", "job"]),
    (Section::Education, &["education", "degree", "university", "school"]),
    (Section::Skills, &["skill", "technology", "tools"]),
    (Section::Projects, &["project", "application", "app"]),
    (Section::Achievements, &["achievement", "award", "certification", "cert"]),
];

/// Short keywords must match a whole word (plural allowed); keywords of five
/// or more letters also match as a word prefix. Multi-word keywords match as
/// a phrase.
pub fn keyword_section(query: &str) -> Option<Section> {
    let lowered = query.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let phrase = words.join(" ");

    KEYWORD_TABLE
        .iter()
        .find(|(_, keywords)| {
            keywords.iter().any(|kw| {
                if kw.contains(' ') {
                    phrase.contains(kw)
                } else {
                    words.iter().any(|w| word_matches(w, kw))
                }
            })
        })
        .map(|(section, _)| *section)
}

fn word_matches(word: &str, keyword: &str) -> bool {
    if word == keyword {
        return true;
    }
    match word.strip_prefix(keyword) {
        Some(rest) => keyword.len() >= 5 || rest == "s" || rest == "es",
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    #[test]
    fn test_decode_strict_json() {
        let raw = r#"{"action": "update_section", "section": "skills", "content": "Rust"}"#;
        assert_eq!(
            decode_decision(raw),
            DecodeOutcome::Decoded(Decision::UpdateSection {
                section: Section::Skills,
                content: "Rust".to_string()
            })
        );
    }

    #[test]
    fn test_decode_recovers_braced_substring_from_prose() {
        let raw = "Sure! Here is my decision:\n{\"action\": \"use_tool\", \"tool\": \"experience\", \"tool_input\": \"Acme\", \"call_immediately\": true}\nHope that helps.";
        assert_eq!(
            decode_decision(raw),
            DecodeOutcome::Decoded(Decision::UseTool {
                tool: Section::Experience,
                tool_input: Some("Acme".to_string())
            })
        );
    }

    #[test]
    fn test_decode_fenced_json() {
        let raw = "```json\n{\"action\": \"fallback\", \"response\": \"Hello!\"}\n```";
        assert_eq!(
            decode_decision(raw),
            DecodeOutcome::Decoded(Decision::Fallback {
                response: Some("Hello!".to_string())
            })
        );
    }

    #[test]
    fn test_decode_unknown_section_is_malformed() {
        let raw = r#"{"action": "update_section", "section": "hobbies", "content": "chess"}"#;
        assert!(matches!(decode_decision(raw), DecodeOutcome::Malformed(_)));
    }

    #[test]
    fn test_decode_missing_action_is_malformed() {
        assert!(matches!(
            decode_decision(r#"{"section": "skills"}"#),
            DecodeOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_decode_prose_or_empty_is_absent() {
        assert_eq!(decode_decision("I think this is about skills."), DecodeOutcome::Absent);
        assert_eq!(decode_decision("   "), DecodeOutcome::Absent);
    }

    #[test]
    fn test_keyword_table_priority_and_matching() {
        assert_eq!(keyword_section("My email is a@b.c"), Some(Section::PersonalInfo));
        assert_eq!(keyword_section("I worked at Acme"), Some(Section::Experience));
        assert_eq!(keyword_section("Add my skills: Rust"), Some(Section::Skills));
        assert_eq!(keyword_section("Here is my career objective"), Some(Section::Summary));
        assert_eq!(keyword_section("I built two apps"), Some(Section::Projects));
        assert_eq!(keyword_section("AWS cert in 2022"), Some(Section::Achievements));
        // "name" is checked before "project"
        assert_eq!(keyword_section("project name: Atlas"), Some(Section::PersonalInfo));
    }

    #[test]
    fn test_short_keywords_do_not_match_inside_other_words() {
        assert_eq!(keyword_section("I am happy with the approach"), None);
        assert_eq!(keyword_section("hello there"), None);
    }

    fn plain(text: &str) -> TurnText<'_> {
        TurnText {
            query: text,
            prompt: text,
            document: None,
        }
    }

    #[tokio::test]
    async fn test_resolve_uses_model_decision() {
        let model = ScriptedModel::replying([
            r#"{"action": "update_section", "section": "summary", "content": "Backend engineer"}"#,
        ]);
        let resolution = resolve_intent(&model, &plain("hi")).await;
        assert_eq!(
            resolution,
            Resolution::UpdateSection {
                section: Section::Summary,
                content: "Backend engineer".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_resolve_blank_tool_input_uses_query() {
        let model = ScriptedModel::replying([r#"{"action": "use_tool", "tool": "skills"}"#]);
        let resolution = resolve_intent(&model, &plain("Rust, Go")).await;
        assert_eq!(
            resolution,
            Resolution::UseTool {
                section: Section::Skills,
                input: "Rust, Go".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_resolve_blank_content_without_query_uses_document_text() {
        let model = ScriptedModel::replying([r#"{"action": "update_section", "section": "skills"}"#]);
        let text = TurnText {
            query: "",
            prompt: "\n\n[File Content from cv.pdf]:\nRust, SQL",
            document: Some("Rust, SQL"),
        };
        assert_eq!(
            resolve_intent(&model, &text).await,
            Resolution::UpdateSection {
                section: Section::Skills,
                content: "Rust, SQL".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_resolve_blank_content_with_nothing_to_store_is_fallback() {
        let model = ScriptedModel::replying([r#"{"action": "use_tool", "tool": "skills"}"#]);
        let text = TurnText {
            query: "",
            prompt: "\n\n[File Content from a.txt]:\n[Cannot parse this file type: .txt]",
            document: None,
        };
        assert_eq!(
            resolve_intent(&model, &text).await,
            Resolution::Fallback { reply: None }
        );
    }

    #[tokio::test]
    async fn test_resolve_model_failure_falls_back_to_keywords() {
        let model = ScriptedModel::failing();
        let resolution = resolve_intent(&model, &plain("I worked at Globex")).await;
        assert_eq!(
            resolution,
            Resolution::UseTool {
                section: Section::Experience,
                input: "I worked at Globex".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_resolve_keyword_route_stores_query_not_document_block() {
        let model = ScriptedModel::failing();
        let text = TurnText {
            query: "add my skills",
            prompt: "add my skills\n\n[File Content from a_notes.txt]:\n[Cannot parse this file type: .txt]",
            document: None,
        };
        assert_eq!(
            resolve_intent(&model, &text).await,
            Resolution::UseTool {
                section: Section::Skills,
                input: "add my skills".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_resolve_malformed_then_no_keyword_is_fallback() {
        let model = ScriptedModel::replying(["{not json at all}"]);
        let resolution = resolve_intent(&model, &plain("hello there")).await;
        assert_eq!(resolution, Resolution::Fallback { reply: None });
    }

    #[tokio::test]
    async fn test_resolve_keywords_ignore_document_text() {
        let model = ScriptedModel::failing();
        let text = TurnText {
            query: "hello",
            prompt: "hello\n\n[File Content from cv.pdf]:\nSkills: Rust",
            document: Some("Skills: Rust"),
        };
        assert_eq!(
            resolve_intent(&model, &text).await,
            Resolution::Fallback { reply: None }
        );
    }
}
