// Assistant LLM prompt templates and fixed user-facing strings.
// All prompts for the assistant module are defined here.

use crate::assistant::sections::Section;
use crate::assistant::service::ReviewKind;
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, RESUME_PERSONA};

/// System prompt for the routing decision. The model classifies; it does not write the resume.
pub fn intent_system_prompt() -> String {
    format!(
        "{RESUME_PERSONA}\n\n{JSON_ONLY_SYSTEM}\n\n{INTENT_INSTRUCTIONS}"
    )
}

const INTENT_INSTRUCTIONS: &str = r#"Decide how to handle the user's message. Return exactly one JSON object in one of these shapes:

{"action": "update_section", "section": "<section>", "content": "<the resume content to store for that section>"}
{"action": "use_tool", "tool": "<section>", "tool_input": "<text to pass to that section's generator>"}
{"action": "fallback", "response": "<a short conversational reply>"}

<section> is one of: personal_info, summary, experience, education, skills, projects, achievements.

RULES:
1. Use "update_section" when the message states facts that belong in one section.
2. Use "use_tool" when the message asks for a section to be written or improved from the text given.
3. Use "fallback" for greetings, questions and anything that does not change the resume.
4. When a file's content is attached, extract only what belongs to the chosen section."#;

/// System prompt for open-ended conversational replies.
pub fn chat_system_prompt() -> &'static str {
    RESUME_PERSONA
}

/// Per-section system prompt for the language-model formatter.
pub fn formatter_system_prompt(section: Section) -> &'static str {
    match section {
        Section::PersonalInfo => {
            "You are a resume writer. Present the candidate's personal information \
            (name, phone, email, location, links) as a short markdown bullet list. \
            Output only the list."
        }
        Section::Summary => {
            "You are a resume writer. Write a concise, strong professional summary of \
            five to six lines from the details given. Output only the summary paragraph."
        }
        Section::Experience => {
            "You are a resume writer. Rewrite this work experience for impact: bold job \
            title, company, dates, then 3-5 achievement-focused bullets with strong action \
            verbs. Output only the entry."
        }
        Section::Education => {
            "You are a resume writer. Format these education details for a resume: degree, \
            institution, location, dates, and honours if present. Output only the entry."
        }
        Section::Skills => {
            "You are a resume writer. Extract the key skills from this text as a markdown \
            bullet list, one skill per line. Output only the list."
        }
        Section::Projects => {
            "You are a resume writer. Format this project for a resume: title, then bullets \
            covering the tech stack, responsibilities and results. Output only the entry."
        }
        Section::Achievements => {
            "You are a resume writer. Extract the key achievements from this text as a \
            markdown bullet list of measurable outcomes. Output only the list."
        }
    }
}

/// Wraps the user's text with the extracted document content, if any.
pub fn with_document(query: &str, document: Option<(&str, &str)>) -> String {
    match document {
        Some((name, text)) => format!("{query}\n\n[File Content from {name}]:\n{text}"),
        None => query.to_string(),
    }
}

/// Asks the user which attachment to use when a session holds several.
pub fn disambiguation_prompt(attachments: &[String]) -> String {
    let listing = attachments
        .iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You have uploaded {} files to this chat:\n{listing}\n\n\
        Which one should I use? Send your message again and name the file as the attachment.",
        attachments.len()
    )
}

/// Manual-editor instruction wrapped around user-supplied section text.
pub fn polish_prompt(text: &str) -> String {
    format!(
        "Polish the following resume section with measurable, impact-driven bullet points:\n{text}"
    )
}

/// Gap analysis, ATS scoring and tailoring prompts. `job_description` is
/// ignored for gap analysis.
pub fn review_prompt(kind: ReviewKind, resume: &str, job_description: &str) -> String {
    match kind {
        ReviewKind::GapAnalysis => format!(
            "Analyze the resume for gaps and weak sections, suggest improvements, and rewrite \
            vague bullet points into measurable impact-driven points:\n{resume}"
        ),
        ReviewKind::AtsReport => format!(
            "Evaluate the resume against the job description for ATS compatibility:\n\
            JD: {job_description}\nResume: {resume}\n\
            - Provide Resume Health Score (clarity, impact, ATS-friendly)\n\
            - Highlight top missing skills\n\
            - Show keyword density for ATS\n\
            - Simulate first 10s recruiter scan"
        ),
        ReviewKind::TailoredResume => format!(
            "Tailor the following resume to this job description:\n\
            JD: {job_description}\nResume: {resume}\n\
            - Highlight missing skills\n\
            - Suggest reordering for relevance\n\
            - Standardize tone/style"
        ),
    }
}

pub const EMPTY_QUERY_REPLY: &str = "Please type something related to your resume.";

pub const CHAT_UNAVAILABLE_REPLY: &str = "I couldn't reach the writing assistant just now. \
    Your resume is unchanged; please try again in a moment.";

pub const NO_RESUME_DATA: &str = "No resume data found.";
