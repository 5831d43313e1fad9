// Conversational resume assistant.
// Turns a chat (text plus uploaded PDF/DOCX files) into a sectioned resume:
// intent resolution, section storage, rendering, snapshots and the conversation log.
// All LLM calls go through llm_client via the Completion trait.

pub mod conversation;
pub mod extract;
pub mod handlers;
pub mod intent;
pub mod prompts;
pub mod render;
pub mod sections;
pub mod service;
pub mod session;
pub mod store;
