pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::assistant::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        // Chats
        .route(
            "/api/v1/chats",
            post(handlers::handle_create_chat).get(handlers::handle_list_chats),
        )
        .route(
            "/api/v1/chats/:session_id",
            get(handlers::handle_get_chat).delete(handlers::handle_delete_chat),
        )
        .route(
            "/api/v1/chats/:session_id/history",
            get(handlers::handle_history),
        )
        // Conversation
        .route("/api/v1/chats/:session_id/turns", post(handlers::handle_turn))
        .route(
            "/api/v1/chats/:session_id/polish",
            post(handlers::handle_polish),
        )
        .route(
            "/api/v1/chats/:session_id/upload",
            post(handlers::handle_upload).layer(upload_limit),
        )
        // Review
        .route(
            "/api/v1/chats/:session_id/analyze",
            post(handlers::handle_analyze),
        )
        .route(
            "/api/v1/chats/:session_id/ats_score",
            post(handlers::handle_ats_score),
        )
        .route(
            "/api/v1/chats/:session_id/tailor",
            post(handlers::handle_tailor),
        )
        // Resume
        .route(
            "/api/v1/chats/:session_id/resume",
            get(handlers::handle_get_resume),
        )
        .route(
            "/api/v1/chats/:session_id/resume/sections",
            get(handlers::handle_get_sections),
        )
        .route(
            "/api/v1/chats/:session_id/resume/preview",
            get(handlers::handle_preview),
        )
        .route(
            "/api/v1/chats/:session_id/sections/:section",
            put(handlers::handle_update_section),
        )
        // Versions
        .route(
            "/api/v1/chats/:session_id/versions",
            post(handlers::handle_save_version).get(handlers::handle_list_versions),
        )
        .route(
            "/api/v1/chats/:session_id/versions/:version",
            get(handlers::handle_get_version),
        )
        .with_state(state)
}
