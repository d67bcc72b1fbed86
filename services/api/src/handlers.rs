//! Axum Handlers for the REST API
//!
//! Each handler turns one learner intent (rename, toggle a sub-lesson, send a
//! chat message, ...) into a call on the shared tutor and returns a fresh
//! read-only view. It uses `utoipa` doc comments to generate OpenAPI
//! documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, info, warn};
use tutor_core::{ModelTier, TutorError};

use crate::{
    models::{
        ChapterView, ChatPayload, ChatResponse, ErrorResponse, SelectChapterPayload,
        SelectModelPayload, SessionView, SyllabusView, UpdateCompletionPayload,
        UpdateProfilePayload,
    },
    state::{AppState, Tutor},
};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
    InternalServerError(TutorError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::BadGateway(message) => {
                (StatusCode::BAD_GATEWAY, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl From<TutorError> for ApiError {
    fn from(err: TutorError) -> Self {
        match err {
            TutorError::ChapterNotFound { .. } | TutorError::SubLessonNotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            TutorError::EmptyMessage => Self::BadRequest(err.to_string()),
            TutorError::Provider(e) => {
                warn!(kind = %e.kind, "Chat turn failed at the provider");
                Self::BadGateway(e.to_string())
            }
            TutorError::Storage(_) => Self::InternalServerError(err),
        }
    }
}

/// Get the syllabus overview: learner profile, progress and chapters.
#[utoipa::path(
    get,
    path = "/syllabus",
    responses(
        (status = 200, description = "Syllabus overview", body = SyllabusView)
    )
)]
pub async fn get_syllabus(State(state): State<AppState>) -> Json<SyllabusView> {
    let tutor = state.tutor.lock().await;
    Json(SyllabusView::from(tutor.store.document()))
}

/// Update the learner's name and/or the context size sent to the model.
#[utoipa::path(
    patch,
    path = "/profile",
    request_body = UpdateProfilePayload,
    responses(
        (status = 200, description = "Profile updated", body = SyllabusView),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<Json<SyllabusView>, ApiError> {
    let mut tutor = state.tutor.lock().await;
    if let Some(name) = &payload.student_name {
        tutor.store.update_student_name(name)?;
    }
    if let Some(size) = payload.max_context_size {
        tutor.store.update_max_context_size(size)?;
    }
    Ok(Json(SyllabusView::from(tutor.store.document())))
}

/// Reset all completion state and every chapter's conversation history.
#[utoipa::path(
    post,
    path = "/syllabus/reset",
    responses(
        (status = 200, description = "Syllabus reset", body = SyllabusView),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn reset_syllabus(State(state): State<AppState>) -> Result<Json<SyllabusView>, ApiError> {
    let mut tutor = state.tutor.lock().await;
    tutor.store.reset()?;
    info!("Syllabus reset requested by client");
    Ok(Json(SyllabusView::from(tutor.store.document())))
}

/// Get one chapter with its sub-lessons and conversation history.
#[utoipa::path(
    get,
    path = "/chapters/{title}",
    responses(
        (status = 200, description = "Chapter details", body = ChapterView),
        (status = 404, description = "Chapter not found", body = ErrorResponse)
    ),
    params(
        ("title" = String, Path, description = "Chapter title")
    )
)]
pub async fn get_chapter(
    State(state): State<AppState>,
    Path(title): Path<String>,
) -> Result<Json<ChapterView>, ApiError> {
    let tutor = state.tutor.lock().await;
    let chapter = tutor.store.get_chapter(&title)?;
    Ok(Json(ChapterView::new(chapter, &state.config.pricing)))
}

/// Mark a sub-lesson as completed or not completed.
#[utoipa::path(
    put,
    path = "/chapters/{title}/sub-lessons/{sub_lesson}",
    request_body = UpdateCompletionPayload,
    responses(
        (status = 200, description = "Completion updated", body = ChapterView),
        (status = 404, description = "Chapter or sub-lesson not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("title" = String, Path, description = "Chapter title"),
        ("sub_lesson" = String, Path, description = "Sub-lesson title")
    )
)]
pub async fn update_sub_lesson(
    State(state): State<AppState>,
    Path((title, sub_lesson)): Path<(String, String)>,
    Json(payload): Json<UpdateCompletionPayload>,
) -> Result<Json<ChapterView>, ApiError> {
    let mut tutor = state.tutor.lock().await;
    tutor
        .store
        .update_sub_lesson_completion(&title, &sub_lesson, payload.completed)?;
    let chapter = tutor.store.get_chapter(&title)?;
    Ok(Json(ChapterView::new(chapter, &state.config.pricing)))
}

/// Get the running chat session: selected model, chapter and running cost.
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Session state", body = SessionView)
    )
)]
pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    let tutor = state.tutor.lock().await;
    Json(SessionView::from(&tutor.session))
}

/// Select the model used for the following chat turns.
#[utoipa::path(
    put,
    path = "/session/model",
    request_body = SelectModelPayload,
    responses(
        (status = 200, description = "Model selected", body = SessionView),
        (status = 400, description = "Unknown model", body = ErrorResponse)
    )
)]
pub async fn select_model(
    State(state): State<AppState>,
    Json(payload): Json<SelectModelPayload>,
) -> Result<Json<SessionView>, ApiError> {
    let model: ModelTier = payload
        .model
        .parse()
        .map_err(|e: tutor_core::pricing::UnknownModel| ApiError::BadRequest(e.to_string()))?;
    let mut tutor = state.tutor.lock().await;
    tutor.session.select_model(model);
    info!(%model, "Model selected");
    Ok(Json(SessionView::from(&tutor.session)))
}

/// Select the chapter whose ledger receives the following chat turns.
#[utoipa::path(
    put,
    path = "/session/chapter",
    request_body = SelectChapterPayload,
    responses(
        (status = 200, description = "Chapter selected", body = SessionView),
        (status = 404, description = "Chapter not found", body = ErrorResponse)
    )
)]
pub async fn select_chapter(
    State(state): State<AppState>,
    Json(payload): Json<SelectChapterPayload>,
) -> Result<Json<SessionView>, ApiError> {
    let mut tutor = state.tutor.lock().await;
    tutor.store.get_chapter(&payload.title)?;
    tutor.session.select_chapter(payload.title);
    Ok(Json(SessionView::from(&tutor.session)))
}

/// Clear the running conversation and its cost. Chapter ledgers are kept.
#[utoipa::path(
    post,
    path = "/session/reset",
    responses(
        (status = 200, description = "Session cleared", body = SessionView)
    )
)]
pub async fn reset_session(State(state): State<AppState>) -> Json<SessionView> {
    let mut tutor = state.tutor.lock().await;
    tutor.session.reset_session();
    info!("Conversation session cleared");
    Json(SessionView::from(&tutor.session))
}

/// Send a chat message to the tutor within a chapter.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatPayload,
    responses(
        (status = 200, description = "Tutor reply", body = ChatResponse),
        (status = 400, description = "Empty message or no chapter to chat in", body = ErrorResponse),
        (status = 404, description = "Chapter not found", body = ErrorResponse),
        (status = 502, description = "Model provider failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatPayload>,
) -> Result<Json<ChatResponse>, ApiError> {
    let mut guard = state.tutor.lock().await;
    let Tutor { store, session } = &mut *guard;

    let chapter = payload
        .chapter
        .or_else(|| session.selected_chapter().map(str::to_string))
        .or_else(|| store.document().chapters.first().map(|c| c.title.clone()))
        .ok_or_else(|| ApiError::BadRequest("The syllabus has no chapters".to_string()))?;

    let outcome = state
        .orchestrator
        .submit_turn(store, session, &payload.message, &chapter)
        .await?;

    let model = session.model().label().to_string();
    Ok(Json(ChatResponse::new(chapter, model, outcome)))
}
