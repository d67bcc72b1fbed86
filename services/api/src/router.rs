//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ChapterSummary, ChapterView, ChatPayload, ChatResponse, ErrorResponse, ExchangeView,
        ProgressView, SelectChapterPayload, SelectModelPayload, SessionView, SubLessonView,
        SyllabusView, TurnView, UpdateCompletionPayload, UpdateProfilePayload, UsageView,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, patch, post, put},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_syllabus,
        handlers::update_profile,
        handlers::reset_syllabus,
        handlers::get_chapter,
        handlers::update_sub_lesson,
        handlers::get_session,
        handlers::select_model,
        handlers::select_chapter,
        handlers::reset_session,
        handlers::chat,
    ),
    components(
        schemas(
            SyllabusView, ProgressView, ChapterSummary, ChapterView, SubLessonView, TurnView,
            SessionView, ExchangeView, ChatResponse, UsageView, UpdateProfilePayload,
            UpdateCompletionPayload, SelectModelPayload, SelectChapterPayload, ChatPayload,
            ErrorResponse
        )
    ),
    tags(
        (name = "Tutor API", description = "Syllabus progress and chapter-scoped tutoring chat")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/syllabus", get(handlers::get_syllabus))
        .route("/syllabus/reset", post(handlers::reset_syllabus))
        .route("/profile", patch(handlers::update_profile))
        .route("/chapters/{title}", get(handlers::get_chapter))
        .route(
            "/chapters/{title}/sub-lessons/{sub_lesson}",
            put(handlers::update_sub_lesson),
        )
        .route("/session", get(handlers::get_session))
        .route("/session/model", put(handlers::select_model))
        .route("/session/chapter", put(handlers::select_chapter))
        .route("/session/reset", post(handlers::reset_session))
        .route("/chat", post(handlers::chat))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Config, Provider},
        state::Tutor,
    };
    use approx::assert_relative_eq;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;
    use tutor_core::{
        ChatOrchestrator, DocumentStorage, InMemoryStorage, ModelTier, PricingTable,
        SyllabusStore, TutorSession, llm_client::OfflineClient, syllabus::SyllabusDocument,
    };

    fn test_config() -> Config {
        Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            syllabus_path: "syllabus.json".into(),
            provider: Provider::Offline,
            openai_api_key: None,
            openai_org_id: None,
            openai_api_base: None,
            system_prompt: "You are a patient tutor.".to_string(),
            default_model: ModelTier::Economy,
            pricing: PricingTable::default(),
            provider_timeout: None,
            log_level: tracing::Level::INFO,
        }
    }

    fn test_document() -> SyllabusDocument {
        serde_json::from_value(json!({
            "student_name": "Ada",
            "max_context_size": 0,
            "chapters": [
                {
                    "title": "Variables",
                    "sub_lessons": [
                        {"title": "Assignment", "content": "x = 1", "completed": false, "completion_time": null},
                        {"title": "Types", "content": "int, str", "completed": false, "completion_time": null}
                    ],
                    "conversation_history": [],
                    "completed": false,
                    "completion_time": null
                },
                {
                    "title": "Loops",
                    "sub_lessons": [
                        {"title": "For", "content": "for x in xs", "completed": false, "completion_time": null}
                    ],
                    "conversation_history": [],
                    "completed": false,
                    "completion_time": null
                }
            ]
        }))
        .unwrap()
    }

    /// Builds state over an in-memory document and the offline client; the
    /// returned storage handle observes every write.
    fn test_state() -> (AppState, InMemoryStorage) {
        let storage = InMemoryStorage::new();
        let boxed: Box<dyn DocumentStorage> = Box::new(storage.clone());
        let store = SyllabusStore::create(boxed, test_document()).unwrap();
        let config = test_config();
        let session = TutorSession::init_session(config.system_prompt.clone());
        let orchestrator = ChatOrchestrator::new(Arc::new(OfflineClient), config.pricing);
        let state = AppState::new(Tutor::new(store, session), orchestrator, config);
        (state, storage)
    }

    async fn send(
        router: Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_get_syllabus_returns_overview() {
        let (state, _) = test_state();
        let (status, body) = send(create_router(state), Method::GET, "/syllabus", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["student_name"], "Ada");
        assert_eq!(body["progress"]["total"], 3);
        assert_eq!(body["progress"]["percent"], 0);
        assert_eq!(body["chapters"][1]["title"], "Loops");
    }

    #[tokio::test]
    async fn test_update_profile_persists() {
        let (state, storage) = test_state();
        let writes_before = storage.writes();

        let (status, body) = send(
            create_router(state),
            Method::PATCH,
            "/profile",
            Some(json!({"student_name": "Grace", "max_context_size": 6})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["student_name"], "Grace");
        assert_eq!(body["max_context_size"], 6);
        assert_eq!(storage.writes(), writes_before + 2);
    }

    #[tokio::test]
    async fn test_completing_last_sub_lesson_completes_chapter() {
        let (state, _) = test_state();
        let (status, body) = send(
            create_router(state),
            Method::PUT,
            "/chapters/Loops/sub-lessons/For",
            Some(json!({"completed": true})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sub_lessons"][0]["completed"], true);
        assert!(body["sub_lessons"][0]["completion_time"].is_string());
        assert_eq!(body["completed"], true);
    }

    #[tokio::test]
    async fn test_unknown_chapter_and_sub_lesson_are_not_found() {
        let (state, _) = test_state();
        let router = create_router(state);

        let (status, body) = send(router.clone(), Method::GET, "/chapters/Recursion", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().unwrap().contains("Recursion"));

        let (status, _) = send(
            router,
            Method::PUT,
            "/chapters/Loops/sub-lessons/Until",
            Some(json!({"completed": true})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_select_model_accepts_label_and_rejects_unknown() {
        let (state, _) = test_state();
        let router = create_router(state);

        let (status, body) = send(
            router.clone(),
            Method::PUT,
            "/session/model",
            Some(json!({"model": "GPT-4"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model"], "GPT-4");
        assert_eq!(body["provider_model"], "gpt-4");

        let (status, _) = send(
            router,
            Method::PUT,
            "/session/model",
            Some(json!({"model": "davinci"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_select_chapter_requires_existing_chapter() {
        let (state, _) = test_state();
        let router = create_router(state.clone());

        let (status, _) = send(
            router.clone(),
            Method::PUT,
            "/session/chapter",
            Some(json!({"title": "Recursion"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            router,
            Method::PUT,
            "/session/chapter",
            Some(json!({"title": "Loops"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["selected_chapter"], "Loops");
    }

    #[tokio::test]
    async fn test_chat_records_exchange_in_selected_chapter() {
        let (state, storage) = test_state();
        let router = create_router(state.clone());

        send(
            router.clone(),
            Method::PUT,
            "/session/chapter",
            Some(json!({"title": "Loops"})),
        )
        .await;
        let writes_before = storage.writes();

        let (status, body) = send(
            router.clone(),
            Method::POST,
            "/chat",
            Some(json!({"message": "What is a for loop?"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chapter"], "Loops");
        assert_eq!(body["model"], "GPT-3.5");
        assert!(body["response"].as_str().unwrap().contains("What is a for loop?"));
        assert_eq!(storage.writes(), writes_before + 1);

        let total_tokens = body["usage"]["total_tokens"].as_f64().unwrap();
        assert_relative_eq!(body["cost"].as_f64().unwrap(), total_tokens * 0.002 / 1000.0);

        let (_, chapter) = send(router.clone(), Method::GET, "/chapters/Loops", None).await;
        let history = chapter["conversation_history"].as_array().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0]["content"], "What is a for loop?");
        assert_eq!(history[2]["kind"], "usage");
        assert_eq!(history[2]["model"], "gpt-3.5-turbo");

        let (_, other) = send(router, Method::GET, "/chapters/Variables", None).await;
        assert!(other["conversation_history"].as_array().unwrap().is_empty());

        let tutor = state.tutor.lock().await;
        assert_eq!(tutor.session.exchanges().len(), 1);
    }

    #[tokio::test]
    async fn test_chat_defaults_to_first_chapter_and_rejects_blank_message() {
        let (state, storage) = test_state();
        let router = create_router(state);

        let (status, body) = send(
            router.clone(),
            Method::POST,
            "/chat",
            Some(json!({"message": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chapter"], "Variables");

        let writes_before = storage.writes();
        let (status, _) = send(
            router,
            Method::POST,
            "/chat",
            Some(json!({"message": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(storage.writes(), writes_before);
    }

    #[tokio::test]
    async fn test_reset_session_keeps_ledger() {
        let (state, _) = test_state();
        let router = create_router(state);

        send(
            router.clone(),
            Method::POST,
            "/chat",
            Some(json!({"message": "hello", "chapter": "Loops"})),
        )
        .await;

        let (status, body) = send(router.clone(), Method::POST, "/session/reset", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_cost"], 0.0);
        assert!(body["exchanges"].as_array().unwrap().is_empty());

        let (_, chapter) = send(router, Method::GET, "/chapters/Loops", None).await;
        assert_eq!(chapter["conversation_history"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_reset_syllabus_clears_progress_and_history() {
        let (state, _) = test_state();
        let router = create_router(state);

        send(
            router.clone(),
            Method::PUT,
            "/chapters/Loops/sub-lessons/For",
            Some(json!({"completed": true})),
        )
        .await;
        send(
            router.clone(),
            Method::POST,
            "/chat",
            Some(json!({"message": "hello", "chapter": "Loops"})),
        )
        .await;

        let (status, body) = send(router.clone(), Method::POST, "/syllabus/reset", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["progress"]["completed"], 0);
        assert_eq!(body["chapters"][1]["completed"], false);
        assert_eq!(body["chapters"][1]["exchanges"], 0);
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let (state, _) = test_state();
        let (status, body) = send(
            create_router(state),
            Method::GET,
            "/api-docs/openapi.json",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/chat"].is_object());
        assert!(body["paths"]["/chapters/{title}"].is_object());
    }
}
