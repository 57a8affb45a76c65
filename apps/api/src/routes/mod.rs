pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::resumes::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resume API
        .route(
            "/api/v1/resumes",
            get(handlers::handle_list).post(handlers::handle_create),
        )
        .route(
            "/api/v1/resumes/:id",
            get(handlers::handle_get)
                .patch(handlers::handle_update)
                .delete(handlers::handle_delete),
        )
        .route(
            "/api/v1/resumes/:id/duplicate",
            post(handlers::handle_duplicate),
        )
        .route(
            "/api/v1/resumes/:id/assistant-patch",
            post(handlers::handle_assistant_patch),
        )
        // Render API
        .route("/api/v1/resumes/:id/preview", get(handlers::handle_preview))
        .route(
            "/api/v1/resumes/:id/export",
            get(handlers::handle_export_saved),
        )
        .route("/api/v1/export", post(handlers::handle_export_draft))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, OnceLock};
    use std::time::Duration;

    use axum::body::{to_bytes, Body, Bytes};
    use axum::http::{header, HeaderMap, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::models::resume::ResumeData;
    use crate::render::glyphs::FontBook;
    use crate::render::{ExportSettings, Exporter, HostDocument, TinySkiaRasterizer};
    use crate::resumes::MemoryResumeStore;

    fn no_fonts() -> &'static FontBook {
        static EMPTY: OnceLock<FontBook> = OnceLock::new();
        EMPTY.get_or_init(FontBook::empty)
    }

    fn state_with(settle: Duration, export_timeout: Duration) -> AppState {
        let exporter = Exporter::new(
            Arc::new(HostDocument::new(settle)),
            ExportSettings::default(),
            Arc::new(TinySkiaRasterizer::with_fonts(no_fonts())),
        );
        AppState {
            store: Arc::new(MemoryResumeStore::new()),
            exporter: Arc::new(exporter),
            export_timeout,
        }
    }

    fn app() -> Router {
        build_router(state_with(Duration::ZERO, Duration::from_secs(30)))
    }

    fn valid_data() -> ResumeData {
        let mut data = crate::render::layout::tests::sample_resume();
        data.experience[1].location = "Pune".into();
        data
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Bytes) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user.to_string());
        }
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, bytes)
    }

    fn json_of(bytes: &Bytes) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    async fn create(app: &Router, user: Uuid, name: &str) -> Value {
        let (status, _, body) = send(
            app,
            Method::POST,
            "/api/v1/resumes",
            Some(user),
            Some(json!({"name": name, "data": valid_data()})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        json_of(&body)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, _, body) = send(&app(), Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_caller_is_unauthorized() {
        let (status, _, body) = send(&app(), Method::GET, "/api/v1/resumes", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json_of(&body)["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_crud_round_trip() {
        let app = app();
        let user = Uuid::new_v4();
        let created = create(&app, user, "Main").await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["data"]["personalInfo"]["name"], "Ved Gupta");

        let (status, _, body) = send(&app, Method::GET, &format!("/api/v1/resumes/{id}"), Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["name"], "Main");

        let (status, _, body) = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/resumes/{id}"),
            Some(user),
            Some(json!({"name": "Renamed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["name"], "Renamed");

        let (status, _, body) = send(
            &app,
            Method::POST,
            &format!("/api/v1/resumes/{id}/duplicate"),
            Some(user),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json_of(&body)["name"], "Copy of Renamed");

        let (_, _, body) = send(&app, Method::GET, "/api/v1/resumes", Some(user), None).await;
        let names: Vec<String> = json_of(&body)
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Copy of Renamed", "Renamed"]);

        let (status, _, _) = send(&app, Method::DELETE, &format!("/api/v1/resumes/{id}"), Some(user), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _, body) = send(&app, Method::GET, &format!("/api/v1/resumes/{id}"), Some(user), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_of(&body)["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_other_users_cannot_read() {
        let app = app();
        let created = create(&app, Uuid::new_v4(), "Main").await;
        let id = created["id"].as_str().unwrap();
        let (status, _, _) = send(
            &app,
            Method::GET,
            &format!("/api/v1/resumes/{id}"),
            Some(Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_create_lists_every_issue() {
        let mut data = valid_data();
        data.summary.clear();
        data.personal_info.email = "nope".into();
        let (status, _, body) = send(
            &app(),
            Method::POST,
            "/api/v1/resumes",
            Some(Uuid::new_v4()),
            Some(json!({"name": "", "data": data})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body = json_of(&body);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        let message = body["error"]["message"].as_str().unwrap();
        for field in ["name:", "personalInfo.email:", "summary:"] {
            assert!(message.contains(field), "{field} missing from {message}");
        }
    }

    #[tokio::test]
    async fn test_assistant_patch_merges_and_validates() {
        let app = app();
        let user = Uuid::new_v4();
        let created = create(&app, user, "Main").await;
        let id = created["id"].as_str().unwrap();
        let uri = format!("/api/v1/resumes/{id}/assistant-patch");

        let (status, _, body) = send(
            &app,
            Method::POST,
            &uri,
            Some(user),
            Some(json!({"personalInfo": {"title": "Staff Engineer"}, "skills": ["Rust", "Go"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body = json_of(&body);
        assert_eq!(body["data"]["personalInfo"]["title"], "Staff Engineer");
        assert_eq!(body["data"]["personalInfo"]["name"], "Ved Gupta");
        assert_eq!(body["data"]["skills"], json!(["Rust", "Go"]));

        let (status, _, _) = send(
            &app,
            Method::POST,
            &uri,
            Some(user),
            Some(json!({"personalInfo": {"email": "broken"}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "merged result is validated");

        let (status, _, _) = send(&app, Method::POST, &uri, Some(user), Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_preview_returns_tree() {
        let app = app();
        let user = Uuid::new_v4();
        let created = create(&app, user, "Main").await;
        let id = created["id"].as_str().unwrap();
        let (status, _, body) = send(
            &app,
            Method::GET,
            &format!("/api/v1/resumes/{id}/preview"),
            Some(user),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json_of(&body)["nodes"].as_array().is_some_and(|n| !n.is_empty()));
    }

    #[tokio::test]
    async fn test_export_saved_resume() {
        let app = app();
        let user = Uuid::new_v4();
        let created = create(&app, user, "Main").await;
        let id = created["id"].as_str().unwrap();
        let (status, headers, body) = send(
            &app,
            Method::GET,
            &format!("/api/v1/resumes/{id}/export"),
            Some(user),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"ved-gupta.pdf\""
        );
        assert!(body.starts_with(b"%PDF"));
        assert!(headers.contains_key("x-export-pages"));
    }

    #[tokio::test]
    async fn test_export_draft_uses_fallback_name() {
        let (status, headers, body) = send(
            &app(),
            Method::POST,
            "/api/v1/export",
            Some(Uuid::new_v4()),
            Some(json!({"summary": "Draft only"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"resume.pdf\""
        );
        assert!(body.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_export_captures_current_preview() {
        let state = state_with(Duration::ZERO, Duration::from_secs(30));
        let app = build_router(state.clone());
        let user = Uuid::new_v4();
        let created = create(&app, user, "Main").await;
        let id = created["id"].as_str().unwrap();
        let export_uri = format!("/api/v1/resumes/{id}/export");

        let (_, headers, _) = send(&app, Method::GET, &export_uri, Some(user), None).await;
        assert_eq!(headers["x-export-reused-preview"], "false", "no preview yet");

        let (status, _, _) = send(&app, Method::GET, &format!("/api/v1/resumes/{id}/preview"), Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.exporter.host().contains(&format!("preview-{id}")));
        let (status, headers, body) = send(&app, Method::GET, &export_uri, Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["x-export-reused-preview"], "true");
        assert!(body.starts_with(b"%PDF"));

        let mut edited = valid_data();
        edited.summary = "Rewritten summary".into();
        let (status, _, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/resumes/{id}"),
            Some(user),
            Some(json!({"data": edited})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, headers, _) = send(&app, Method::GET, &export_uri, Some(user), None).await;
        assert_eq!(headers["x-export-reused-preview"], "false", "an edited résumé is laid out again");

        send(&app, Method::DELETE, &format!("/api/v1/resumes/{id}"), Some(user), None).await;
        assert!(!state.exporter.host().contains(&format!("preview-{id}")));
        assert_eq!(state.exporter.host().mounted_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_export_times_out() {
        let app = build_router(state_with(Duration::from_secs(3600), Duration::from_millis(10)));
        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/v1/export",
            Some(Uuid::new_v4()),
            Some(json!({"summary": "Draft only"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_of(&body)["error"]["code"], "EXPORT_TIMEOUT");
    }
}
