//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (one session per connection)
/// - JSON API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/topics", get(http::http_topics))
        .route("/api/v1/leaderboard", get(http::http_leaderboard))
        .route("/api/v1/sessions", post(http::http_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(http::http_get_session).delete(http::http_end_session),
        )
        .route("/api/v1/sessions/:id/start", post(http::http_start))
        .route("/api/v1/sessions/:id/next", post(http::http_next))
        .route("/api/v1/sessions/:id/answer", post(http::http_update_answer))
        .route("/api/v1/sessions/:id/submit", post(http::http_submit))
        .route("/api/v1/sessions/:id/restart", post(http::http_restart))
        .route("/api/v1/sessions/:id/practice", post(http::http_practice))
        .route("/api/v1/sessions/:id/choice", post(http::http_choice))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::leaderboard::LeaderboardStore;
    use crate::prompt::PromptBuilder;
    use crate::session::tests::ScriptedOracle;

    fn app(dir: &tempfile::TempDir) -> Router {
        let state = AppState::new(
            Arc::new(ScriptedOracle::numbered()),
            PromptBuilder::default(),
            LeaderboardStore::new(dir.path().join("board.csv")),
        );
        build_router(Arc::new(state))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn health_and_topics() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);
        let (status, body) = call(&app, Method::GET, "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "sessions": 0 }));

        call(&app, Method::POST, "/api/v1/sessions", None).await;
        let (_, body) = call(&app, Method::GET, "/api/v1/health", None).await;
        assert_eq!(body["sessions"], 1);

        let (_, body) = call(&app, Method::GET, "/api/v1/topics", None).await;
        assert!(body["topics"].as_array().unwrap().len() > 1);
    }

    #[tokio::test]
    async fn course_walk_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        let (status, created) = call(&app, Method::POST, "/api/v1/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["view"]["stepName"], "welcome");
        let base = format!("/api/v1/sessions/{}", created["sessionId"].as_str().unwrap());

        let (status, view) =
            call(&app, Method::POST, &format!("{base}/start"), Some(json!({ "topic": "food safety" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["stepIndex"], 1);
        assert_eq!(view["topic"], "food safety");
        assert_eq!(view["caseStudy"]["scenario"]["kind"], "generated");

        for _ in 0..3 {
            let (status, _) = call(&app, Method::POST, &format!("{base}/next"), None).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (_, view) = call(&app, Method::GET, &base, None).await;
        assert_eq!(view["stepName"], "test");
        assert!(view["testQuestion"]["text"].is_string());

        let (status, view) =
            call(&app, Method::POST, &format!("{base}/submit"), Some(json!({ "answer": "Plan" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["feedback"]["score"], json!({ "kind": "found", "value": 7 }));

        let (status, view) = call(&app, Method::POST, &format!("{base}/restart"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["stepIndex"], 0);

        let (status, _) = call(&app, Method::DELETE, &base, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = call(&app, Method::GET, &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "unknown session");
    }

    #[tokio::test]
    async fn out_of_order_action_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);
        let (_, created) = call(&app, Method::POST, "/api/v1/sessions", None).await;
        let base = format!("/api/v1/sessions/{}", created["sessionId"].as_str().unwrap());

        let (status, body) =
            call(&app, Method::POST, &format!("{base}/submit"), Some(json!({ "answer": "x" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("submit_test"));
    }

    #[tokio::test]
    async fn practice_choice_updates_leaderboard() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);
        let (_, created) = call(&app, Method::POST, "/api/v1/sessions", None).await;
        let base = format!("/api/v1/sessions/{}", created["sessionId"].as_str().unwrap());

        let (status, view) = call(&app, Method::POST, &format!("{base}/practice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(view["practice"]["scenario"]["text"].is_string());

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("{base}/choice"),
            Some(json!({ "player": "Alice", "answer": "Call the supplier." })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["leaderboardEntry"], json!({ "player": "Alice", "score": 7 }));

        let (_, board) = call(&app, Method::GET, "/api/v1/leaderboard", None).await;
        assert_eq!(board, json!({ "entries": [{ "player": "Alice", "score": 7 }] }));
    }

    #[tokio::test]
    async fn blank_player_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);
        let (_, created) = call(&app, Method::POST, "/api/v1/sessions", None).await;
        let base = format!("/api/v1/sessions/{}", created["sessionId"].as_str().unwrap());
        call(&app, Method::POST, &format!("{base}/practice"), None).await;

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("{base}/choice"),
            Some(json!({ "player": "  ", "answer": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
