use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use rmessenger::database::{self, DbPool};
use rmessenger::server::route_builder::{build_router, build_state};
use rmessenger::services::identity::JwtIdentityProvider;
use rmessenger::utils::jwt::JwtService;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "integration-secret";

struct TestApp {
    router: Router,
    jwt: JwtService,
}

impl TestApp {
    async fn new() -> (Self, DbPool) {
        let db = database::create_pool("sqlite::memory:").await.unwrap();
        let identity = Arc::new(JwtIdentityProvider::new(JwtService::new(SECRET), db.clone()));
        let router = build_router(build_state(db.clone(), identity));
        (
            Self {
                router,
                jwt: JwtService::new(SECRET),
            },
            db,
        )
    }

    fn token(&self, user_id: &str) -> String {
        self.jwt.generate_token(user_id, Duration::hours(1)).unwrap()
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        user_id: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.token(user_id)),
            );
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()));
        (status, value)
    }
}

async fn insert_user(db: &DbPool, email: &str, first_name: &str, last_name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO users (id, email, first_name, last_name, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .bind(Utc::now().to_rfc3339())
    .execute(db.as_ref())
    .await
    .unwrap();
    id
}

#[tokio::test]
async fn health_is_public() {
    let (app, _db) = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let (app, db) = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/api/messages/list", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    // Well-formed token for a user the directory does not know.
    let ghost = Uuid::new_v4().to_string();
    let (status, _) = app
        .call(Method::GET, "/api/messages/list", Some(&ghost), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let alice = insert_user(&db, "alice@example.com", "Alice", "Smith").await;
    let (status, body) = app
        .call(Method::GET, "/api/messages/list", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn websocket_handshake_rejects_bad_credentials() {
    let (app, _db) = TestApp::new().await;
    let (status, _) = app.call(Method::GET, "/api/ws", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(Method::GET, "/api/ws?token=not-a-jwt", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn identity_header_from_client_is_ignored() {
    let (app, db) = TestApp::new().await;
    let alice = insert_user(&db, "alice@example.com", "Alice", "Smith").await;
    let bob = insert_user(&db, "bob@example.com", "Bob", "Jones").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/messages")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token(&alice)))
        .header("x-user-id", &bob)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"recipient_id": bob, "content": "hi"}).to_string(),
        ))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let message: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(message["sender_id"], alice);
}

#[tokio::test]
async fn message_lifecycle_over_http() {
    let (app, db) = TestApp::new().await;
    let alice = insert_user(&db, "alice@example.com", "Alice", "Smith").await;
    let bob = insert_user(&db, "bob@example.com", "Bob", "Jones").await;
    let carol = insert_user(&db, "carol@example.com", "Carol", "White").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/messages",
            Some(&alice),
            Some(json!({"recipient_id": alice, "content": "note to self"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_recipient");

    let mut ids = Vec::new();
    for i in 0..3 {
        let (status, body) = app
            .call(
                Method::POST,
                "/api/messages",
                Some(&alice),
                Some(json!({"recipient_id": bob, "content": format!("hello {}", i)})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "unread");
        assert_eq!(body["recipient_id"], bob);
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    let (status, page) = app
        .call(
            Method::GET,
            &format!("/api/messages/conversation/{}?limit=2&offset=0", alice),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["has_more"], true);
    assert_eq!(page["data"][0]["content"], "hello 1");
    assert_eq!(page["data"][1]["content"], "hello 2");

    let (_, page) = app
        .call(
            Method::GET,
            "/api/messages/received?limit=500&offset=-4",
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(page["data"].as_array().unwrap().len(), 3);
    assert_eq!(page["has_more"], false);

    let (_, page) = app
        .call(Method::GET, "/api/messages/sent", Some(&bob), None)
        .await;
    assert_eq!(page["total"], 0);

    let (_, list) = app
        .call(Method::GET, "/api/messages/list", Some(&bob), None)
        .await;
    assert_eq!(list[0]["other_user_id"], alice);
    assert_eq!(list[0]["other_user_name"], "Alice Smith");
    assert_eq!(list[0]["last_message"], "hello 2");
    assert_eq!(list[0]["unread_count"], 3);

    let status_uri = format!("/api/messages/{}/status", ids[0]);
    let (status, body) = app
        .call(
            Method::PATCH,
            &status_uri,
            Some(&carol),
            Some(json!({"status": "read"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = app
        .call(
            Method::PATCH,
            &status_uri,
            Some(&bob),
            Some(json!({"status": "read"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "read");

    let (_, list) = app
        .call(Method::GET, "/api/messages/list", Some(&bob), None)
        .await;
    assert_eq!(list[0]["unread_count"], 2);

    let one_uri = format!("/api/messages/{}", ids[1]);
    let (status, _) = app.call(Method::GET, &one_uri, Some(&carol), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(Method::DELETE, &one_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (status, body) = app.call(Method::DELETE, &one_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = app.call(Method::GET, &one_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, page) = app
        .call(
            Method::GET,
            &format!("/api/messages/conversation/{}", bob),
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(page["total"], 2);
}

#[tokio::test]
async fn far_offsets_return_an_empty_page() {
    let (app, db) = TestApp::new().await;
    let alice = insert_user(&db, "alice@example.com", "Alice", "Smith").await;
    let bob = insert_user(&db, "bob@example.com", "Bob", "Jones").await;
    app.call(
        Method::POST,
        "/api/messages",
        Some(&alice),
        Some(json!({"recipient_id": bob, "content": "hi"})),
    )
    .await;

    let uris = [
        format!("/api/messages/received?offset={}", i64::MAX),
        format!("/api/messages/sent?offset={}&limit=100", i64::MAX),
        format!("/api/messages/conversation/{}?offset={}", alice, i64::MAX),
    ];
    for uri in uris {
        let (status, page) = app.call(Method::GET, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(page["data"], json!([]));
        assert_eq!(page["has_more"], false);
    }
}

#[tokio::test]
async fn content_only_has_to_be_non_empty() {
    let (app, db) = TestApp::new().await;
    let alice = insert_user(&db, "alice@example.com", "Alice", "Smith").await;
    let bob = insert_user(&db, "bob@example.com", "Bob", "Jones").await;

    let long = "x".repeat(4001);
    for content in [long.as_str(), "   "] {
        let (status, body) = app
            .call(
                Method::POST,
                "/api/messages",
                Some(&alice),
                Some(json!({"recipient_id": bob, "content": content})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"], content);
    }

    let (status, body) = app
        .call(
            Method::POST,
            "/api/messages",
            Some(&alice),
            Some(json!({"recipient_id": bob, "content": ""})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn malformed_requests_use_the_error_body() {
    let (app, db) = TestApp::new().await;
    let alice = insert_user(&db, "alice@example.com", "Alice", "Smith").await;
    let bob = insert_user(&db, "bob@example.com", "Bob", "Jones").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/messages",
            Some(&alice),
            Some(json!({"recipient_id": bob})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (_, message) = app
        .call(
            Method::POST,
            "/api/messages",
            Some(&alice),
            Some(json!({"recipient_id": bob, "content": "hi"})),
        )
        .await;
    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/api/messages/{}/status", message["id"].as_str().unwrap()),
            Some(&bob),
            Some(json!({"status": "archived"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = app
        .call(Method::GET, "/api/messages/received?limit=abc", Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].is_string());
}
