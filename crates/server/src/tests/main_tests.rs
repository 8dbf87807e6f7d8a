use super::*;
use axum::{body, body::Body, http::Request};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> Router {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let api = ApiContext {
        storage,
        auth: AuthConfig {
            token_secret: "test-secret".to_string(),
            token_ttl_seconds: 3600,
        },
    };
    build_router(api)
}

fn json_request(method: &str, path: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn bare_request(method: &str, path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

async fn signup(app: &Router, name: &str, email: &str) -> String {
    let request = json_request(
        "POST",
        "/auth/signup",
        None,
        &json!({
            "name": name,
            "email": email,
            "password": "sixsix",
            "phone": "(555) 123-4567",
        }),
    );
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let dto = read_json(response).await;
    dto["access_token"].as_str().expect("token").to_string()
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(bytes.as_ref(), b"ok");
}

#[tokio::test]
async fn signup_then_signin_issues_a_fresh_token() {
    let app = test_app().await;
    signup(&app, "Alice", "alice@example.com").await;

    let request = json_request(
        "POST",
        "/auth/signin",
        None,
        &json!({ "email": "alice@example.com", "password": "sixsix" }),
    );
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let dto = read_json(response).await;
    assert_eq!(dto["display_name"], "Alice");
    assert!(!dto["access_token"].as_str().expect("token").is_empty());
}

#[tokio::test]
async fn invalid_signup_fields_read_as_bad_request() {
    let app = test_app().await;
    let request = json_request(
        "POST",
        "/auth/signup",
        None,
        &json!({
            "name": "Alice",
            "email": "alice@nowhere",
            "password": "sixsix",
            "phone": "(555) 123-4567",
        }),
    );
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let dto = read_json(response).await;
    assert_eq!(dto["code"], "validation");
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let app = test_app().await;

    let missing = bare_request("GET", "/pair/status", None);
    let response = app.clone().oneshot(missing).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let dto = read_json(response).await;
    assert_eq!(dto["code"], "unauthorized");

    let garbage = bare_request("GET", "/pair/status", Some("not-a-token"));
    let response = app.oneshot(garbage).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invite_then_accept_pairs_both_accounts() {
    let app = test_app().await;
    let alice = signup(&app, "Alice", "alice@example.com").await;
    let bob = signup(&app, "Bob", "bob@example.com").await;

    let response = app
        .clone()
        .oneshot(bare_request("POST", "/pair/invite", Some(&alice)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let invite = read_json(response).await;
    let code = invite["code"].as_str().expect("code").to_string();
    assert!(code.starts_with("LOVE-"));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/pair/accept",
            Some(&bob),
            &json!({ "code": code }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let paired = read_json(response).await;
    assert_eq!(paired["paired"], true);
    assert_eq!(paired["partner"]["display_name"], "Alice");

    let response = app
        .oneshot(bare_request("GET", "/pair/status", Some(&alice)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let status = read_json(response).await;
    assert_eq!(status["paired"], true);
    assert_eq!(status["partner"]["display_name"], "Bob");
}

#[tokio::test]
async fn pairing_denials_carry_distinct_codes() {
    let app = test_app().await;
    let alice = signup(&app, "Alice", "alice@example.com").await;
    let bob = signup(&app, "Bob", "bob@example.com").await;
    let carol = signup(&app, "Carol", "carol@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/pair/accept",
            Some(&bob),
            &json!({ "code": "LOVE-ZZZZ" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["code"], "invite_not_found");

    let response = app
        .clone()
        .oneshot(bare_request("POST", "/pair/invite", Some(&alice)))
        .await
        .expect("response");
    let code = read_json(response).await["code"]
        .as_str()
        .expect("code")
        .to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/pair/accept",
            Some(&alice),
            &json!({ "code": code }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(response).await["code"], "invite_self_use");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/pair/accept",
            Some(&bob),
            &json!({ "code": code }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/pair/accept",
            Some(&carol),
            &json!({ "code": code }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(response).await["code"], "invite_already_used");

    let response = app
        .oneshot(bare_request("POST", "/pair/invite", Some(&alice)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(response).await["code"], "already_paired");
}

#[tokio::test]
async fn manifestation_routes_cover_the_full_lifecycle() {
    let app = test_app().await;
    let alice = signup(&app, "Alice", "alice@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/manifestations",
            Some(&alice),
            &json!({
                "kind": "individual",
                "title": "Learn salsa",
                "milestones": [{ "label": "Book classes" }],
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let created = read_json(response).await;
    let id = created["id"].as_i64().expect("id");
    assert_eq!(created["kind"], "individual");

    let response = app
        .clone()
        .oneshot(bare_request("GET", "/manifestations", Some(&alice)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let listed = read_json(response).await;
    assert_eq!(listed.as_array().expect("array").len(), 1);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/manifestations/{id}"),
            Some(&alice),
            &json!({ "title": "Learn bachata" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let updated = read_json(response).await;
    assert_eq!(updated["title"], "Learn bachata");
    assert_eq!(updated["milestones"][0]["label"], "Book classes");

    let response = app
        .clone()
        .oneshot(bare_request(
            "DELETE",
            &format!("/manifestations/{id}"),
            Some(&alice),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(bare_request(
            "GET",
            &format!("/manifestations/{id}"),
            Some(&alice),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn due_manifestations_respect_the_cutoff_param() {
    let app = test_app().await;
    let alice = signup(&app, "Alice", "alice@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/manifestations",
            Some(&alice),
            &json!({
                "kind": "individual",
                "title": "Plan anniversary trip",
                "remind_at": "2025-06-18T19:05:00Z",
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(bare_request(
            "GET",
            "/manifestations/due?before=2025-07-01T00:00:00Z",
            Some(&alice),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let due = read_json(response).await;
    assert_eq!(due.as_array().expect("array").len(), 1);

    let response = app
        .oneshot(bare_request(
            "GET",
            "/manifestations/due?before=2025-06-01T00:00:00Z",
            Some(&alice),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let due = read_json(response).await;
    assert_eq!(due.as_array().expect("array").len(), 0);
}

#[tokio::test]
async fn review_routes_cover_crud_and_ordering() {
    let app = test_app().await;
    let alice = signup(&app, "Alice", "alice@example.com").await;
    let bob = signup(&app, "Bob", "bob@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/reviews",
            Some(&alice),
            &json!({
                "date_night_id": 42,
                "rating": 5,
                "message": "Great night",
                "emoji": "🥰",
                "image_urls": ["https://cdn.example.com/a.jpg"],
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let first = read_json(response).await["id"].as_i64().expect("id");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/reviews",
            Some(&bob),
            &json!({ "date_night_id": 42, "rating": 3, "message": "Too crowded" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let second = read_json(response).await["id"].as_i64().expect("id");

    let response = app
        .clone()
        .oneshot(bare_request("GET", "/reviews/date-night/42", Some(&alice)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let listed = read_json(response).await;
    let ids: Vec<i64> = listed
        .as_array()
        .expect("array")
        .iter()
        .map(|review| review["id"].as_i64().expect("id"))
        .collect();
    assert_eq!(ids, vec![second, first]);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/reviews/{first}"),
            Some(&alice),
            &json!({ "rating": 4 }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let updated = read_json(response).await;
    assert_eq!(updated["rating"], 4);
    assert_eq!(updated["message"], "Great night");

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/reviews/{first}"),
            Some(&bob),
            &json!({ "rating": 1 }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(bare_request(
            "DELETE",
            &format!("/reviews/{second}"),
            Some(&bob),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(bare_request(
            "GET",
            &format!("/reviews/{second}"),
            Some(&alice),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let app = test_app().await;
    let alice = signup(&app, "Alice", "alice@example.com").await;

    let huge = "x".repeat(2 * MAX_BODY_BYTES);
    let response = app
        .oneshot(json_request(
            "POST",
            "/reviews",
            Some(&alice),
            &json!({ "date_night_id": 1, "rating": 5, "message": huge }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
