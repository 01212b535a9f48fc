/// Integration tests: drive the full router (auth middleware included)
/// against an in-memory database and check the observable behavior of
/// every landing-page operation.
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use pagemaker_api::auth::AppStateInner;
use pagemaker_db::Database;

fn app() -> Router {
    let db = Database::open_in_memory().unwrap();
    let state = Arc::new(AppStateInner {
        db,
        jwt_secret: "test-secret".to_string(),
    });
    pagemaker_api::router(state)
}

async fn send(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
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

async fn register(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"username": username, "password": "password123"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().unwrap().to_string()
}

async fn create_page(app: &Router, token: &str, url: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/pages",
        Some(token),
        Some(json!({"url": url, "description": "test page"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
    body
}

#[tokio::test]
async fn rejects_requests_without_token() {
    let app = app();
    let (status, _) = send(&app, "GET", "/pages", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/pages", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn guest_token_reaches_protected_routes() {
    let app = app();
    let (status, body) = send(&app, "POST", "/auth/guest", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();

    let (status, pages) = send(&app, "GET", "/pages", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pages.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn guest_cannot_login_by_password() {
    let app = app();
    let (status, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"username": "guest", "password": "anything!"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_assigns_section_order_by_position() {
    let app = app();
    let token = register(&app, "alice").await;

    let (status, page) = send(
        &app,
        "POST",
        "/pages",
        Some(&token),
        Some(json!({
            "url": "https://example.com/launch",
            "description": "launch page",
            "sections": [
                {"name": "Hero", "intro": "Welcome",
                 "buttons": [{"label": "Go", "link_type": "url", "value": "https://example.com"}]},
                {"name": "Gallery",
                 "images": [{"url": "https://example.com/a.png", "alt": "a"},
                            {"url": "https://example.com/b.png"}]},
                {"name": "Footer"}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", page);

    let sections = page["sections"].as_array().unwrap();
    assert_eq!(sections.len(), 3);
    for (index, section) in sections.iter().enumerate() {
        assert_eq!(section["order"], json!(index));
    }
    assert_eq!(sections[0]["name"], "Hero");
    assert_eq!(sections[0]["buttons"][0]["link_type"], "url");
    assert_eq!(sections[1]["images"].as_array().unwrap().len(), 2);

    // Round trip through getById
    let id = page["id"].as_str().unwrap();
    let (status, fetched) = send(&app, "GET", &format!("/pages/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["sections"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn create_rejects_invalid_input_with_message() {
    let app = app();
    let token = register(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/pages",
        Some(&token),
        Some(json!({"url": "not a url", "description": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid URL format");

    let (status, body) = send(
        &app,
        "POST",
        "/pages",
        Some(&token),
        Some(json!({"url": "https://example.com", "description": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Description is required");
}

#[tokio::test]
async fn url_conflict_is_scoped_to_owner() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    create_page(&app, &alice, "https://example.com/shared").await;

    // Same owner, same url: conflict
    let (status, body) = send(
        &app,
        "POST",
        "/pages",
        Some(&alice),
        Some(json!({"url": "https://example.com/shared", "description": "again"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "A landing page with this URL already exists");

    // Different owner, same url: fine
    let (status, _) = send(
        &app,
        "POST",
        "/pages",
        Some(&bob),
        Some(json!({"url": "https://example.com/shared", "description": "bob's"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn cross_user_access_presents_as_not_found() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let page = create_page(&app, &alice, "https://example.com/private").await;
    let id = page["id"].as_str().unwrap();

    for (method, path) in [
        ("GET", format!("/pages/{}", id)),
        ("GET", format!("/pages/{}/export", id)),
        ("POST", format!("/pages/{}/duplicate", id)),
        ("POST", format!("/pages/{}/archive", id)),
        ("DELETE", format!("/pages/{}", id)),
    ] {
        let (status, _) = send(&app, method, &path, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, path);
    }

    // Still there for the owner
    let (status, _) = send(&app, "GET", &format!("/pages/{}", id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_picks_next_free_suffix() {
    let app = app();
    let token = register(&app, "alice").await;

    let page = create_page(&app, &token, "https://example.com/foo").await;
    create_page(&app, &token, "https://example.com/foo-2").await;
    create_page(&app, &token, "https://example.com/foo-3").await;

    let id = page["id"].as_str().unwrap();
    let (status, copy) = send(
        &app,
        "POST",
        &format!("/pages/{}/duplicate", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(copy["url"], "https://example.com/foo-4");
}

#[tokio::test]
async fn duplicate_deep_copies_the_section_tree() {
    let app = app();
    let token = register(&app, "alice").await;

    let (status, page) = send(
        &app,
        "POST",
        "/pages",
        Some(&token),
        Some(json!({
            "url": "https://example.com/src",
            "description": "source",
            "sections": [
                {"name": "Hero", "title": "Big",
                 "buttons": [{"label": "Go", "link_type": "scroll", "value": "#contact"}]},
                {"name": "Gallery",
                 "images": [{"url": "https://example.com/a.png", "alt": "a"}]}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = page["id"].as_str().unwrap();
    let (status, copy) = send(
        &app,
        "POST",
        &format!("/pages/{}/duplicate", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    assert_ne!(copy["id"], page["id"]);
    assert_eq!(copy["url"], "https://example.com/src-2");
    assert_eq!(copy["description"], "source");
    assert_eq!(copy["archived"], false);

    let sections = copy["sections"].as_array().unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0]["name"], "Hero");
    assert_eq!(sections[0]["title"], "Big");
    assert_eq!(sections[0]["order"], 0);
    assert_eq!(sections[0]["buttons"][0]["label"], "Go");
    assert_eq!(sections[0]["buttons"][0]["link_type"], "scroll");
    assert_eq!(sections[0]["buttons"][0]["value"], "#contact");
    assert_eq!(sections[1]["name"], "Gallery");
    assert_eq!(sections[1]["order"], 1);
    assert_eq!(sections[1]["images"][0]["url"], "https://example.com/a.png");
    assert_eq!(sections[1]["images"][0]["alt"], "a");
}

#[tokio::test]
async fn update_checks_conflicts_but_allows_own_url() {
    let app = app();
    let token = register(&app, "alice").await;

    let page = create_page(&app, &token, "https://example.com/one").await;
    create_page(&app, &token, "https://example.com/two").await;
    let id = page["id"].as_str().unwrap();

    // Colliding with the other page: conflict
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/pages/{}", id),
        Some(&token),
        Some(json!({"url": "https://example.com/two"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Updating to its own current url: allowed
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/pages/{}", id),
        Some(&token),
        Some(json!({"url": "https://example.com/one", "description": "fresh"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Partial update leaves the other field alone
    let (status, updated) = send(
        &app,
        "PATCH",
        &format!("/pages/{}", id),
        Some(&token),
        Some(json!({"description": "newer"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["url"], "https://example.com/one");
    assert_eq!(updated["description"], "newer");
}

#[tokio::test]
async fn archive_and_unarchive_move_between_listings() {
    let app = app();
    let token = register(&app, "alice").await;

    let page = create_page(&app, &token, "https://example.com/park").await;
    let id = page["id"].as_str().unwrap();

    let (_, archived) = send(
        &app,
        "POST",
        &format!("/pages/{}/archive", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(archived["archived"], true);

    let (_, active) = send(&app, "GET", "/pages", Some(&token), None).await;
    assert_eq!(active.as_array().unwrap().len(), 0);
    let (_, parked) = send(&app, "GET", "/pages?archived=true", Some(&token), None).await;
    assert_eq!(parked.as_array().unwrap().len(), 1);

    let (_, restored) = send(
        &app,
        "POST",
        &format!("/pages/{}/unarchive", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(restored["archived"], false);

    let (_, active) = send(&app, "GET", "/pages", Some(&token), None).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_removes_page_and_nested_content() {
    let app = app();
    let token = register(&app, "alice").await;

    let (status, page) = send(
        &app,
        "POST",
        "/pages",
        Some(&token),
        Some(json!({
            "url": "https://example.com/gone",
            "description": "doomed",
            "sections": [{"name": "Hero",
                "buttons": [{"label": "Go", "link_type": "url", "value": "https://example.com"}],
                "images": [{"url": "https://example.com/a.png"}]}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = page["id"].as_str().unwrap();

    let (status, body) = send(&app, "DELETE", &format!("/pages/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = send(&app, "GET", &format!("/pages/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(
        &app,
        "GET",
        &format!("/pages/{}/export", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_renders_the_document() {
    let app = app();
    let token = register(&app, "alice").await;

    let (status, page) = send(
        &app,
        "POST",
        "/pages",
        Some(&token),
        Some(json!({
            "url": "https://example.com/launch",
            "description": "launch page",
            "sections": [
                {"name": "Hero", "intro": "Welcome",
                 "buttons": [{"label": "Buy", "link_type": "url", "value": "https://example.com/buy"}]},
                {"name": "Gallery",
                 "images": [{"url": "https://example.com/a.png"},
                            {"url": "https://example.com/b.png"}]}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = page["id"].as_str().unwrap();

    let (status, export) = send(
        &app,
        "GET",
        &format!("/pages/{}/export", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["filename"], format!("landing-page-{}.txt", id));

    let content = export["content"].as_str().unwrap();
    assert!(content.starts_with("LANDING PAGE: https://example.com/launch\nDESCRIPTION: launch page\n\n"));
    assert!(content.contains("=== SECTION 1: Hero ===\n"));
    assert!(content.contains("Intro: Welcome\n"));
    assert!(content.contains("Buttons: Buy -> https://example.com/buy (url)\n"));
    assert!(content.contains("=== SECTION 2: Gallery ===\n"));
    assert!(content.contains("Images: https://example.com/a.png, https://example.com/b.png\n"));
    assert!(content.contains("\n---\nTotal Sections: 2\nGenerated: "));
}
