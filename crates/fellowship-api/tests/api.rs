use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use fellowship_api::router;
use fellowship_api::state::AppStateInner;
use fellowship_api::storage::Storage;
use fellowship_db::Database;

async fn app() -> Router {
    let dir = std::env::temp_dir().join(format!("fellowship-api-test-{}", Uuid::new_v4()));
    let storage = Storage::new(dir, "http://localhost:3000").await.unwrap();
    let state = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "test-secret".into(),
        storage,
        mailer: None,
        push: None,
        public_url: "http://localhost:3000".into(),
    });
    router::build(state)
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Registers a user and returns `(id, token)`.
async fn register(app: &Router, email: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": email, "name": "Test User", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (
        body["user"]["id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn create_event(app: &Router, token: &str, capacity: Option<u32>) -> String {
    let starts_at = Utc::now() + Duration::days(7);
    let (status, body) = send(
        app,
        "POST",
        "/api/events",
        Some(token),
        Some(json!({ "title": "Harvest supper", "starts_at": starts_at, "capacity": capacity })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/api/prayers", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, "GET", "/api/prayers", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn first_user_is_admin_and_login_works() {
    let app = app().await;
    let (_, admin_token) = register(&app, "pastor@example.org").await;
    register(&app, "member@example.org").await;

    let (_, me) = send(&app, "GET", "/api/auth/me", Some(&admin_token), None).await;
    assert_eq!(me["role"], "admin");

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "MEMBER@example.org", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "member");

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "member@example.org", "password": "wrong password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let app = app().await;
    register(&app, "choir@example.org").await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": "Choir@example.org", "name": "Other", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email is already registered");
}

#[tokio::test]
async fn validation_errors_are_reported_verbatim() {
    let app = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": "usher@example.org", "name": "Usher", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password must be at least 8 characters");

    let (_, token) = register(&app, "usher@example.org").await;
    let (status, body) = send(&app, "POST", "/api/prayers", Some(&token), Some(json!({ "content": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Content is required");
}

#[tokio::test]
async fn suspended_users_are_locked_out() {
    let app = app().await;
    let (_, admin) = register(&app, "admin@example.org").await;
    let (member_id, member) = register(&app, "member@example.org").await;

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/admin/users/{}", member_id),
        Some(&admin),
        Some(json!({ "status": "suspended" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&member), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Account is suspended");
}

#[tokio::test]
async fn admins_cannot_demote_themselves() {
    let app = app().await;
    let (admin_id, admin) = register(&app, "admin@example.org").await;
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/admin/users/{}", admin_id),
        Some(&admin),
        Some(json!({ "role": "member" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn members_cannot_manage_events() {
    let app = app().await;
    let (_, admin) = register(&app, "admin@example.org").await;
    let (_, member) = register(&app, "member@example.org").await;
    let event_id = create_event(&app, &admin, None).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/events",
        Some(&member),
        Some(json!({ "title": "Rogue event", "starts_at": Utc::now() + Duration::days(1) })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "DELETE", &format!("/api/events/{}", event_id), Some(&member), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "DELETE", &format!("/api/events/{}", event_id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn rsvps_respect_capacity() {
    let app = app().await;
    let (_, admin) = register(&app, "admin@example.org").await;
    let (_, member) = register(&app, "member@example.org").await;
    let event_id = create_event(&app, &admin, Some(4)).await;
    let rsvp_uri = format!("/api/events/{}/rsvp", event_id);

    let (status, _) = send(&app, "PUT", &rsvp_uri, Some(&admin), Some(json!({ "adults": 2, "kids": 1 }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "PUT", &rsvp_uri, Some(&member), Some(json!({ "adults": 2 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Not enough spots remaining");

    let (status, _) = send(&app, "PUT", &rsvp_uri, Some(&member), Some(json!({ "adults": 1 }))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = send(&app, "GET", &format!("/api/events/{}", event_id), Some(&member), None).await;
    assert_eq!(detail["spots_remaining"], 0);
    assert_eq!(detail["rsvps"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn prayer_reactions_are_unique_per_kind() {
    let app = app().await;
    let (_, author) = register(&app, "author@example.org").await;
    let (_, friend) = register(&app, "friend@example.org").await;

    let (status, prayer) = send(
        &app,
        "POST",
        "/api/prayers",
        Some(&author),
        Some(json!({ "content": "Healing for my mother" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let reactions_uri = format!("/api/prayers/{}/reactions", prayer["id"].as_str().unwrap());

    let (status, body) = send(&app, "POST", &reactions_uri, Some(&friend), Some(json!({ "kind": "prayed" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["reaction_count"], 1);

    let (status, body) = send(&app, "POST", &reactions_uri, Some(&friend), Some(json!({ "kind": "prayed" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Already reacted");

    let (status, body) = send(&app, "DELETE", &format!("{}/prayed", reactions_uri), Some(&friend), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reaction_count"], 0);
}

#[tokio::test]
async fn unreacting_on_a_deleted_prayer_changes_nothing() {
    let app = app().await;
    let (_, author) = register(&app, "author@example.org").await;
    let (_, friend) = register(&app, "friend@example.org").await;

    let (_, prayer) = send(
        &app,
        "POST",
        "/api/prayers",
        Some(&author),
        Some(json!({ "content": "Strength for the week" })),
    )
    .await;
    let prayer_uri = format!("/api/prayers/{}", prayer["id"].as_str().unwrap());
    let reaction_uri = format!("{}/reactions/prayed", prayer_uri);

    let (status, _) = send(
        &app,
        "POST",
        &format!("{}/reactions", prayer_uri),
        Some(&friend),
        Some(json!({ "kind": "prayed" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, "DELETE", &prayer_uri, Some(&author), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Both attempts must answer the same way: nothing was removed the first time.
    for _ in 0..2 {
        let (status, body) = send(&app, "DELETE", &reaction_uri, Some(&friend), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Prayer not found");
    }
}

#[tokio::test]
async fn deleted_prayers_disappear() {
    let app = app().await;
    let (_, author) = register(&app, "author@example.org").await;
    let (_, prayer) = send(
        &app,
        "POST",
        "/api/prayers",
        Some(&author),
        Some(json!({ "kind": "praise", "content": "New job!" })),
    )
    .await;
    let prayer_uri = format!("/api/prayers/{}", prayer["id"].as_str().unwrap());

    let (status, _) = send(&app, "DELETE", &prayer_uri, Some(&author), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = send(&app, "GET", "/api/prayers", Some(&author), None).await;
    assert!(list.as_array().unwrap().is_empty());

    let (status, _) = send(&app, "GET", &prayer_uri, Some(&author), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        &format!("{}/comments", prayer_uri),
        Some(&author),
        Some(json!({ "content": "Amen" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_prayers_hide_the_author_from_others() {
    let app = app().await;
    let (_, admin) = register(&app, "admin@example.org").await;
    let (_, author) = register(&app, "author@example.org").await;
    let (_, other) = register(&app, "other@example.org").await;

    send(
        &app,
        "POST",
        "/api/prayers",
        Some(&author),
        Some(json!({ "content": "Something private", "is_anonymous": true })),
    )
    .await;

    let (_, seen_by_other) = send(&app, "GET", "/api/prayers", Some(&other), None).await;
    assert!(seen_by_other[0]["author_id"].is_null());

    let (_, seen_by_admin) = send(&app, "GET", "/api/prayers", Some(&admin), None).await;
    assert!(seen_by_admin[0]["author_id"].is_string());
}

#[tokio::test]
async fn moderated_prayers_wait_for_approval() {
    let app = app().await;
    let (_, admin) = register(&app, "admin@example.org").await;
    let (_, member) = register(&app, "member@example.org").await;

    let (status, settings) = send(
        &app,
        "PATCH",
        "/api/admin/settings",
        Some(&admin),
        Some(json!({ "prayer_moderation": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["prayer_moderation"], true);

    let (_, prayer) = send(&app, "POST", "/api/prayers", Some(&member), Some(json!({ "content": "Travel mercies" }))).await;
    assert_eq!(prayer["is_approved"], false);

    let (_, pending) = send(&app, "GET", "/api/admin/prayers/pending", Some(&admin), None).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let approve_uri = format!("/api/admin/prayers/{}/approve", prayer["id"].as_str().unwrap());
    let (status, approved) = send(&app, "POST", &approve_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["is_approved"], true);
}

#[tokio::test]
async fn verse_game_deals_and_scores() {
    let app = app().await;
    let (_, admin) = register(&app, "admin@example.org").await;

    let (status, body) = send(&app, "GET", "/api/kids/verse-game", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "At least two verses are needed to play");

    for (reference, text) in [
        ("John 3:16", "For God so loved the world"),
        ("Psalm 23:1", "The Lord is my shepherd"),
        ("Genesis 1:1", "In the beginning God created"),
    ] {
        let (status, _) = send(
            &app,
            "POST",
            "/api/kids/assets",
            Some(&admin),
            Some(json!({ "kind": "verse", "title": reference, "reference": reference, "content": text })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _) = send(&app, "GET", "/api/kids/verse-game?pairs=40", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, round) = send(&app, "GET", "/api/kids/verse-game?pairs=3", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let references = round["references"].as_array().unwrap();
    assert_eq!(references.len(), 3);
    assert_eq!(round["texts"].as_array().unwrap().len(), 3);

    let matches: Vec<Value> = references
        .iter()
        .map(|card| json!({ "reference_id": card["id"], "text_id": card["id"] }))
        .collect();
    let (status, result) = send(
        &app,
        "POST",
        "/api/kids/verse-game/check",
        Some(&admin),
        Some(json!({ "matches": matches })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result, json!({ "correct": 3, "total": 3, "perfect": true }));
}

#[tokio::test]
async fn playlist_reorder_must_be_complete() {
    let app = app().await;
    let (_, admin) = register(&app, "admin@example.org").await;

    let mut ids = Vec::new();
    for title in ["Sunday worship", "Kids songs"] {
        let (_, playlist) = send(
            &app,
            "POST",
            "/api/playlists",
            Some(&admin),
            Some(json!({ "title": title, "url": "https://music.example.org/list" })),
        )
        .await;
        ids.push(playlist["id"].clone());
    }

    let (status, body) = send(
        &app,
        "POST",
        "/api/playlists/reorder",
        Some(&admin),
        Some(json!({ "ids": [ids[1]] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Reorder must list every playlist exactly once");

    let (status, list) = send(
        &app,
        "POST",
        "/api/playlists/reorder",
        Some(&admin),
        Some(json!({ "ids": [ids[1], ids[0]] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list[0]["title"], "Kids songs");
}

#[tokio::test]
async fn notifications_reach_other_members() {
    let app = app().await;
    let (_, admin) = register(&app, "admin@example.org").await;
    let (_, member) = register(&app, "member@example.org").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/admin/notifications",
        Some(&admin),
        Some(json!({ "title": "Snow day", "body": "Service is online this week" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recipients"], 2);

    // Delivery runs on a spawned task.
    let mut count = json!(0);
    for _ in 0..50 {
        (_, count) = send(&app, "GET", "/api/notifications/unread-count", Some(&member), None).await;
        if count["count"] == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(count["count"], 1);

    let (status, body) = send(&app, "POST", "/api/notifications/read-all", Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 1);
}
