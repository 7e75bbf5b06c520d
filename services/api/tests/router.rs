//! Drives the full router against the in-memory ports.

use api_lib::config::Config;
use api_lib::web::{build_router, state::AppState};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use levelup_core::memory::{InMemoryDatabase, InMemoryStorage};
use levelup_core::{DatabaseService, MaterialType, NewStudyMaterial, Role};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    db: Arc<InMemoryDatabase>,
    storage: Arc<InMemoryStorage>,
}

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        db_max_connections: 1,
        log_level: tracing::Level::DEBUG,
        storage_path: std::env::temp_dir().join("levelup-router-tests"),
        public_base_url: "http://localhost:3000".to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        session_ttl_days: 1,
        xp_cooldown_secs: 180,
    }
}

fn app() -> TestApp {
    let db = Arc::new(InMemoryDatabase::new());
    let storage = Arc::new(InMemoryStorage::new());
    let state = AppState::new(Arc::new(test_config()), db.clone(), storage.clone());
    TestApp {
        router: build_router(Arc::new(state)),
        db,
        storage,
    }
}

async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Option<String>, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.router.clone().oneshot(request).await.unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Option<String>, Value) {
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, cookie, body)
}

/// Signs up a new account and returns its session cookie and id.
async fn sign_up(app: &TestApp, email: &str, role: &str) -> (String, Uuid) {
    let (status, cookie, body) = send(
        app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({
            "email": email,
            "password": "correct horse battery",
            "full_name": "Test User",
            "role": role,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["profile_id"].as_str().unwrap().parse().unwrap();
    (cookie.unwrap(), id)
}

/// Adds a link material straight through the database port.
async fn seed_material(app: &TestApp, material_type: MaterialType) -> Uuid {
    app.db
        .create_material(&NewStudyMaterial {
            topic_id: Uuid::new_v4(),
            title: "Fractions".to_string(),
            material_type,
            url: "https://example.com/fractions".to_string(),
            storage_key: None,
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn signup_sets_a_session_that_lands_by_role() {
    let app = app();
    let (cookie, id) = sign_up(&app, "Ada@Example.com", "student").await;

    let (status, _, body) = send(&app, Method::GET, "/session", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile_id"], id.to_string());
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["landing_path"], "/student/dashboard");

    let (mentor_cookie, _) = sign_up(&app, "grace@example.com", "mentor").await;
    let (_, _, body) = send(&app, Method::GET, "/session", Some(&mentor_cookie), None).await;
    assert_eq!(body["landing_path"], "/mentor/dashboard");
}

#[tokio::test]
async fn admin_signup_and_duplicate_email_are_refused() {
    let app = app();
    let (status, _, _) = send(
        &app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({
            "email": "root@example.com",
            "password": "correct horse battery",
            "full_name": "Root",
            "role": "admin",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    sign_up(&app, "ada@example.com", "student").await;
    let (status, _, _) = send(
        &app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({
            "email": "ada@example.com",
            "password": "another long one",
            "full_name": "Ada Again",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_and_logout_round_trip() {
    let app = app();
    sign_up(&app, "ada@example.com", "student").await;

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "wrong password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, cookie, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "ADA@example.com", "password": "correct horse battery" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["landing_path"], "/student/dashboard");
    let cookie = cookie.unwrap();

    let (status, _, _) = send(&app, Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, Method::GET, "/session", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_need_a_session() {
    let app = app();
    for uri in ["/session", "/xp/progress", "/revisions", "/materials", "/admin/profiles"] {
        let (status, _, _) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }
    let (status, _, _) =
        send(&app, Method::GET, "/session", Some("session=not-a-session"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn awarding_xp_respects_the_cooldown() {
    let app = app();
    let (cookie, id) = sign_up(&app, "ada@example.com", "student").await;
    let material_id = seed_material(&app, MaterialType::Video).await;
    let award = json!({ "event_type": "video_watched", "material_id": material_id });

    let (status, _, body) =
        send(&app, Method::POST, "/xp/award", Some(&cookie), Some(award.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["xpEarned"], 20);
    assert_eq!(body["newTotal"], 20);
    assert_eq!(body["cooldownActive"], false);

    let (_, _, body) = send(&app, Method::POST, "/xp/award", Some(&cookie), Some(award)).await;
    assert_eq!(body["xpEarned"], 0);
    assert_eq!(body["cooldownActive"], true);

    let (_, _, body) = send(&app, Method::GET, "/xp/progress", Some(&cookie), None).await;
    assert_eq!(body["totalXp"], 20);
    assert_eq!(body["level"], 1);
    assert_eq!(body["xpToNext"], 980);

    let (_, _, body) = send(&app, Method::GET, "/xp/history", Some(&cookie), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(app.db.level_row(id).unwrap().total_xp, 20);
}

#[tokio::test]
async fn awards_must_name_a_real_material_of_that_kind() {
    let app = app();
    let (cookie, id) = sign_up(&app, "ada@example.com", "student").await;
    let notes = seed_material(&app, MaterialType::Notes).await;

    let cases = [
        (json!({ "event_type": "video_watched" }), StatusCode::BAD_REQUEST),
        (
            json!({ "event_type": "video_watched", "material_id": Uuid::new_v4() }),
            StatusCode::NOT_FOUND,
        ),
        (
            json!({ "event_type": "video_watched", "material_id": notes }),
            StatusCode::BAD_REQUEST,
        ),
    ];
    for (award, expected) in cases {
        let (status, _, _) =
            send(&app, Method::POST, "/xp/award", Some(&cookie), Some(award.clone())).await;
        assert_eq!(status, expected, "{}", award);
    }
    assert!(app.db.level_row(id).is_none());
    assert!(app.db.xp_events().is_empty());
}

#[tokio::test]
async fn fresh_ids_do_not_dodge_the_cooldown() {
    let app = app();
    let (cookie, id) = sign_up(&app, "ada@example.com", "student").await;
    let video = seed_material(&app, MaterialType::Video).await;

    send(
        &app,
        Method::POST,
        "/xp/award",
        Some(&cookie),
        Some(json!({ "event_type": "video_watched", "material_id": video })),
    )
    .await;
    for _ in 0..5 {
        let (status, _, _) = send(
            &app,
            Method::POST,
            "/xp/award",
            Some(&cookie),
            Some(json!({ "event_type": "video_watched", "material_id": Uuid::new_v4() })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    assert_eq!(app.db.level_row(id).unwrap().total_xp, 20);
}

#[tokio::test]
async fn revision_xp_cannot_be_claimed_directly() {
    let app = app();
    let (cookie, _) = sign_up(&app, "ada@example.com", "student").await;

    for event_type in ["revision_completed", "daily_bonus"] {
        let (status, _, _) = send(
            &app,
            Method::POST,
            "/xp/award",
            Some(&cookie),
            Some(json!({ "event_type": event_type })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", event_type);
    }
    assert!(app.db.xp_events().is_empty());
}

#[tokio::test]
async fn mentors_do_not_earn_xp() {
    let app = app();
    let (cookie, _) = sign_up(&app, "grace@example.com", "mentor").await;
    let (status, _, _) = send(
        &app,
        Method::POST,
        "/xp/award",
        Some(&cookie),
        Some(json!({ "event_type": "notes_read" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_routes_are_admin_only() {
    let app = app();
    let (student_cookie, student_id) = sign_up(&app, "ada@example.com", "student").await;
    let (mentor_cookie, mentor_id) = sign_up(&app, "grace@example.com", "mentor").await;

    for cookie in [&student_cookie, &mentor_cookie] {
        let (status, _, _) = send(&app, Method::GET, "/admin/profiles", Some(cookie), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let (admin_cookie, admin_id) = sign_up(&app, "root@example.com", "student").await;
    app.db.set_role(admin_id, Role::Admin).await.unwrap();

    let (status, _, body) = send(
        &app,
        Method::GET,
        "/admin/profiles?role=mentor",
        Some(&admin_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/admin/assignments",
        Some(&admin_cookie),
        Some(json!({ "studentId": student_id, "mentorId": mentor_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["active"], true);

    let (status, _, body) =
        send(&app, Method::GET, "/mentor/students", Some(&mentor_cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["profile"]["id"], student_id.to_string());

    let (status, _, _) = send(
        &app,
        Method::PUT,
        &format!("/admin/profiles/{}/role", admin_id),
        Some(&admin_cookie),
        Some(json!({ "role": "student" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn opening_a_material_schedules_revisions_once() {
    let app = app();
    let (cookie, _) = sign_up(&app, "ada@example.com", "student").await;
    let material_id = seed_material(&app, MaterialType::Notes).await;
    let uri = format!("/materials/{}/open", material_id);

    let (status, _, body) = send(&app, Method::POST, &uri, Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduled"].as_array().unwrap().len(), 4);

    let (_, _, body) = send(&app, Method::POST, &uri, Some(&cookie), None).await;
    assert!(body["scheduled"].as_array().unwrap().is_empty());

    let (status, _, body) = send(&app, Method::GET, "/revisions", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["upcoming"].as_array().unwrap().len(), 4);

    let (status, _, _) = send(
        &app,
        Method::POST,
        &format!("/materials/{}/open", Uuid::new_v4()),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

const BOUNDARY: &str = "levelup-test-boundary";

fn multipart_body(topic_id: Uuid) -> String {
    let text_part = |name: &str, value: &str| {
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            BOUNDARY, name, value
        )
    };
    let mut body = String::new();
    body.push_str(&text_part("topic_id", &topic_id.to_string()));
    body.push_str(&text_part("title", "Week 1 notes"));
    body.push_str(&text_part("material_type", "notes"));
    body.push_str(&format!(
        "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"week1.txt\"\r\nContent-Type: text/plain\r\n\r\nfractions are parts of a whole\r\n--{}--\r\n",
        BOUNDARY, BOUNDARY
    ));
    body
}

async fn upload(app: &TestApp, cookie: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/materials")
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(Uuid::new_v4())))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let (status, _, body) = read(response).await;
    (status, body)
}

#[tokio::test]
async fn mentors_publish_and_delete_uploaded_materials() {
    let app = app();
    let (student_cookie, _) = sign_up(&app, "ada@example.com", "student").await;
    let (mentor_cookie, _) = sign_up(&app, "grace@example.com", "mentor").await;

    let (status, _) = upload(&app, &student_cookie).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.storage.is_empty());

    let (status, body) = upload(&app, &mentor_cookie).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["materialType"], "notes");
    assert_eq!(app.storage.len(), 1);

    let (_, _, listed) = send(
        &app,
        Method::GET,
        "/materials?material_type=notes",
        Some(&student_cookie),
        None,
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let uri = format!("/materials/{}", body["id"].as_str().unwrap());
    let (status, _, _) = send(&app, Method::DELETE, &uri, Some(&student_cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, _) = send(&app, Method::DELETE, &uri, Some(&mentor_cookie), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.storage.is_empty());
}

#[tokio::test]
async fn deleting_a_link_keeps_the_file_it_points_at() {
    let app = app();
    let (owner_cookie, _) = sign_up(&app, "grace@example.com", "mentor").await;
    let (other_cookie, _) = sign_up(&app, "alan@example.com", "mentor").await;

    let (status, uploaded) = upload(&app, &owner_cookie).await;
    assert_eq!(status, StatusCode::CREATED, "{}", uploaded);
    let file_url = uploaded["url"].as_str().unwrap().to_string();

    let text_part = |name: &str, value: &str| {
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            BOUNDARY, name, value
        )
    };
    let mut body = String::new();
    body.push_str(&text_part("topic_id", &Uuid::new_v4().to_string()));
    body.push_str(&text_part("title", "Borrowed notes"));
    body.push_str(&text_part("material_type", "notes"));
    body.push_str(&text_part("url", &file_url));
    body.push_str(&format!("--{}--\r\n", BOUNDARY));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/materials")
        .header(header::COOKIE, &other_cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, _, link) = read(app.router.clone().oneshot(request).await.unwrap()).await;
    assert_eq!(status, StatusCode::CREATED, "{}", link);

    let uri = format!("/materials/{}", link["id"].as_str().unwrap());
    let (status, _, _) = send(&app, Method::DELETE, &uri, Some(&other_cookie), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.storage.len(), 1);
}

#[tokio::test]
async fn leaderboard_ranks_students_by_xp() {
    let app = app();
    let (ada, _) = sign_up(&app, "ada@example.com", "student").await;
    let (bob, _) = sign_up(&app, "bob@example.com", "student").await;
    let test = seed_material(&app, MaterialType::Test).await;
    let notes = seed_material(&app, MaterialType::Notes).await;

    send(
        &app,
        Method::POST,
        "/xp/award",
        Some(&ada),
        Some(json!({ "event_type": "test_score", "material_id": test, "score": 18 })),
    )
    .await;
    send(
        &app,
        Method::POST,
        "/xp/award",
        Some(&bob),
        Some(json!({ "event_type": "notes_read", "material_id": notes })),
    )
    .await;

    let (status, _, body) = send(&app, Method::GET, "/leaderboard", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["totalXp"], 50);
    assert_eq!(body[1]["rank"], 2);

    let (_, _, body) = send(&app, Method::GET, "/leaderboard/me", Some(&bob), None).await;
    assert_eq!(body["rank"], 2);
    assert_eq!(body["totalXp"], 15);
}

#[tokio::test]
async fn profile_edits_trim_and_reject_empty_names() {
    let app = app();
    let (cookie, _) = sign_up(&app, "ada@example.com", "student").await;

    let (status, _, body) = send(
        &app,
        Method::PUT,
        "/profile",
        Some(&cookie),
        Some(json!({ "fullName": "  Ada Lovelace ", "phone": "555-0100" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fullName"], "Ada Lovelace");

    let (status, _, _) = send(
        &app,
        Method::PUT,
        "/profile",
        Some(&cookie),
        Some(json!({ "fullName": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, _, body) = send(&app, Method::GET, "/profile", Some(&cookie), None).await;
    assert_eq!(body["phone"], "555-0100");
    assert_eq!(body["role"], "student");
}
