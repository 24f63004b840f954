//! End-to-end workflow coverage against a live Postgres instance. Each test
//! skips itself unless `DATABASE_URL` points at a database the suite may
//! truncate. Tests share one database, so they serialize on `DB_LOCK`.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Extension, Router,
};
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use http_body_util::BodyExt;
use ngo_hub::{connect_to_db, seed_admin, DbPool};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower::ServiceExt;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const ADMIN_EMAIL: &str = "admin@workflows.test";
const ADMIN_PASSWORD: &str = "admin-secret";

static DB_LOCK: Mutex<()> = Mutex::const_new(());

async fn setup() -> Option<(Router, DbPool)> {
    let Ok(db_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping workflow test");
        return None;
    };
    if std::env::var("JWT_SECRET").is_err() {
        // "workflow-test-secret"
        std::env::set_var("JWT_SECRET", "d29ya2Zsb3ctdGVzdC1zZWNyZXQ=");
    }

    {
        let db_url = db_url.clone();
        tokio::task::spawn_blocking(move || {
            use diesel::{Connection, PgConnection};
            let mut conn = PgConnection::establish(&db_url).expect("connect for migrations");
            conn.run_pending_migrations(MIGRATIONS).expect("run migrations");
        })
        .await
        .expect("migration task");
    }

    let pool = connect_to_db(&db_url);
    reset_tables(&pool).await;
    seed_admin(&pool, ADMIN_EMAIL, ADMIN_PASSWORD)
        .await
        .expect("seed admin");

    Some((ngo_hub::app().layer(Extension(pool.clone())), pool))
}

async fn reset_tables(pool: &DbPool) {
    let conn = &mut pool.get().await.expect("pool");
    // children before parents
    for table in [
        "likes",
        "bookmarks",
        "applications",
        "volunteer_posts",
        "events",
        "ngos",
        "registration_requests",
        "accounts",
    ] {
        diesel::sql_query(format!("DELETE FROM {table}"))
            .execute(conn)
            .await
            .expect("reset table");
    }
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let response = app.clone().oneshot(request).await.expect("send request");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": email, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["token"].as_str().expect("token").to_string()
}

/// Runs the full registration workflow and returns the new NGO's token.
async fn approved_ngo(app: &Router, email: &str, password: &str) -> String {
    let admin_token = login(app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, request) = send(
        app,
        "POST",
        "/api/ngo/request",
        None,
        Some(json!({
            "name": "Helping Hands",
            "email": email,
            "registrationNo": "REG123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "submit failed: {request}");
    let request_id = request["id"].as_i64().expect("request id");

    let (status, ngo) = send(
        app,
        "POST",
        &format!("/api/admin/ngo-requests/{request_id}/approve"),
        Some(&admin_token),
        Some(json!({"password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "approve failed: {ngo}");

    login(app, email, password).await
}

async fn registered_user(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({"name": "Vol", "email": email, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    login(app, email, password).await
}

async fn created_post(app: &Router, ngo_token: &str) -> i64 {
    let (status, post) = send(
        app,
        "POST",
        "/api/ngo/volunteer-posts",
        Some(ngo_token),
        Some(json!({"title": "Weekend kitchen shift"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create post failed: {post}");
    post["id"].as_i64().expect("post id")
}

#[tokio::test]
async fn registration_approval_is_exactly_once() {
    let _guard = DB_LOCK.lock().await;
    let Some((app, _pool)) = setup().await else { return };

    let admin_token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, request) = send(
        &app,
        "POST",
        "/api/ngo/request",
        None,
        Some(json!({
            "name": "Helping Hands",
            "email": "hh@example.org",
            "registrationNo": "REG123",
            "mission": "food security"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "pending");
    let request_id = request["id"].as_i64().expect("request id");

    let approve = json!({"password": "ngo-secret"});
    let (status, ngo) = send(
        &app,
        "POST",
        &format!("/api/admin/ngo-requests/{request_id}/approve"),
        Some(&admin_token),
        Some(approve.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "approve failed: {ngo}");
    assert_eq!(ngo["email"], "hh@example.org");
    assert_eq!(ngo["verified"], true);

    // a second approve and a late reject both bounce off the resolved request
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/admin/ngo-requests/{request_id}/approve"),
        Some(&admin_token),
        Some(approve),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_state");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/admin/ngo-requests/{request_id}/reject"),
        Some(&admin_token),
        Some(json!({"reason": "too late"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_state");

    // exactly one account came out of it, and it can log in
    let ngo_token = login(&app, "hh@example.org", "ngo-secret").await;
    let (status, dashboard) = send(&app, "GET", "/api/ngo/dashboard", Some(&ngo_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["ngo"]["email"], "hh@example.org");
}

#[tokio::test]
async fn application_decisions_are_exactly_once() {
    let _guard = DB_LOCK.lock().await;
    let Some((app, _pool)) = setup().await else { return };

    let ngo_token = approved_ngo(&app, "hh@example.org", "ngo-secret").await;
    let user_token = registered_user(&app, "vol@example.org", "vol-secret").await;
    let post_id = created_post(&app, &ngo_token).await;

    let apply = json!({"volunteerPostId": post_id, "message": "count me in"});
    let (status, application) = send(
        &app,
        "POST",
        "/api/applications",
        Some(&user_token),
        Some(apply.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "apply failed: {application}");
    assert_eq!(application["status"], "pending");
    let application_id = application["id"].as_i64().expect("application id");

    // the unique (post, applicant) pair rejects a second application
    let (status, body) = send(
        &app,
        "POST",
        "/api/applications",
        Some(&user_token),
        Some(apply),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let (status, decided) = send(
        &app,
        "PUT",
        &format!("/api/ngo/applications/{application_id}/status"),
        Some(&ngo_token),
        Some(json!({"status": "accepted"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "decision failed: {decided}");
    assert_eq!(decided["status"], "accepted");

    // the decision is final, in either direction
    for decision in ["accepted", "rejected"] {
        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/ngo/applications/{application_id}/status"),
            Some(&ngo_token),
            Some(json!({"status": decision})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "invalid_state");
    }
}

#[tokio::test]
async fn closed_posts_leave_the_catalogue_and_reject_applicants() {
    let _guard = DB_LOCK.lock().await;
    let Some((app, _pool)) = setup().await else { return };

    let ngo_token = approved_ngo(&app, "hh@example.org", "ngo-secret").await;
    let user_token = registered_user(&app, "vol@example.org", "vol-secret").await;
    let post_id = created_post(&app, &ngo_token).await;

    // only the owning NGO may edit a post
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/ngo/volunteer-posts/{post_id}"),
        Some(&user_token),
        Some(json!({"active": false})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, post) = send(
        &app,
        "PUT",
        &format!("/api/ngo/volunteer-posts/{post_id}"),
        Some(&ngo_token),
        Some(json!({"active": false, "description": "position filled"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "update failed: {post}");
    assert_eq!(post["active"], false);
    assert_eq!(post["description"], "position filled");

    let (status, posts) = send(&app, "GET", "/api/volunteer-posts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(posts.as_array().expect("post list").is_empty());

    // a closed post reads the same as a missing one to applicants
    let (status, body) = send(
        &app,
        "POST",
        "/api/applications",
        Some(&user_token),
        Some(json!({"volunteerPostId": post_id, "message": "too late"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn profile_updates_recompute_the_transparency_score() {
    let _guard = DB_LOCK.lock().await;
    let Some((app, _pool)) = setup().await else { return };

    let ngo_token = approved_ngo(&app, "hh@example.org", "ngo-secret").await;

    let (status, dashboard) = send(&app, "GET", "/api/ngo/dashboard", Some(&ngo_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let before = dashboard["ngo"]["transparencyScore"]
        .as_i64()
        .expect("score");

    let (status, updated) = send(
        &app,
        "PUT",
        "/api/ngo/profile",
        Some(&ngo_token),
        Some(json!({
            "phone": "+91 11 0000 0000",
            "website": "https://hh.example.org",
            "address": "14 Main Rd",
            "city": "Pune",
            "state": "Maharashtra",
            "mission": "food security",
            "description": "community kitchens across three districts"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "profile update failed: {updated}");
    let after = updated["transparencyScore"].as_i64().expect("score");
    assert!(after > before, "score did not improve: {before} -> {after}");

    // identity fields stayed put
    assert_eq!(updated["email"], "hh@example.org");
    assert_eq!(updated["registrationNo"], "REG123");
}

#[tokio::test]
async fn bookmarks_and_likes_are_idempotent() {
    let _guard = DB_LOCK.lock().await;
    let Some((app, _pool)) = setup().await else { return };

    let ngo_token = approved_ngo(&app, "hh@example.org", "ngo-secret").await;
    let user_token = registered_user(&app, "vol@example.org", "vol-secret").await;
    let post_id = created_post(&app, &ngo_token).await;

    let (status, dashboard) = send(&app, "GET", "/api/ngo/dashboard", Some(&ngo_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let ngo_id = dashboard["ngo"]["id"].as_i64().expect("ngo id");

    // second add returns the same row instead of failing
    let add = json!({"volunteerPostId": post_id});
    let (status, first) = send(
        &app,
        "POST",
        "/api/user/bookmarks",
        Some(&user_token),
        Some(add.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "bookmark failed: {first}");
    let (status, second) = send(
        &app,
        "POST",
        "/api/user/bookmarks",
        Some(&user_token),
        Some(add),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["id"], first["id"]);

    // removal is a no-op once the row is gone
    let bookmark_id = first["id"].as_i64().expect("bookmark id");
    for _ in 0..2 {
        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/user/bookmarks/{bookmark_id}"),
            Some(&user_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    // likes follow the same rules against NGOs
    let add = json!({"ngoId": ngo_id});
    let (status, first) = send(
        &app,
        "POST",
        "/api/user/likes",
        Some(&user_token),
        Some(add.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "like failed: {first}");
    let (status, second) = send(&app, "POST", "/api/user/likes", Some(&user_token), Some(add)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["id"], first["id"]);

    let like_id = first["id"].as_i64().expect("like id");
    for _ in 0..2 {
        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/user/likes/{like_id}"),
            Some(&user_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
