use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;

use app_api::AppContext;
use leaderboard_app::{AppPaths, AppState, EngineConfig, ensure_app_data_dir};
use leaderboard_core::{Period, UsageEvent};

use http_api::HttpState;

struct TestApp {
    _temp_dir: tempfile::TempDir,
    context: AppContext,
    router: axum::Router,
}

fn build_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let paths = AppPaths::new(temp_dir.path().to_path_buf());
    ensure_app_data_dir(&paths).expect("ensure app data dir");
    let app_state = AppState::new(paths.db_path, EngineConfig::default());
    app_state.initialize().expect("initialize");

    let scheduler = app_state.scheduler();
    let context = AppContext {
        app_state,
        scheduler,
    };
    let router = http_api::router(HttpState::new(context.clone()));

    TestApp {
        _temp_dir: temp_dir,
        context,
        router,
    }
}

fn event(id: &str, user: &str, tokens: u64) -> UsageEvent {
    UsageEvent {
        id: id.to_string(),
        user_id: user.to_string(),
        tokens,
        cached_tokens: 0,
        cost: tokens as f64 / 1000.0,
        tool: "cli".to_string(),
        occurred_at: Utc
            .with_ymd_and_hms(2025, 12, 19, 10, 0, 0)
            .single()
            .expect("timestamp"),
    }
}

/// Seeds the ledger and promotes an `all` generation.
fn seed_and_compute(app: &TestApp) -> i64 {
    let mut db = app.context.app_state.open_db().expect("open db");
    db.insert_usage_events(&[
        event("e1", "carol", 300),
        event("e2", "bob", 500),
        event("e3", "alice", 500),
    ])
    .expect("insert");
    app.context
        .app_state
        .services
        .aggregator
        .compute(
            Period::All,
            Utc.with_ymd_and_hms(2025, 12, 20, 12, 0, 0)
                .single()
                .expect("timestamp"),
        )
        .expect("compute")
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("response");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let payload: Value = serde_json::from_slice(&body).expect("json body");
    (status, payload)
}

async fn get(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    )
    .await
}

async fn post_json(app: &TestApp, uri: &str, body: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
    )
    .await
}

#[tokio::test]
async fn leaderboard_returns_ranked_page() {
    let app = build_app();
    let generation_id = seed_and_compute(&app);

    let (status, payload) = get(&app, "/api/leaderboard?period=all&page=1&page_size=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["generation_id"], generation_id);
    assert!(payload["computed_at"].is_string());
    let users: Vec<&str> = payload["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .filter_map(|entry| entry["user_id"].as_str())
        .collect();
    assert_eq!(users, vec!["alice", "bob"]);
    assert_eq!(payload["pagination"]["total_count"], 3);
    assert_eq!(payload["pagination"]["has_next"], true);

    let uri = format!("/api/leaderboard?period=all&page=2&page_size=2&generation={generation_id}");
    let (status, payload) = get(&app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["entries"][0]["user_id"], "carol");
    assert_eq!(payload["entries"][0]["rank"], 3);
    assert_eq!(payload["pagination"]["has_next"], false);
}

#[tokio::test]
async fn leaderboard_applies_filters_and_order() {
    let app = build_app();
    seed_and_compute(&app);

    let (status, payload) = get(
        &app,
        "/api/leaderboard?period=all&users=carol,bob&order_by=user_id&direction=desc",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let users: Vec<&str> = payload["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .filter_map(|entry| entry["user_id"].as_str())
        .collect();
    assert_eq!(users, vec!["carol", "bob"]);

    let (_, payload) = get(&app, "/api/leaderboard?period=all&min_rank=2&max_tokens=400").await;
    assert_eq!(payload["pagination"]["total_count"], 1);
    assert_eq!(payload["entries"][0]["user_id"], "carol");
}

#[tokio::test]
async fn empty_period_is_an_empty_page() {
    let app = build_app();
    let (status, payload) = get(&app, "/api/leaderboard?period=week").await;
    assert_eq!(status, StatusCode::OK);
    assert!(payload["generation_id"].is_null());
    assert_eq!(payload["entries"].as_array().map(Vec::len), Some(0));
    assert_eq!(payload["pagination"]["page_size"], 25);
}

#[tokio::test]
async fn errors_use_json_body() {
    let app = build_app();
    seed_and_compute(&app);

    let (status, payload) = get(&app, "/api/leaderboard?period=quarter").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload["code"], "not_found");
    assert_eq!(payload["status"], 404);

    let (status, payload) = get(&app, "/api/leaderboard?period=all&generation=999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload["code"], "not_found");

    let (status, payload) = get(&app, "/api/leaderboard?period=all&page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["code"], "invalid_input");

    let (status, payload) = get(&app, "/api/leaderboard?period=all&min_tokens=lots").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["code"], "invalid_input");

    let (status, payload) = get(&app, "/api/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload["code"], "not_found");
}

#[tokio::test]
async fn standings_and_generations() {
    let app = build_app();
    let generation_id = seed_and_compute(&app);

    let (status, payload) = get(&app, "/api/leaderboard/standings?user_id=bob").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["user_id"], "bob");
    assert_eq!(payload["standings"][0]["period"], "all");
    assert_eq!(payload["standings"][0]["rank"], 2);

    let (status, payload) = get(&app, "/api/leaderboard/generations?period=all&limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["generations"][0]["id"], generation_id);
    assert_eq!(payload["generations"][0]["status"], "complete");
    assert_eq!(payload["generations"][0]["current"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refresh_triggers_scheduler() {
    let app = build_app();
    let mut db = app.context.app_state.open_db().expect("open db");
    db.insert_usage_events(&[event("e1", "alice", 100)])
        .expect("insert");

    let (status, payload) = post_json(&app, "/api/refresh", r#"{"period":"all"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["period"], "all");
    assert_eq!(payload["outcome"], "started");
    app.context.scheduler.shutdown().await;

    let (status, payload) = get(&app, "/api/refresh/status").await;
    assert_eq!(status, StatusCode::OK);
    let periods = payload["periods"].as_array().expect("periods");
    assert_eq!(periods.len(), 3);
    assert_eq!(periods[0]["period"], "all");
    assert_eq!(periods[0]["successes"], 1);
    assert_eq!(payload["events"][0]["kind"], "started");

    let (_, payload) = get(&app, "/api/leaderboard?period=all").await;
    assert_eq!(payload["entries"][0]["user_id"], "alice");

    let (status, payload) = post_json(&app, "/api/refresh", r#"{"period":"all"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["outcome"], "stopped");
}

#[tokio::test]
async fn refresh_rejects_bad_period() {
    let app = build_app();
    let (status, payload) = post_json(&app, "/api/refresh", r#"{"period":"decade"}"#).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload["code"], "not_found");

    let (status, payload) = post_json(&app, "/api/refresh", "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["code"], "invalid_input");
}
