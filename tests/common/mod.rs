use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use reqwest::Client;
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use indexping::config::Config;

pub const API_TOKEN: &str = "test-api-token";

/// A running test server instance with a dedicated test database and a stub
/// indexing endpoint whose responses can be scripted per test.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub stub: StubIndexer,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_auth(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(API_TOKEN)
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn get_auth(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(API_TOKEN)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn delete_auth(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .delete(self.url(path))
            .bearer_auth(API_TOKEN)
            .send()
            .await
            .expect("delete request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Enqueue URLs, asserting success; returns the `queued` count.
    pub async fn enqueue(&self, urls: &[&str]) -> i64 {
        let (body, status) = self
            .post_auth("/api/v1/queue", &json!({ "urls": urls }))
            .await;
        assert_eq!(status, StatusCode::OK, "enqueue failed: {body}");
        body["queued"].as_i64().unwrap()
    }

    /// Run one processing cycle, asserting success; returns the response.
    pub async fn process(&self, limit: i64) -> Value {
        let (body, status) = self
            .post_auth("/api/v1/queue/process", &json!({ "limit": limit }))
            .await;
        assert_eq!(status, StatusCode::OK, "process failed: {body}");
        body
    }

    pub async fn stats(&self) -> Value {
        let (body, status) = self.get_auth("/api/v1/queue/stats").await;
        assert_eq!(status, StatusCode::OK, "stats failed: {body}");
        body
    }

    pub async fn items(&self, status_filter: Option<&str>) -> Value {
        let path = match status_filter {
            Some(s) => format!("/api/v1/queue/items?status={s}"),
            None => "/api/v1/queue/items".to_string(),
        };
        let (body, status) = self.get_auth(&path).await;
        assert_eq!(status, StatusCode::OK, "items failed: {body}");
        body
    }
}

// ── Stub indexing endpoint ──────────────────────────────────────

#[derive(Clone, Default)]
struct StubState {
    scripts: Arc<Mutex<VecDeque<u16>>>,
    received: Arc<Mutex<Vec<String>>>,
    sitemap: Arc<Mutex<String>>,
}

/// Handle for scripting the stub's responses and inspecting what it saw.
pub struct StubIndexer {
    pub addr: SocketAddr,
    state: StubState,
}

impl StubIndexer {
    /// Queue up response statuses for the next publish calls; once the
    /// script runs out, the stub answers 200.
    pub fn script(&self, statuses: &[u16]) {
        self.state.scripts.lock().unwrap().extend(statuses);
    }

    /// URLs the stub has been asked to announce, in order.
    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn set_sitemap(&self, body: &str) {
        *self.state.sitemap.lock().unwrap() = body.to_string();
    }

    pub fn sitemap_url(&self) -> String {
        format!("http://{}/sitemap.xml", self.addr)
    }
}

async fn stub_publish(State(state): State<StubState>, body: String) -> impl IntoResponse {
    let url = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["url"].as_str().map(str::to_string))
        .unwrap_or_default();
    state.received.lock().unwrap().push(url);

    let status = state.scripts.lock().unwrap().pop_front().unwrap_or(200);
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    if code.is_success() {
        (code, axum::Json(json!({ "urlNotificationMetadata": {} })))
    } else {
        (
            code,
            axum::Json(json!({ "error": { "code": status, "message": "stub error" } })),
        )
    }
}

async fn stub_sitemap(State(state): State<StubState>) -> impl IntoResponse {
    state.sitemap.lock().unwrap().clone()
}

async fn spawn_stub() -> StubIndexer {
    let state = StubState::default();
    let app = Router::new()
        .route("/publish", post(stub_publish))
        .route("/sitemap.xml", get(stub_sitemap))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub indexer");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Stub server failed");
    });

    StubIndexer { addr, state }
}

// ── App spawning ────────────────────────────────────────────────

/// Spawn a test app with a fresh temporary database and default config.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Spawn a test app, letting the caller tweak the config first (e.g. a
/// tiny daily quota).
pub async fn spawn_app_with<F>(customize: F) -> TestApp
where
    F: FnOnce(&mut Config),
{
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    // Create a unique test database
    let db_name = format!(
        "indexping_test_{}",
        Uuid::now_v7().to_string().replace('-', "")
    );

    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    let stub = spawn_stub().await;

    let mut config = Config {
        database_url: test_url,
        api_token: API_TOKEN.to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        site_base_url: "https://shop.example.com".to_string(),
        sitemap_url: None,
        daily_quota: 200,
        batch_size: 10,
        endpoint_url: format!("http://{}/publish", stub.addr),
        service_account_file: None,
        access_token: Some("test-access-token".to_string()),
        worker_interval_secs: 0,
        log_level: "warn".to_string(),
    };
    customize(&mut config);

    let (app, _state) = indexping::build_app(pool.clone(), config).expect("Failed to build app");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::new();

    TestApp {
        addr,
        pool,
        client,
        db_name,
        stub,
    }
}

/// Drop the test database after tests complete.
pub async fn cleanup(app: TestApp) {
    let db_name = app.db_name.clone();
    app.pool.close().await;

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}
