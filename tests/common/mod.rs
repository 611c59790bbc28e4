#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::Notify;

use queuedesk::collaborator::{Collaborator, Credentials, RawEntry, RestCollaborator};
use queuedesk::error::ClientError;
use queuedesk::models::{EntryAction, EntryStatus};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";
/// `admin:secret`, base64 encoded.
const BASIC_AUTH: &str = "Basic YWRtaW46c2VjcmV0";

/// Server-side state of the mock collaborator.
#[derive(Default)]
pub struct MockQueue {
    pub entries: Vec<Value>,
    pub config: Map<String, Value>,
    pub fail_fetch: bool,
    pub fail_actions: bool,
    /// Replaces the computed action response when set.
    pub action_response: Option<Value>,
    pub last_action: Option<(String, String)>,
    pub hold_actions: Option<Arc<Notify>>,
}

#[derive(Default)]
pub struct Counters {
    pub fetches: AtomicUsize,
    pub actions: AtomicUsize,
    pub logins: AtomicUsize,
    pub logouts: AtomicUsize,
}

#[derive(Clone)]
struct MockState {
    queue: Arc<Mutex<MockQueue>>,
    counters: Arc<Counters>,
}

/// A running mock collaborator and a REST client pointed at it.
pub struct TestApp {
    pub addr: SocketAddr,
    pub collaborator: Arc<RestCollaborator>,
    pub queue: Arc<Mutex<MockQueue>>,
    pub counters: Arc<Counters>,
}

impl TestApp {
    pub fn fetches(&self) -> usize {
        self.counters.fetches.load(Ordering::SeqCst)
    }

    pub fn action_calls(&self) -> usize {
        self.counters.actions.load(Ordering::SeqCst)
    }

    pub fn with_queue<R>(&self, f: impl FnOnce(&mut MockQueue) -> R) -> R {
        f(&mut self.queue.lock().unwrap())
    }

    pub fn dyn_collaborator(&self) -> Arc<dyn Collaborator> {
        self.collaborator.clone()
    }

    /// Log the REST client in with the mock's accepted credentials.
    pub async fn login(&self) {
        let ok = self
            .collaborator
            .login(&Credentials::new(USERNAME, PASSWORD))
            .await
            .expect("login request failed");
        assert!(ok, "mock rejected valid credentials");
    }
}

/// Raw record in the collaborator's upper-case wire shape.
pub fn raw_entry(id: &str, status: EntryStatus) -> Value {
    let ordinal = EntryStatus::ALL.iter().position(|s| *s == status).unwrap();
    let completed = status.is_terminal().then_some(1_700_000_100_000i64);
    let processed = if status == EntryStatus::Completed { 10 } else { 3 };
    let error_text = (status == EntryStatus::Error).then_some("lookup failed");
    json!({
        "ID": id,
        "SUBMITTED": 1_700_000_000_000i64,
        "COMPLETED": completed,
        "ELAPSED": 65_000,
        "TOTAL": 10,
        "PROCESSED": processed,
        "ERROR_TEXT": error_text,
        "STATUS": ordinal,
        "IDENTIFIER_TYPE": "MRN"
    })
}

/// Spawn a mock collaborator holding `entries`.
pub async fn spawn_app(entries: Vec<Value>) -> TestApp {
    let queue = Arc::new(Mutex::new(MockQueue {
        entries,
        config: json!({ "app.timeout.seconds": "900", "app.refresh.seconds": "10" })
            .as_object()
            .cloned()
            .unwrap(),
        ..MockQueue::default()
    }));
    let counters = Arc::new(Counters::default());

    let state = MockState {
        queue: queue.clone(),
        counters: counters.clone(),
    };

    let app = Router::new()
        .route("/api/config", get(config))
        .route("/api/login", get(login))
        .route("/api/logout", post(logout))
        .route("/api/queue", get(fetch_queue))
        .route("/api/entry-action", post(entry_action))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock server failed");
    });

    let collaborator = RestCollaborator::new(&format!("http://{addr}"), Duration::from_secs(5))
        .expect("Failed to build REST collaborator");

    TestApp {
        addr,
        collaborator: Arc::new(collaborator),
        queue,
        counters,
    }
}

async fn config(State(state): State<MockState>) -> Json<Map<String, Value>> {
    Json(state.queue.lock().unwrap().config.clone())
}

async fn login(State(state): State<MockState>, headers: HeaderMap) -> Response {
    state.counters.logins.fetch_add(1, Ordering::SeqCst);
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == BASIC_AUTH);

    if authorized && headers.contains_key("emerse_id") {
        Json(json!(true)).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn logout(State(state): State<MockState>) -> StatusCode {
    state.counters.logouts.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn fetch_queue(State(state): State<MockState>) -> Response {
    state.counters.fetches.fetch_add(1, Ordering::SeqCst);
    let queue = state.queue.lock().unwrap();
    if queue.fail_fetch {
        return (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response();
    }
    Json(Value::Array(queue.entries.clone())).into_response()
}

#[derive(Deserialize)]
struct ActionRequest {
    id: String,
    action: String,
}

async fn entry_action(State(state): State<MockState>, Json(req): Json<ActionRequest>) -> Response {
    state.counters.actions.fetch_add(1, Ordering::SeqCst);

    let hold = state.queue.lock().unwrap().hold_actions.clone();
    if let Some(hold) = hold {
        hold.notified().await;
    }

    let mut queue = state.queue.lock().unwrap();
    queue.last_action = Some((req.id.clone(), req.action.clone()));

    if queue.fail_actions {
        return (StatusCode::SERVICE_UNAVAILABLE, "indexer offline").into_response();
    }
    if let Some(response) = queue.action_response.clone() {
        return Json(response).into_response();
    }

    let Some(pos) = queue.entries.iter().position(|e| e["ID"] == req.id) else {
        return Json(Value::Null).into_response();
    };

    let status = match req.action.as_str() {
        "DELETE" => EntryStatus::Deleted,
        "SUSPEND" => EntryStatus::Suspended,
        "RESUME" | "RESTART" => EntryStatus::Queued,
        "ABORT" => EntryStatus::Aborted,
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };

    let updated = raw_entry(&req.id, status);
    if status == EntryStatus::Deleted {
        queue.entries.remove(pos);
    } else {
        queue.entries[pos] = updated.clone();
    }
    Json(updated).into_response()
}

/// In-memory collaborator for tests that run on a paused clock.
pub struct FakeCollaborator {
    pub config: Map<String, Value>,
    pub entries: Mutex<Vec<RawEntry>>,
    pub counters: Counters,
}

impl FakeCollaborator {
    pub fn new(timeout_secs: i64, refresh_secs: i64) -> Arc<Self> {
        Arc::new(Self {
            config: json!({
                "app.timeout.seconds": timeout_secs,
                "app.refresh.seconds": refresh_secs
            })
            .as_object()
            .cloned()
            .unwrap(),
            entries: Mutex::new(Vec::new()),
            counters: Counters::default(),
        })
    }

    pub fn fetches(&self) -> usize {
        self.counters.fetches.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.counters.logouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collaborator for FakeCollaborator {
    async fn login(&self, credentials: &Credentials) -> Result<bool, ClientError> {
        self.counters.logins.fetch_add(1, Ordering::SeqCst);
        Ok(credentials.username == USERNAME && credentials.password == PASSWORD)
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.counters.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_config(&self) -> Result<Map<String, Value>, ClientError> {
        Ok(self.config.clone())
    }

    async fn fetch_queue(&self) -> Result<Vec<RawEntry>, ClientError> {
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn submit_action(
        &self,
        _entry_id: &str,
        _action: EntryAction,
    ) -> Result<Option<RawEntry>, ClientError> {
        self.counters.actions.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}
