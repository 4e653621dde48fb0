//! In-process CI backend for end-to-end tests.
#![allow(dead_code)]

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, RawQuery, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

#[derive(Default)]
pub struct Recorded {
    pub queries: Vec<String>,
    pub authorizations: Vec<String>,
    pub ws_connected_at: Vec<Instant>,
    pub jobs_fetched_at: Vec<Instant>,
}

pub struct Backend {
    pub jobs: Mutex<Vec<Value>>,
    pub results: Mutex<HashMap<String, Value>>,
    pub recorded: Mutex<Recorded>,
    pub jobs_hits: AtomicUsize,
    pub result_hits: AtomicUsize,
    pub ws_connections: AtomicUsize,
    /// Sockets that have ended, from either side.
    pub ws_closed: AtomicUsize,
    /// Hold every `/jobs` and `/job/{uid}` answer back this long.
    pub jobs_delay_ms: AtomicU64,
    /// Close the first websocket right after accepting it.
    pub drop_first_socket: AtomicBool,
    /// Send `reload` to every socket after the first one.
    pub reload_on_reconnect: AtomicBool,
    /// Status returned by mutating endpoints.
    pub action_status: AtomicU16,
    pub deltas: broadcast::Sender<String>,
}

pub struct FakeBackend {
    pub url: String,
    pub ws_url: String,
    pub backend: Arc<Backend>,
}

impl FakeBackend {
    pub async fn start(jobs: Vec<Value>) -> FakeBackend {
        let (deltas, _) = broadcast::channel(4096);
        let backend = Arc::new(Backend {
            jobs: Mutex::new(jobs),
            results: Mutex::new(HashMap::new()),
            recorded: Mutex::new(Recorded::default()),
            jobs_hits: AtomicUsize::new(0),
            result_hits: AtomicUsize::new(0),
            ws_connections: AtomicUsize::new(0),
            ws_closed: AtomicUsize::new(0),
            jobs_delay_ms: AtomicU64::new(0),
            drop_first_socket: AtomicBool::new(false),
            reload_on_reconnect: AtomicBool::new(false),
            action_status: AtomicU16::new(200),
            deltas,
        });

        let router = Router::new()
            .route("/jobs", get(list_jobs))
            .route("/job/{uid}", get(get_job))
            .route("/results/{uid}/{*file}", get(get_result))
            .route("/jobs/{queue}/{uid}", delete(remove_job))
            .route("/jobs/finished/{uid}", post(restart_job))
            .route("/ws/status", get(ws_status))
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        FakeBackend {
            url: format!("http://{}", addr),
            ws_url: format!("ws://{}/ws/status", addr),
            backend,
        }
    }

    pub fn set_jobs(&self, jobs: Vec<Value>) {
        *self.backend.jobs.lock().unwrap() = jobs;
    }

    pub fn set_result(&self, uid: &str, file: &str, body: Value) {
        self.backend
            .results
            .lock()
            .unwrap()
            .insert(format!("{}/{}", uid, file), body);
    }

    /// Push a delta to every connected socket.
    pub fn push(&self, delta: Value) {
        let _ = self.backend.deltas.send(delta.to_string());
    }

    pub fn jobs_hits(&self) -> usize {
        self.backend.jobs_hits.load(Ordering::SeqCst)
    }

    pub fn ws_connections(&self) -> usize {
        self.backend.ws_connections.load(Ordering::SeqCst)
    }

    pub fn ws_closed(&self) -> usize {
        self.backend.ws_closed.load(Ordering::SeqCst)
    }
}

pub fn job_json(uid: &str, state: &str, sha: &str) -> Value {
    json!({
        "uid": uid,
        "state": state,
        "commit": {"sha": sha, "author": "alice", "message": "boards: add foo"},
        "prinfo": {"number": 21, "title": "boards: add foo", "url": "https://github.com/o/r/pull/21", "labels": []},
        "creation_time": 1_700_000_000.0,
    })
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if check().await {
            return;
        }
        if Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn list_jobs(State(backend): State<Arc<Backend>>, RawQuery(query): RawQuery) -> Json<Value> {
    backend.jobs_hits.fetch_add(1, Ordering::SeqCst);
    {
        let mut recorded = backend.recorded.lock().unwrap();
        recorded.queries.push(query.unwrap_or_default());
        recorded.jobs_fetched_at.push(Instant::now());
    }
    delay_answer(&backend).await;

    let jobs = backend.jobs.lock().unwrap().clone();
    let by_state = |states: &[&str]| -> Vec<Value> {
        jobs.iter()
            .filter(|j| states.contains(&j["state"].as_str().unwrap_or_default()))
            .cloned()
            .collect()
    };
    Json(json!({
        "queued": by_state(&["queued"]),
        "running": by_state(&["running"]),
        "finished": by_state(&["passed", "errored", "stopped"]),
    }))
}

async fn get_job(State(backend): State<Arc<Backend>>, Path(uid): Path<String>) -> Response {
    backend.jobs_hits.fetch_add(1, Ordering::SeqCst);
    delay_answer(&backend).await;
    let jobs = backend.jobs.lock().unwrap().clone();
    match jobs.into_iter().find(|j| j["uid"] == uid.as_str()) {
        Some(job) => Json(job).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delay_answer(backend: &Backend) {
    let delay = backend.jobs_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

async fn get_result(
    State(backend): State<Arc<Backend>>,
    Path((uid, file)): Path<(String, String)>,
) -> Response {
    backend.result_hits.fetch_add(1, Ordering::SeqCst);
    let key = format!("{}/{}", uid, file);
    match backend.results.lock().unwrap().get(&key) {
        Some(Value::String(text)) => text.clone().into_response(),
        Some(body) => Json(body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn record_action(backend: &Backend, headers: &HeaderMap) -> StatusCode {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    backend.recorded.lock().unwrap().authorizations.push(auth);
    StatusCode::from_u16(backend.action_status.load(Ordering::SeqCst)).unwrap()
}

async fn remove_job(
    State(backend): State<Arc<Backend>>,
    Path((_queue, _uid)): Path<(String, String)>,
    headers: HeaderMap,
) -> StatusCode {
    record_action(&backend, &headers)
}

async fn restart_job(
    State(backend): State<Arc<Backend>>,
    Path(_uid): Path<String>,
    headers: HeaderMap,
) -> StatusCode {
    record_action(&backend, &headers)
}

async fn ws_status(ws: WebSocketUpgrade, State(backend): State<Arc<Backend>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        serve_socket(socket, backend.clone()).await;
        backend.ws_closed.fetch_add(1, Ordering::SeqCst);
    })
}

async fn serve_socket(mut socket: WebSocket, backend: Arc<Backend>) {
    // Subscribed before the connection is counted, so tests that wait for
    // the count never miss a pushed delta.
    let mut rx = backend.deltas.subscribe();
    let index = backend.ws_connections.fetch_add(1, Ordering::SeqCst);
    backend
        .recorded
        .lock()
        .unwrap()
        .ws_connected_at
        .push(Instant::now());

    if index == 0 && backend.drop_first_socket.load(Ordering::SeqCst) {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    if index > 0 && backend.reload_on_reconnect.load(Ordering::SeqCst) {
        let _ = socket
            .send(Message::Text(r#"{"cmd":"reload"}"#.into()))
            .await;
    }

    loop {
        tokio::select! {
            delta = rx.recv() => match delta {
                Ok(text) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                _ => {}
            }
        }
    }
}
