//! Local HTTP stand-in for the Drive and OAuth endpoints, used to exercise
//! [`DriveClient`](super::DriveClient) and [`authenticate`](super::authenticate)
//! over the wire.

use super::RemoteFile;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Form, Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const ACCESS_TOKEN: &str = "fake-access-token";

/// One request as the server saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub content_range: Option<String>,
    pub body: Value,
}

#[derive(Debug, Default)]
struct FakeState {
    files: Vec<RemoteFile>,
    requests: Vec<Recorded>,
    upload_name: String,
    upload_total: u64,
    received: Vec<u8>,
    chunks: usize,
    fail_chunk: Option<(usize, u16)>,
    stall: bool,
    token_error: Option<Value>,
    assertions: Vec<String>,
}

/// Running fake server. Clones share state.
#[derive(Debug, Clone)]
pub struct FakeDrive {
    base: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeDrive {
    pub async fn spawn() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let drive = FakeDrive {
            base: format!("http://{}", listener.local_addr().unwrap()),
            state: Arc::new(Mutex::new(FakeState::default())),
        };

        let app = Router::new()
            .route("/drive/v3/files", get(list_files))
            .route("/drive/v3/files/{id}", patch(update_file))
            .route("/upload/drive/v3/files", post(open_session))
            .route("/upload/session", put(put_chunk))
            .route("/token", post(issue_token))
            .with_state(drive.clone());

        tokio::spawn(async move { axum::serve(listener, app).await });
        drive
    }

    pub fn api_base(&self) -> String {
        format!("{}/drive/v3", self.base)
    }

    pub fn upload_base(&self) -> String {
        format!("{}/upload/drive/v3", self.base)
    }

    pub fn token_uri(&self) -> String {
        format!("{}/token", self.base)
    }

    pub fn insert(&self, id: &str, name: &str) {
        self.state.lock().unwrap().files.push(RemoteFile {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: "application/zip".to_string(),
            trashed: false,
        });
    }

    /// Answer the `index`th chunk PUT (zero based) with `status`
    pub fn fail_chunk(&self, index: usize, status: u16) {
        self.state.lock().unwrap().fail_chunk = Some((index, status));
    }

    /// Answer every chunk with a 308 that acknowledges nothing
    pub fn stall_uploads(&self) {
        self.state.lock().unwrap().stall = true;
    }

    /// Make the token endpoint answer 400 with `body`
    pub fn reject_tokens(&self, body: Value) {
        self.state.lock().unwrap().token_error = Some(body);
    }

    pub fn files(&self) -> Vec<RemoteFile> {
        self.state.lock().unwrap().files.clone()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn received(&self) -> Vec<u8> {
        self.state.lock().unwrap().received.clone()
    }

    pub fn assertions(&self) -> Vec<String> {
        self.state.lock().unwrap().assertions.clone()
    }

    fn record(&self, method: &str, path: &str, query: HashMap<String, String>, headers: &HeaderMap, body: Value) {
        let text = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.state.lock().unwrap().requests.push(Recorded {
            method: method.to_string(),
            path: path.to_string(),
            query,
            authorization: text(header::AUTHORIZATION),
            content_range: text(header::CONTENT_RANGE),
            body,
        });
    }
}

fn not_found(id: &str) -> Response {
    let body = json!({ "error": { "code": 404, "message": format!("File not found: {}.", id) } });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

async fn list_files(
    State(drive): State<FakeDrive>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    let token = query.get("q").map(String::as_str).and_then(name_token).unwrap_or_default().to_string();
    drive.record("GET", "/drive/v3/files", query, &headers, Value::Null);

    let files: Vec<RemoteFile> = drive
        .files()
        .into_iter()
        .filter(|f| !f.trashed && f.name.contains(&token))
        .collect();
    Json(json!({ "files": files }))
}

/// The `name contains '<token>'` term of a search query
fn name_token(q: &str) -> Option<&str> {
    q.split("name contains '").nth(1)?.split('\'').next()
}

async fn update_file(
    State(drive): State<FakeDrive>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    drive.record("PATCH", &format!("/drive/v3/files/{}", id), query, &headers, body.clone());

    let mut state = drive.state.lock().unwrap();
    let Some(file) = state.files.iter_mut().find(|f| f.id == id) else {
        return not_found(&id);
    };
    if let Some(trashed) = body.get("trashed").and_then(Value::as_bool) {
        file.trashed = trashed;
    }
    if let Some(name) = body.get("name").and_then(Value::as_str) {
        file.name = name.to_string();
    }
    Json(file.clone()).into_response()
}

async fn open_session(
    State(drive): State<FakeDrive>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    drive.record("POST", "/upload/drive/v3/files", query, &headers, body.clone());

    let total = headers
        .get("x-upload-content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    {
        let mut state = drive.state.lock().unwrap();
        state.upload_name = body["name"].as_str().unwrap_or_default().to_string();
        state.upload_total = total;
        state.received.clear();
        state.chunks = 0;
    }

    let location = format!("{}/upload/session", drive.base);
    (StatusCode::OK, [(header::LOCATION, location)]).into_response()
}

async fn put_chunk(State(drive): State<FakeDrive>, headers: HeaderMap, body: Bytes) -> Response {
    drive.record("PUT", "/upload/session", HashMap::new(), &headers, Value::Null);

    let mut state = drive.state.lock().unwrap();
    let index = state.chunks;
    state.chunks += 1;

    if let Some((fail_at, status)) = state.fail_chunk {
        if fail_at == index {
            let status = StatusCode::from_u16(status).unwrap();
            return (status, "backend error").into_response();
        }
    }
    if state.stall {
        return StatusCode::PERMANENT_REDIRECT.into_response();
    }

    state.received.extend_from_slice(&body);
    let received = state.received.len() as u64;

    if received < state.upload_total {
        let range = format!("bytes=0-{}", received.saturating_sub(1));
        return (StatusCode::PERMANENT_REDIRECT, [(header::RANGE, range)]).into_response();
    }

    let file = RemoteFile {
        id: format!("uploaded-{}", state.files.len()),
        name: state.upload_name.clone(),
        mime_type: "application/zip".to_string(),
        trashed: false,
    };
    state.files.push(file.clone());
    Json(file).into_response()
}

async fn issue_token(State(drive): State<FakeDrive>, Form(form): Form<HashMap<String, String>>) -> Response {
    let mut state = drive.state.lock().unwrap();
    if let Some(assertion) = form.get("assertion") {
        state.assertions.push(assertion.clone());
    }

    if form.get("grant_type").map(String::as_str) != Some("urn:ietf:params:oauth:grant-type:jwt-bearer") {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "unsupported_grant_type" }))).into_response();
    }
    if let Some(error) = state.token_error.clone() {
        return (StatusCode::BAD_REQUEST, Json(error)).into_response();
    }

    Json(json!({
        "access_token": ACCESS_TOKEN,
        "expires_in": 3599,
        "token_type": "Bearer",
    }))
    .into_response()
}
