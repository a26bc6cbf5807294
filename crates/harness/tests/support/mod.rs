// In-process stand-in for the document server's admin console.
//
// Serves the Basic-auth console page, the admin WebSocket and document
// WebSockets. Opening a view with `load url=...` broadcasts `adddoc`;
// closing it broadcasts `rmdoc` to subscribed admin channels.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex};

use adminprobe::config::HarnessConfig;
use adminprobe_common::path::basename;
use adminprobe_common::protocol::{AdminCommand, Event};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// `admin:admin`
pub const ADMIN_BASIC_AUTH: &str = "Basic YWRtaW46YWRtaW4=";
const TEST_SECRET: &str = "adminprobe_mock_console_secret_that_is_long_enough";

#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    /// Added to every `active_users_count` answer.
    pub users_skew: i64,
    /// Added to every `active_docs_count` answer.
    pub docs_skew: i64,
    /// Announce every view under this name instead of the loaded basename.
    pub wrong_doc_name: Option<String>,
    /// Added to the pid carried by `rmdoc`.
    pub rmdoc_pid_skew: u32,
    /// Never answer on admin channels.
    pub silent: bool,
    /// Issue the session cookie without `Secure`.
    pub insecure_cookie: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConsoleClaims {
    sub: String,
    exp: i64,
}

#[derive(Debug, Clone)]
struct Notice {
    event: Event,
    text: String,
}

#[derive(Debug, Default)]
struct OpenDocuments {
    next_pid: u32,
    next_view: u32,
    by_url: HashMap<String, (u32, usize)>,
}

impl OpenDocuments {
    /// Returns `(pid, view_id)`; views of one document share its pid.
    fn add_view(&mut self, url: &str) -> (u32, u32) {
        self.next_view += 1;
        let next_pid = &mut self.next_pid;
        let entry = self.by_url.entry(url.to_owned()).or_insert_with(|| {
            *next_pid += 1;
            (1000 + *next_pid, 0)
        });
        entry.1 += 1;
        (entry.0, self.next_view)
    }

    fn remove_view(&mut self, url: &str) {
        if let Some(entry) = self.by_url.get_mut(url) {
            entry.1 -= 1;
            if entry.1 == 0 {
                self.by_url.remove(url);
            }
        }
    }

    fn users(&self) -> usize {
        self.by_url.values().map(|(_, views)| views).sum()
    }

    fn docs(&self) -> usize {
        self.by_url.len()
    }
}

#[derive(Clone)]
struct MockState {
    options: MockOptions,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    notices: broadcast::Sender<Notice>,
    documents: Arc<Mutex<OpenDocuments>>,
}

pub struct MockServer {
    pub url: String,
    task: JoinHandle<()>,
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn spawn(options: MockOptions) -> MockServer {
    let (notices, _) = broadcast::channel(64);
    let state = MockState {
        options,
        encoding_key: EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        decoding_key: DecodingKey::from_secret(TEST_SECRET.as_bytes()),
        notices,
        documents: Arc::new(Mutex::new(OpenDocuments::default())),
    };
    let router = Router::new()
        .route("/loleaflet/dist/admin/admin.html", get(console))
        .route("/lool/adminws/", get(admin_upgrade))
        .route("/lool/{doc}/ws", get(document_upgrade))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("mock server should bind");
    let addr = listener.local_addr().expect("mock server should have an address");
    let task = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server should run");
    });
    MockServer { url: format!("http://{addr}"), task }
}

/// Harness config aimed at `server` with the documents in `data_dir`.
pub fn config_for(server: &MockServer, data_dir: &FsPath) -> HarnessConfig {
    HarnessConfig {
        server_url: server.url.clone(),
        secure_transport: Some(true),
        message_timeout_ms: 5_000,
        run_timeout_ms: 30_000,
        trigger_interval_ms: 10,
        data_dir: data_dir.to_path_buf(),
        ..HarnessConfig::default()
    }
}

/// Data directory holding stub copies of both test documents.
pub fn test_documents() -> tempfile::TempDir {
    let dir = tempfile::TempDir::new().expect("tempdir should be created");
    for name in ["hello.odt", "insert-delete.odp"] {
        std::fs::write(dir.path().join(name), b"stub").expect("test document should be written");
    }
    dir
}

async fn console(State(state): State<MockState>, headers: HeaderMap) -> Response {
    let authorization = headers.get(header::AUTHORIZATION).and_then(|value| value.to_str().ok());
    if authorization != Some(ADMIN_BASIC_AUTH) {
        return (StatusCode::UNAUTHORIZED, [(header::WWW_AUTHENTICATE, "Basic realm=\"admin\"")])
            .into_response();
    }

    let claims =
        ConsoleClaims { sub: "admin".into(), exp: chrono::Utc::now().timestamp() + 3_600 };
    let token = encode(&Header::new(Algorithm::HS256), &claims, &state.encoding_key)
        .expect("console token should encode");
    let secure = if state.options.insecure_cookie { "" } else { "; Secure" };
    let cookie = format!("jwt={token}; Path=/loleaflet/dist/admin/{secure}; HttpOnly");
    (StatusCode::OK, [(header::SET_COOKIE, cookie)], "<html>admin console</html>").into_response()
}

async fn admin_upgrade(State(state): State<MockState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| admin_session(state, socket))
}

async fn admin_session(state: MockState, mut socket: WebSocket) {
    let mut notices = state.notices.subscribe();
    let mut authenticated = false;
    let mut subscriptions = HashSet::new();

    loop {
        tokio::select! {
            biased;
            inbound = socket.recv() => {
                let Some(Ok(message)) = inbound else {
                    break;
                };
                let Message::Text(raw) = message else {
                    continue;
                };
                if state.options.silent {
                    continue;
                }
                let Ok(command) = raw.as_str().parse::<AdminCommand>() else {
                    continue;
                };
                let reply = admin_reply(&state, &mut authenticated, &mut subscriptions, command);
                if let Some(reply) = reply {
                    if socket.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }
            }
            notice = notices.recv() => {
                match notice {
                    Ok(notice) if subscriptions.contains(&notice.event) => {
                        if socket.send(Message::Text(notice.text.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

fn admin_reply(
    state: &MockState,
    authenticated: &mut bool,
    subscriptions: &mut HashSet<Event>,
    command: AdminCommand,
) -> Option<String> {
    match command {
        AdminCommand::Auth { token } => {
            let validation = Validation::new(Algorithm::HS256);
            if decode::<ConsoleClaims>(&token, &state.decoding_key, &validation).is_ok() {
                *authenticated = true;
                None
            } else {
                Some("InvalidAuthToken".into())
            }
        }
        _ if !*authenticated => Some("NotAuthenticated".into()),
        AdminCommand::Subscribe(event) => {
            subscriptions.insert(event);
            None
        }
        AdminCommand::Documents => {
            let documents = state.documents.lock().expect("documents lock");
            Some(format!("documents {}", documents.docs()))
        }
        AdminCommand::ActiveUsersCount => {
            let users = state.documents.lock().expect("documents lock").users() as i64;
            Some(format!("active_users_count {}", users + state.options.users_skew))
        }
        AdminCommand::ActiveDocsCount => {
            let docs = state.documents.lock().expect("documents lock").docs();
            Some(format!("active_docs_count {}", docs as i64 + state.options.docs_skew))
        }
        AdminCommand::Load { .. } => None,
    }
}

async fn document_upgrade(
    State(state): State<MockState>,
    Path(_doc): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| document_session(state, socket))
}

async fn document_session(state: MockState, mut socket: WebSocket) {
    let mut loaded: Option<(String, u32, u32)> = None;

    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(raw) = message else {
            continue;
        };
        let Ok(AdminCommand::Load { url }) = raw.as_str().parse::<AdminCommand>() else {
            continue;
        };
        if loaded.is_some() {
            continue;
        }
        let (pid, view) = state.documents.lock().expect("documents lock").add_view(&url);
        let name = state.options.wrong_doc_name.as_deref().unwrap_or_else(|| basename(&url));
        let _ = state.notices.send(Notice {
            event: Event::AddDoc,
            text: format!("adddoc {pid} {name} {view} 2048"),
        });
        loaded = Some((url, pid, view));
    }

    if let Some((url, pid, view)) = loaded {
        state.documents.lock().expect("documents lock").remove_view(&url);
        let pid = pid + state.options.rmdoc_pid_skew;
        let _ = state.notices.send(Notice { event: Event::RmDoc, text: format!("rmdoc {pid} {view}") });
    }
}
