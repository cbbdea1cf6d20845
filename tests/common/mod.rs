#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use healthhub::api::{ApiRequest, ApiResponse, Transport, TransportError};
use healthhub::models::{Role, TokenPair};
use healthhub::session::SessionManager;
use healthhub::storage::{MemoryTokenStore, StorageError, TokenStore};
use serde_json::{Value, json};
use tokio::sync::Notify;

struct Step {
    reply: Result<ApiResponse, TransportError>,
    gate: Option<Arc<Notify>>,
}

/// Transport that replays scripted replies in order and records every request.
#[derive(Default)]
pub struct FakeTransport {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, status: u16, body: Value) -> &Self {
        self.push(Ok(ApiResponse {
            status,
            body: Some(body),
        }), None)
    }

    pub fn reply_raw(&self, status: u16) -> &Self {
        self.push(Ok(ApiResponse { status, body: None }), None)
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.push(Err(TransportError(message.to_string())), None)
    }

    /// Reply held back until the returned gate is notified.
    pub fn reply_gated(&self, status: u16, body: Value) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.push(
            Ok(ApiResponse {
                status,
                body: Some(body),
            }),
            Some(gate.clone()),
        );
        gate
    }

    fn push(&self, reply: Result<ApiResponse, TransportError>, gate: Option<Arc<Notify>>) -> &Self {
        self.steps.lock().unwrap().push_back(Step { reply, gate });
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> ApiRequest {
        self.requests().pop().expect("no request was sent")
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request {} {}", request.method, request.path));
        if let Some(gate) = step.gate {
            gate.notified().await;
        }
        step.reply
    }
}

pub fn user_json(id: i64, username: &str, role: Role) -> Value {
    json!({
        "id": id,
        "username": username,
        "email": format!("{username}@example.com"),
        "user_type": role.as_str(),
        "first_name": "Test",
        "last_name": "User",
        "is_active": true
    })
}

pub fn auth_body(username: &str, role: Role, access: &str) -> Value {
    json!({
        "user": user_json(1, username, role),
        "tokens": { "access": access, "refresh": format!("{access}-refresh") }
    })
}

pub fn profile_body(username: &str, role: Role) -> Value {
    json!({ "user": user_json(1, username, role) })
}

pub fn stored(access: &str) -> Arc<MemoryTokenStore> {
    Arc::new(MemoryTokenStore::with_tokens(&TokenPair {
        access: access.to_string(),
        refresh: format!("{access}-refresh"),
    }))
}

pub fn manager(transport: &Arc<FakeTransport>, store: &Arc<MemoryTokenStore>) -> SessionManager {
    SessionManager::new(transport.clone(), store.clone())
}

/// Let spawned tasks run until `transport` has seen `count` requests.
pub async fn until_requests(transport: &FakeTransport, count: usize) {
    while transport.requests().len() < count {
        tokio::task::yield_now().await;
    }
}

/// Token store whose reads or writes can be made to fail. Counts `clear` calls.
#[derive(Default)]
pub struct FailingTokenStore {
    inner: MemoryTokenStore,
    fail_load: bool,
    fail_save: AtomicBool,
    clears: AtomicUsize,
}

impl FailingTokenStore {
    /// Every `load` fails, as with a corrupted or unreadable file.
    pub fn unreadable() -> Arc<Self> {
        Arc::new(Self {
            fail_load: true,
            ..Self::default()
        })
    }

    /// Reads work; writes fail until `set_fail_save(false)`.
    pub fn read_only() -> Arc<Self> {
        let store = Self::default();
        store.set_fail_save(true);
        Arc::new(store)
    }

    pub fn writable() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }
}

impl TokenStore for FailingTokenStore {
    fn load(&self) -> Result<Option<TokenPair>, StorageError> {
        if self.fail_load {
            return Err(StorageError::Io(io::Error::other("disk unreadable")));
        }
        self.inner.load()
    }

    fn save(&self, tokens: &TokenPair) -> Result<(), StorageError> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::other("disk full")));
        }
        self.inner.save(tokens)
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear()
    }
}
