//! Test doubles for the connection and directory seams.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
};

use {
    async_trait::async_trait,
    courier_client::{
        AgentConnection, Directory, PendingResponse, ReconnectPlan, RequestError,
        Result as ClientResult,
    },
    courier_protocol::Request,
};

use crate::session::AgentSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Request(Request),
    Reconnect {
        plan: ReconnectPlan,
        keepalive_stopped: bool,
    },
    Shutdown,
}

/// Records every call and answers requests from a canned table.
#[derive(Default)]
pub struct MockConnection {
    pub calls: Mutex<Vec<Call>>,
    responses: Mutex<HashMap<&'static str, Result<serde_json::Value, RequestError>>>,
    session: OnceLock<Arc<AgentSession>>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer every request of `type_name` with `result`.
    pub fn respond(&self, type_name: &'static str, result: Result<serde_json::Value, RequestError>) {
        self.responses.lock().unwrap().insert(type_name, result);
    }

    /// Observe `session` so reconnect calls can record the keepalive state.
    pub fn watch(&self, session: Arc<AgentSession>) {
        let _ = self.session.set(session);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Request(request) => Some(request),
                _ => None,
            })
            .collect()
    }
}

impl AgentConnection for MockConnection {
    fn request(&self, request: Request) -> PendingResponse {
        let result = self
            .responses
            .lock()
            .unwrap()
            .get(request.type_name())
            .cloned()
            .unwrap_or_else(|| Ok(serde_json::json!({})));
        self.calls.lock().unwrap().push(Call::Request(request));
        PendingResponse::ready(result)
    }

    fn reconnect(&self, plan: ReconnectPlan) {
        let keepalive_stopped = self
            .session
            .get()
            .is_none_or(|session| !session.keepalive_active());
        self.calls.lock().unwrap().push(Call::Reconnect {
            plan,
            keepalive_stopped,
        });
    }

    fn shutdown(&self) {
        self.calls.lock().unwrap().push(Call::Shutdown);
    }
}

/// Directory answering from a fixed map.
pub struct StubDirectory(pub Option<HashMap<String, String>>);

impl StubDirectory {
    pub fn with_swift(domain: &str) -> Arc<Self> {
        Arc::new(Self(Some(
            [("swift".to_string(), domain.to_string())].into_iter().collect(),
        )))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self(None))
    }
}

#[async_trait]
impl Directory for StubDirectory {
    async fn service_domains(&self) -> ClientResult<HashMap<String, String>> {
        self.0
            .clone()
            .ok_or_else(|| courier_client::Error::Directory("HTTP 503 Service Unavailable".into()))
    }
}

/// Let spawned completion tasks run to the end.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
