use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use {courier_protocol::ResponseFrame, serde::de::DeserializeOwned, tokio::sync::oneshot};

type Completion = oneshot::Sender<Result<serde_json::Value, RequestError>>;

/// Why a request did not produce a successful response.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RequestError {
    #[error("request rejected with code {code}: {body}")]
    Rejected { code: u16, body: serde_json::Value },

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("connection closed before a response arrived")]
    ConnectionClosed,

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Correlates request/response pairs by ID.
#[derive(Clone, Default)]
pub struct PendingRequests {
    inner: Arc<Mutex<HashMap<String, Completion>>>,
}

impl PendingRequests {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Completion>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Track a request sent under `id` and return its handle.
    pub fn register(&self, id: &str, timeout: Duration) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id.to_string(), tx);
        PendingResponse {
            id: id.to_string(),
            rx,
            timeout,
            pending: Some(self.clone()),
        }
    }

    /// Route a response frame to its waiting request.
    ///
    /// Returns `false` when no request with that ID is outstanding.
    pub fn resolve(&self, frame: ResponseFrame) -> bool {
        let Some(tx) = self.lock().remove(&frame.req_id) else {
            return false;
        };
        let result = if frame.is_success() {
            Ok(frame.body)
        } else {
            Err(RequestError::Rejected {
                code: frame.code,
                body: frame.body,
            })
        };
        // The caller may have timed out and dropped the receiver.
        let _ = tx.send(result);
        true
    }

    /// Complete one outstanding request with an error.
    pub fn fail(&self, id: &str, error: RequestError) {
        if let Some(tx) = self.lock().remove(id) {
            let _ = tx.send(Err(error));
        }
    }

    /// Fail every outstanding request; used when the socket goes away.
    pub fn fail_all(&self) {
        for (_, tx) in self.lock().drain() {
            let _ = tx.send(Err(RequestError::ConnectionClosed));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn forget(&self, id: &str) {
        self.lock().remove(id);
    }
}

/// The eventual result of one request.
pub struct PendingResponse {
    id: String,
    rx: oneshot::Receiver<Result<serde_json::Value, RequestError>>,
    timeout: Duration,
    pending: Option<PendingRequests>,
}

impl PendingResponse {
    /// A response that is already known, for connections that answer locally.
    #[must_use]
    pub fn ready(result: Result<serde_json::Value, RequestError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self {
            id: String::new(),
            rx,
            timeout: Duration::from_secs(1),
            pending: None,
        }
    }

    /// Wait for the response body.
    pub async fn wait(self) -> Result<serde_json::Value, RequestError> {
        match tokio::time::timeout(self.timeout, self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RequestError::ConnectionClosed),
            Err(_) => {
                if let Some(pending) = &self.pending {
                    pending.forget(&self.id);
                }
                Err(RequestError::Timeout(self.timeout))
            },
        }
    }

    /// Wait for the response body and decode it.
    pub async fn wait_as<T: DeserializeOwned>(self) -> Result<T, RequestError> {
        let body = self.wait().await?;
        serde_json::from_value(body).map_err(|e| RequestError::Decode(e.to_string()))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn response(id: &str, code: u16, body: serde_json::Value) -> ResponseFrame {
        ResponseFrame {
            req_id: id.into(),
            code,
            r#type: None,
            body,
        }
    }

    #[tokio::test]
    async fn resolve_routes_to_caller() {
        let pending = PendingRequests::default();
        let handle = pending.register("req-1", Duration::from_secs(5));

        assert!(pending.resolve(response("req-1", 200, json!({"result": "ok"}))));
        assert_eq!(handle.wait().await.unwrap(), json!({"result": "ok"}));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn error_code_is_rejection() {
        let pending = PendingRequests::default();
        let handle = pending.register("req-1", Duration::from_secs(5));
        pending.resolve(response("req-1", 400, json!("bad ring")));

        match handle.wait().await {
            Err(RequestError::Rejected { code, body }) => {
                assert_eq!(code, 400);
                assert_eq!(body, json!("bad ring"));
            },
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unknown_response_is_not_routed() {
        let pending = PendingRequests::default();
        assert!(!pending.resolve(response("nobody", 200, json!({}))));
    }

    #[tokio::test]
    async fn fail_all_closes_outstanding_requests() {
        let pending = PendingRequests::default();
        let a = pending.register("a", Duration::from_secs(5));
        let b = pending.register("b", Duration::from_secs(5));
        pending.fail_all();

        assert!(matches!(a.wait().await, Err(RequestError::ConnectionClosed)));
        assert!(matches!(b.wait().await, Err(RequestError::ConnectionClosed)));
        assert!(pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_forgets_request() {
        let pending = PendingRequests::default();
        let handle = pending.register("slow", Duration::from_secs(10));

        assert!(matches!(handle.wait().await, Err(RequestError::Timeout(_))));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn wait_as_decodes_body() {
        #[derive(serde::Deserialize)]
        struct Clock {
            #[serde(rename = "currentTime")]
            current_time: u64,
        }

        let handle = PendingResponse::ready(Ok(json!({"currentTime": 1_700_000_000_000_u64})));
        let clock: Clock = handle.wait_as().await.unwrap();
        assert_eq!(clock.current_time, 1_700_000_000_000);

        let handle = PendingResponse::ready(Ok(json!("not a clock")));
        assert!(matches!(
            handle.wait_as::<Clock>().await,
            Err(RequestError::Decode(_))
        ));
    }
}
