use std::sync::{
    Mutex, RwLock,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

use tokio_util::sync::CancellationToken;

/// Per-process session context shared by every handler.
///
/// Holds the state that outlives a single event: the resolved file-serving
/// domain, the running keepalive timer and reconnect bookkeeping.
#[derive(Debug)]
pub struct AgentSession {
    account_id: String,
    swift_domain: RwLock<Option<String>>,
    keepalive: Mutex<Option<CancellationToken>>,
    reconnect_attempts: AtomicU32,
    connected_once: AtomicBool,
}

impl AgentSession {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            swift_domain: RwLock::new(None),
            keepalive: Mutex::new(None),
            reconnect_attempts: AtomicU32::new(0),
            connected_once: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Domain downloads are served from, once the directory lookup has answered.
    #[must_use]
    pub fn swift_domain(&self) -> Option<String> {
        self.swift_domain
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_swift_domain(&self, domain: String) {
        *self.swift_domain.write().unwrap_or_else(|e| e.into_inner()) = Some(domain);
    }

    /// Install a new keepalive timer, cancelling any previous one.
    pub fn start_keepalive(&self, token: CancellationToken) {
        let previous = self
            .keepalive
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(token);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Cancel the keepalive timer. Returns `false` if none was running.
    pub fn stop_keepalive(&self) -> bool {
        match self.keepalive.lock().unwrap_or_else(|e| e.into_inner()).take() {
            Some(token) => {
                token.cancel();
                true
            },
            None => false,
        }
    }

    #[must_use]
    pub fn keepalive_active(&self) -> bool {
        self.keepalive
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Record a successful connection; resets the reconnect counter.
    pub fn mark_connected(&self) {
        self.connected_once.store(true, Ordering::SeqCst);
        self.reconnect_attempts.store(0, Ordering::SeqCst);
    }

    #[must_use]
    pub fn connected_once(&self) -> bool {
        self.connected_once.load(Ordering::SeqCst)
    }

    /// Number of the reconnect attempt about to be made, starting at 1.
    pub fn next_reconnect_attempt(&self) -> u32 {
        self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1
    }
}
