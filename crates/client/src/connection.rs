use std::time::Duration;

use {
    courier_config::{CourierConfig, Credentials},
    courier_protocol::{Frame, InboundEvent, PROTOCOL_VERSION, Request, services},
    futures::{SinkExt, StreamExt},
    secrecy::{ExposeSecret, Secret},
    tokio::sync::mpsc,
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, error, info, warn},
};

use crate::{
    AgentConnection,
    csds::{CsdsClient, Directory},
    error::{Error, Result},
    login::login,
    rpc::{PendingRequests, PendingResponse, RequestError},
};

/// Events sent from the connection task to the agent.
#[derive(Debug)]
pub enum ConnectionEvent {
    Connected,
    Error(String),
    Closed { code: Option<u16> },
    Notification(InboundEvent),
}

/// How the next session should be established after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPlan {
    pub delay: Duration,
    /// Discard the cached bearer token and log in again.
    pub relogin: bool,
}

#[derive(Debug)]
enum Control {
    Reconnect(ReconnectPlan),
    Shutdown,
}

/// Everything the connection task needs to log in and open the socket.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub credentials: Credentials,
    pub csds_url: String,
    pub request_timeout: Duration,
    secure: bool,
}

impl ClientSettings {
    #[must_use]
    pub fn from_config(config: &CourierConfig) -> Self {
        Self {
            credentials: config.credentials.clone(),
            csds_url: config.agent.csds_url.clone(),
            request_timeout: config.agent.request_timeout(),
            secure: true,
        }
    }

    /// Use plain `http`/`ws` for login and the socket, e.g. a local stand-in
    /// for the platform.
    #[must_use]
    pub fn with_insecure_scheme(mut self) -> Self {
        self.secure = false;
        self
    }

    fn http_scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }

    fn ws_scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }
}

/// How a single session ended.
enum SessionEnd {
    Closed(Option<u16>),
    Shutdown,
}

/// Manages the WebSocket session: login, request correlation, and
/// re-establishing the socket when the agent asks for it.
pub struct ConnectionManager {
    write_tx: mpsc::UnboundedSender<String>,
    control_tx: mpsc::UnboundedSender<Control>,
    pending: PendingRequests,
    request_timeout: Duration,
}

impl ConnectionManager {
    /// Spawn the connection task and return immediately. Lifecycle events and
    /// notifications are delivered on `event_tx`.
    pub fn spawn(
        settings: ClientSettings,
        http: reqwest::Client,
        event_tx: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        let (write_tx, write_rx) = mpsc::unbounded_channel::<String>();
        let (control_tx, control_rx) = mpsc::unbounded_channel::<Control>();
        let pending = PendingRequests::default();
        let request_timeout = settings.request_timeout;

        tokio::spawn(connection_loop(
            settings,
            http,
            pending.clone(),
            event_tx,
            write_rx,
            control_rx,
        ));

        Self {
            write_tx,
            control_tx,
            pending,
            request_timeout,
        }
    }
}

impl AgentConnection for ConnectionManager {
    fn request(&self, request: Request) -> PendingResponse {
        let id = uuid::Uuid::new_v4().to_string();
        let type_name = request.type_name();
        let response = self.pending.register(&id, self.request_timeout);

        match serde_json::to_string(&request.into_frame(id.clone())) {
            Ok(json) => {
                debug!(id, request_type = type_name, "sending request");
                if self.write_tx.send(json).is_err() {
                    self.pending.fail(&id, RequestError::ConnectionClosed);
                }
            },
            Err(e) => self.pending.fail(&id, RequestError::Decode(e.to_string())),
        }
        response
    }

    fn reconnect(&self, plan: ReconnectPlan) {
        // Send fails only once the connection loop has exited.
        let _ = self.control_tx.send(Control::Reconnect(plan));
    }

    fn shutdown(&self) {
        let _ = self.control_tx.send(Control::Shutdown);
    }
}

/// Build the agent socket URL for an account and bearer token.
#[must_use]
pub fn socket_url(domain: &str, account_id: &str, bearer: &str) -> String {
    build_socket_url("wss", domain, account_id, bearer)
}

fn build_socket_url(scheme: &str, domain: &str, account_id: &str, bearer: &str) -> String {
    format!(
        "{scheme}://{domain}/ws_api/account/{account_id}/messaging/agent/{bearer}?v={PROTOCOL_VERSION}"
    )
}

/// Fail every outstanding request and drop frames nobody will answer.
fn discard_queued(pending: &PendingRequests, write_rx: &mut mpsc::UnboundedReceiver<String>) {
    pending.fail_all();
    let mut dropped = 0usize;
    while write_rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!(dropped, "dropped frames queued while disconnected");
    }
}

/// Main connection loop. After every close it waits for the agent's
/// instruction instead of reconnecting on its own.
async fn connection_loop(
    settings: ClientSettings,
    http: reqwest::Client,
    pending: PendingRequests,
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
    mut write_rx: mpsc::UnboundedReceiver<String>,
    mut control_rx: mpsc::UnboundedReceiver<Control>,
) {
    let csds = CsdsClient::new(
        http.clone(),
        &settings.csds_url,
        &settings.credentials.account_id,
    );
    let mut bearer: Option<Secret<String>> = None;

    loop {
        let code = match connect_and_run(
            &settings,
            &http,
            &csds,
            &mut bearer,
            &pending,
            &event_tx,
            &mut write_rx,
            &mut control_rx,
        )
        .await
        {
            Ok(SessionEnd::Shutdown) => {
                info!("connection shut down");
                pending.fail_all();
                return;
            },
            Ok(SessionEnd::Closed(code)) => {
                debug!(?code, "socket closed");
                code
            },
            Err(e) => {
                error!(error = %e, "connection error");
                if e.is_auth_rejection() && bearer.take().is_some() {
                    warn!("bearer token rejected, next session logs in again");
                }
                let _ = event_tx.send(ConnectionEvent::Error(e.to_string()));
                None
            },
        };

        discard_queued(&pending, &mut write_rx);

        if event_tx.send(ConnectionEvent::Closed { code }).is_err() {
            return;
        }

        let plan = match control_rx.recv().await {
            Some(Control::Reconnect(plan)) => plan,
            Some(Control::Shutdown) | None => {
                info!("connection shut down");
                discard_queued(&pending, &mut write_rx);
                return;
            },
        };
        if plan.relogin {
            bearer = None;
        }
        info!(
            delay_ms = plan.delay.as_millis(),
            relogin = plan.relogin,
            "reconnecting after delay"
        );
        tokio::time::sleep(plan.delay).await;
        // Requests issued while the socket was down are not replayed.
        discard_queued(&pending, &mut write_rx);
    }
}

/// Single session: resolve domains, log in if needed, open the socket, then
/// forward frames until it closes.
#[allow(clippy::too_many_arguments)]
async fn connect_and_run(
    settings: &ClientSettings,
    http: &reqwest::Client,
    csds: &CsdsClient,
    bearer: &mut Option<Secret<String>>,
    pending: &PendingRequests,
    event_tx: &mpsc::UnboundedSender<ConnectionEvent>,
    write_rx: &mut mpsc::UnboundedReceiver<String>,
    control_rx: &mut mpsc::UnboundedReceiver<Control>,
) -> Result<SessionEnd> {
    let account_id = settings.credentials.account_id.as_str();
    let mut domains = csds.service_domains().await?;
    let vep = domains
        .remove(services::AGENT_VEP)
        .ok_or(Error::MissingService(services::AGENT_VEP))?;
    let messaging = domains
        .remove(services::ASYNC_MESSAGING)
        .ok_or(Error::MissingService(services::ASYNC_MESSAGING))?;

    let token = match bearer.clone() {
        Some(token) => token,
        None => {
            let base_url = format!("{}://{vep}", settings.http_scheme());
            let token = login(http, &base_url, &settings.credentials).await?;
            *bearer = Some(token.clone());
            token
        },
    };

    info!(account_id, domain = %messaging, "opening agent socket");
    let url = build_socket_url(
        settings.ws_scheme(),
        &messaging,
        account_id,
        token.expose_secret(),
    );
    let (ws_stream, _response) = connect_async(url.as_str()).await?;
    let (mut ws_sink, mut ws_reader) = ws_stream.split();

    let _ = event_tx.send(ConnectionEvent::Connected);

    loop {
        tokio::select! {
            msg = ws_reader.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => handle_text(&text, pending, event_tx),
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map(|f| u16::from(f.code));
                        return Ok(SessionEnd::Closed(code));
                    },
                    None => return Ok(SessionEnd::Closed(None)),
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    },
                    Some(Ok(_)) => {}, // Ignore binary, pong, etc.
                    Some(Err(e)) => return Err(e.into()),
                }
            },
            json = write_rx.recv() => {
                match json {
                    Some(text) => ws_sink.send(Message::Text(text.into())).await?,
                    None => {
                        let _ = ws_sink.send(Message::Close(None)).await;
                        return Ok(SessionEnd::Shutdown);
                    },
                }
            },
            control = control_rx.recv() => {
                match control {
                    Some(Control::Reconnect(_)) => {
                        debug!("ignoring reconnect request while connected");
                    },
                    Some(Control::Shutdown) | None => {
                        let _ = ws_sink.send(Message::Close(None)).await;
                        return Ok(SessionEnd::Shutdown);
                    },
                }
            },
        }
    }
}

/// Dispatch one text frame: responses go to their waiting request,
/// notifications are decoded and forwarded.
fn handle_text(
    text: &str,
    pending: &PendingRequests,
    event_tx: &mpsc::UnboundedSender<ConnectionEvent>,
) {
    match Frame::parse(text) {
        Ok(Frame::Response(resp)) => {
            let req_id = resp.req_id.clone();
            if !pending.resolve(resp) {
                debug!(req_id, "response for unknown or expired request");
            }
        },
        Ok(Frame::Notification(notification)) => match InboundEvent::decode(notification) {
            Ok(event) => {
                let _ = event_tx.send(ConnectionEvent::Notification(event));
            },
            Err(e) => {
                warn!(error = %e, "dropping undecodable notification");
                let _ = event_tx.send(ConnectionEvent::Error(e.to_string()));
            },
        },
        Ok(Frame::Request(req)) => {
            debug!(request_type = %req.r#type, "ignoring server-initiated request");
        },
        Err(e) => {
            warn!(error = %e, "ignoring unparseable frame");
        },
    }
}
