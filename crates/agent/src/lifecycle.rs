//! Connection lifecycle: start-up sequence on connect, logging on error,
//! keepalive teardown and reconnect on close.

use std::{ops::ControlFlow, sync::Arc, time::Duration};

use {
    courier_client::{AgentConnection, Directory},
    courier_protocol::{Availability, Request, services},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    error::{Error, Result},
    reconnect::ReconnectPolicy,
    session::AgentSession,
};

/// Run the start-up sequence for a freshly opened session, in order:
/// subscribe to routing tasks, go online, start the keepalive timer and
/// resolve the file-serving domain in the background.
pub fn on_connected(
    connection: &Arc<dyn AgentConnection>,
    directory: &Arc<dyn Directory>,
    session: &Arc<AgentSession>,
    keepalive_interval: Duration,
) {
    session.mark_connected();
    info!(account_id = session.account_id(), "connected");

    let subscribed = connection.request(Request::SubscribeRoutingTasks);
    tokio::spawn(async move {
        match subscribed.wait().await {
            Ok(_) => info!("subscribed to routing tasks"),
            Err(e) => error!(error = %e, "failed to subscribe to routing tasks"),
        }
    });

    let online = connection.request(Request::SetAgentState {
        availability: Availability::Online,
    });
    tokio::spawn(async move {
        if let Err(e) = online.wait().await {
            warn!(error = %e, "failed to set agent state");
        }
    });

    session.start_keepalive(spawn_keepalive(
        Arc::clone(connection),
        keepalive_interval,
    ));

    let directory = Arc::clone(directory);
    let session = Arc::clone(session);
    tokio::spawn(async move {
        match directory.service_domain(services::SWIFT).await {
            Ok(domain) => {
                info!(domain, "swift domain resolved");
                session.set_swift_domain(domain);
            },
            Err(e) => warn!(error = %e, "failed to resolve swift domain"),
        }
    });
}

/// Errors reported by the connection are logged and nothing else.
pub fn on_error(message: &str) {
    error!(error = message, "got an error");
}

/// Stop the keepalive, then ask the connection to come back according to
/// `policy`. Breaks when the session never connected or the policy gives up.
pub fn on_closed(
    connection: &Arc<dyn AgentConnection>,
    session: &AgentSession,
    policy: &ReconnectPolicy,
    code: Option<u16>,
) -> ControlFlow<Result<()>> {
    info!(?code, "socket closed");
    session.stop_keepalive();

    if !session.connected_once() {
        return ControlFlow::Break(Err(Error::InitialConnect));
    }

    let attempt = session.next_reconnect_attempt();
    match policy.plan(code, attempt) {
        Some(plan) => {
            debug!(
                attempt,
                delay_ms = plan.delay.as_millis(),
                relogin = plan.relogin,
                "scheduling reconnect"
            );
            connection.reconnect(plan);
            ControlFlow::Continue(())
        },
        None => ControlFlow::Break(Err(Error::ReconnectExhausted(attempt - 1))),
    }
}

/// Send `GetClock` every `interval` until the returned token is cancelled.
fn spawn_keepalive(connection: Arc<dyn AgentConnection>, interval: Duration) -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let clock = connection.request(Request::GetClock);
                    tokio::spawn(async move {
                        if let Err(e) = clock.wait().await {
                            debug!(error = %e, "keepalive ping failed");
                        }
                    });
                },
            }
        }
        debug!("keepalive stopped");
    });
    cancel
}
