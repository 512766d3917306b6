use std::{ops::ControlFlow, sync::Arc, time::Duration};

use {
    courier_client::{AgentConnection, ConnectionEvent, Directory},
    courier_config::CourierConfig,
    courier_protocol::InboundEvent,
    tokio::sync::mpsc,
    tracing::{debug, info},
};

use crate::{
    download::Downloader,
    error::Result,
    handlers, lifecycle,
    reconnect::ReconnectPolicy,
    session::AgentSession,
};

/// Routes connection events to their handlers.
///
/// Events are handled one at a time, in arrival order. Handlers never wait
/// on the network; request completions are handled by spawned tasks.
pub struct Agent {
    connection: Arc<dyn AgentConnection>,
    directory: Arc<dyn Directory>,
    downloader: Arc<Downloader>,
    session: Arc<AgentSession>,
    policy: ReconnectPolicy,
    keepalive_interval: Duration,
}

impl Agent {
    pub fn new(
        config: &CourierConfig,
        connection: Arc<dyn AgentConnection>,
        directory: Arc<dyn Directory>,
        downloader: Downloader,
    ) -> Self {
        Self {
            connection,
            directory,
            downloader: Arc::new(downloader),
            session: Arc::new(AgentSession::new(&config.credentials.account_id)),
            policy: ReconnectPolicy::from_settings(&config.reconnect),
            keepalive_interval: config.agent.keepalive_interval(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<AgentSession> {
        &self.session
    }

    /// Handle events until the connection goes away, the reconnect policy
    /// gives up, or `shutdown` resolves.
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        tokio::pin!(shutdown);
        let result = loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        if let ControlFlow::Break(result) = self.dispatch(event) {
                            break result;
                        }
                    },
                    None => break Ok(()),
                },
                () = &mut shutdown => {
                    info!("shutting down");
                    break Ok(());
                },
            }
        };

        self.session.stop_keepalive();
        self.connection.shutdown();
        result
    }

    /// Handle a single event.
    pub fn dispatch(&self, event: ConnectionEvent) -> ControlFlow<Result<()>> {
        match event {
            ConnectionEvent::Connected => lifecycle::on_connected(
                &self.connection,
                &self.directory,
                &self.session,
                self.keepalive_interval,
            ),
            ConnectionEvent::Error(message) => lifecycle::on_error(&message),
            ConnectionEvent::Closed { code } => {
                return lifecycle::on_closed(&self.connection, &self.session, &self.policy, code);
            },
            ConnectionEvent::Notification(InboundEvent::RoutingTask(body)) => {
                handlers::on_routing_notification(&self.connection, &body);
            },
            ConnectionEvent::Notification(InboundEvent::MessagingEvent(body)) => {
                handlers::on_messaging_event(
                    &self.connection,
                    &self.session,
                    &self.downloader,
                    &body,
                );
            },
            ConnectionEvent::Notification(InboundEvent::Other { r#type }) => {
                debug!(notification = %r#type, "ignoring notification");
            },
        }
        ControlFlow::Continue(())
    }
}
