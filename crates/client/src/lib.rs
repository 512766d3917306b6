//! Connection client for the messaging-agent platform.
//!
//! Resolves service domains through the directory (CSDS), logs the bot user
//! in, and keeps a WebSocket session open. Requests are correlated with their
//! responses and handed back as [`PendingResponse`] values; server pushes are
//! decoded into typed events and forwarded over a channel.

pub mod connection;
pub mod csds;
pub mod error;
pub mod login;
pub mod rpc;

pub use {
    connection::{ClientSettings, ConnectionEvent, ConnectionManager, ReconnectPlan},
    csds::{CsdsClient, Directory},
    error::{Error, Result},
    rpc::{PendingRequests, PendingResponse, RequestError},
};

use courier_protocol::Request;

/// Request surface of a live agent session.
///
/// Requests are issued without waiting: the frame is queued immediately and
/// the returned [`PendingResponse`] resolves later.
pub trait AgentConnection: Send + Sync {
    fn request(&self, request: Request) -> PendingResponse;

    /// Instruct the client how to re-establish a closed session.
    fn reconnect(&self, plan: ReconnectPlan);

    /// Close the session and stop reconnecting.
    fn shutdown(&self);
}
