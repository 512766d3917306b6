//! The file-collecting agent.
//!
//! Accepts every conversation offered to the bot and saves the files
//! customers attach to their messages. Inbound connection events are routed
//! by [`Agent::dispatch`]; every request it issues is fire-and-forget, with
//! completions logged from spawned tasks.

pub mod download;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod reconnect;
pub mod router;
pub mod session;

pub use {
    download::Downloader,
    error::{Error, Result},
    reconnect::ReconnectPolicy,
    router::Agent,
    session::AgentSession,
};

#[cfg(test)]
pub(crate) mod testing;
