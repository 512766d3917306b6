//! Messaging-agent WebSocket protocol definitions.
//!
//! All communication uses JSON frames over a single WebSocket, discriminated
//! by the `kind` field:
//! - `req`          : agent → platform request
//! - `resp`         : platform → agent result, correlated by `reqId`
//! - `notification` : platform → agent server push
//!
//! Notifications are decoded once, at the boundary, into [`InboundEvent`].

pub mod messaging;
pub mod routing;

use serde::{Deserialize, Serialize};

pub use {
    messaging::{
        DownloadDescriptor, FileMessage, MessageBody, MessagingChange, MessagingEvent,
        MessagingNotification, QueryParams,
    },
    routing::{ChangeType, RingDetails, RingState, RoutingChange, RoutingNotification},
};

// ── Constants ────────────────────────────────────────────────────────────────

pub const PROTOCOL_VERSION: u32 = 3;
pub const LOGIN_API_VERSION: &str = "1.3";

/// WebSocket close codes that mean the bearer token is no longer valid.
pub mod close_codes {
    pub const UNAUTHORIZED: u16 = 4401;
    pub const TOKEN_EXPIRED: u16 = 4407;

    /// Whether a close with `code` requires a fresh login before reconnecting.
    #[must_use]
    pub fn requires_relogin(code: Option<u16>) -> bool {
        matches!(code, Some(UNAUTHORIZED | TOKEN_EXPIRED))
    }
}

/// Service names returned by the directory (CSDS) lookup.
pub mod services {
    pub const AGENT_VEP: &str = "agentVep";
    pub const ASYNC_MESSAGING: &str = "asyncMessagingEnt";
    pub const SWIFT: &str = "swift";
}

/// Wire `type` names for requests and notifications.
pub mod types {
    pub const SUBSCRIBE_ROUTING_TASKS: &str = ".ams.routing.SubscribeRoutingTasks";
    pub const SET_AGENT_STATE: &str = ".ams.routing.SetAgentState";
    pub const UPDATE_RING_STATE: &str = ".ams.routing.UpdateRingState";
    pub const GENERATE_DOWNLOAD_URL: &str = ".ams.ms.GenerateURLForDownloadFile";
    pub const GET_CLOCK: &str = ".GetClock";

    pub const ROUTING_TASK_NOTIFICATION: &str = ".ams.routing.RoutingTaskNotification";
    pub const MESSAGING_EVENT_NOTIFICATION: &str = ".ams.ms.MessagingEventNotification";
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed frame: {0}")]
    Frame(#[from] serde_json::Error),

    #[error("malformed {kind} payload: {source}")]
    Payload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

// ── Frames ───────────────────────────────────────────────────────────────────

/// Agent → platform request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: String,
    pub r#type: String,
    #[serde(default)]
    pub body: serde_json::Value,
}

/// Platform → agent response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    #[serde(rename = "reqId")]
    pub req_id: String,
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default)]
    pub body: serde_json::Value,
}

impl ResponseFrame {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code < 400
    }
}

/// Platform → agent server push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationFrame {
    pub r#type: String,
    #[serde(default)]
    pub body: serde_json::Value,
}

/// Discriminated union of all frame kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Frame {
    #[serde(rename = "req")]
    Request(RequestFrame),
    #[serde(rename = "resp")]
    Response(ResponseFrame),
    #[serde(rename = "notification")]
    Notification(NotificationFrame),
}

impl Frame {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ── Requests ─────────────────────────────────────────────────────────────────

/// Presence value sent with `SetAgentState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    Online,
    Away,
    Offline,
}

/// Every request the agent issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    SubscribeRoutingTasks,
    SetAgentState { availability: Availability },
    GetClock,
    UpdateRingState { ring_id: String, ring_state: RingState },
    GenerateDownloadUrl { relative_path: String },
}

impl Request {
    /// Wire `type` of this request.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SubscribeRoutingTasks => types::SUBSCRIBE_ROUTING_TASKS,
            Self::SetAgentState { .. } => types::SET_AGENT_STATE,
            Self::GetClock => types::GET_CLOCK,
            Self::UpdateRingState { .. } => types::UPDATE_RING_STATE,
            Self::GenerateDownloadUrl { .. } => types::GENERATE_DOWNLOAD_URL,
        }
    }

    #[must_use]
    pub fn body(&self) -> serde_json::Value {
        match self {
            Self::SubscribeRoutingTasks | Self::GetClock => serde_json::json!({}),
            Self::SetAgentState { availability } => serde_json::json!({
                "channels": ["MESSAGING"],
                "availability": availability,
            }),
            Self::UpdateRingState {
                ring_id,
                ring_state,
            } => serde_json::json!({
                "ringId": ring_id,
                "ringState": ring_state,
            }),
            Self::GenerateDownloadUrl { relative_path } => serde_json::json!({
                "relativePath": relative_path,
            }),
        }
    }

    /// Build the `req` frame for this request under `id`.
    #[must_use]
    pub fn into_frame(self, id: impl Into<String>) -> Frame {
        Frame::Request(RequestFrame {
            id: id.into(),
            r#type: self.type_name().into(),
            body: self.body(),
        })
    }
}

// ── Inbound events ───────────────────────────────────────────────────────────

/// A server push, decoded into its typed payload.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    RoutingTask(RoutingNotification),
    MessagingEvent(MessagingNotification),
    /// A notification type this agent does not act on.
    Other { r#type: String },
}

impl InboundEvent {
    /// Decode a notification frame. Unknown types are not an error.
    pub fn decode(frame: NotificationFrame) -> Result<Self> {
        match frame.r#type.as_str() {
            types::ROUTING_TASK_NOTIFICATION => serde_json::from_value(frame.body)
                .map(Self::RoutingTask)
                .map_err(|source| Error::Payload {
                    kind: "routing notification",
                    source,
                }),
            types::MESSAGING_EVENT_NOTIFICATION => serde_json::from_value(frame.body)
                .map(Self::MessagingEvent)
                .map_err(|source| Error::Payload {
                    kind: "messaging notification",
                    source,
                }),
            _ => Ok(Self::Other {
                r#type: frame.r#type,
            }),
        }
    }
}
